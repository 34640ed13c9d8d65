use std::path::PathBuf;

use tracing::debug;

use super::CliError;

/// Loading already compiles every parser; any ConfigurationError surfaces here.
pub fn run(config: Option<PathBuf>) -> Result<(), CliError> {
    let config = super::load_config(config.as_deref())?;

    let mut rules = 0usize;
    for name in config.parser_names() {
        let parser = config.build_parser(name, config.settings.diagnostics)?;
        debug!(parser = name, rules = parser.classifier().len(), families = parser.families().len(), "parser ok");
        rules += parser.classifier().len();
    }

    println!(
        "[logster] {} parser(s), {} rule(s) OK",
        config.parsers.len(),
        rules
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn check_reports_broken_pattern() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[[parsers.broken.rules]]
family = "f"
pattern = '(?P<code>\d+'

[[parsers.broken.families]]
name = "f"
"#,
        )
        .unwrap();
        let err = run(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn check_accepts_valid_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[[parsers.dm_web.rules]]
family = "logins"
pattern = 'GET /login'

[[parsers.dm_web.families]]
name = "logins"
"#,
        )
        .unwrap();
        run(Some(file.path().to_path_buf())).unwrap();
    }
}
