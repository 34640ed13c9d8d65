use std::path::PathBuf;

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::CliError;
use logster_config::LogsterConfig;

#[derive(Debug, Serialize, Tabled)]
struct ParserRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Rules")]
    rules: usize,
    #[tabled(rename = "Families")]
    families: usize,
    #[tabled(rename = "Description")]
    description: String,
}

fn rows(config: &LogsterConfig) -> Vec<ParserRow> {
    config
        .parsers
        .iter()
        .map(|(name, pc)| ParserRow {
            name: name.clone(),
            rules: pc.rules.len(),
            families: pc.families.len(),
            description: pc.description.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn run(config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let config = super::load_config(config.as_deref())?;
    let rows = rows(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
        return Ok(());
    }

    if rows.is_empty() {
        println!("[logster] No parsers configured");
        return Ok(());
    }

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rows() {
        let config = logster_config::presets::builtin().unwrap();
        let rows = rows(&config);
        assert_eq!(rows.len(), 9);
        let web = rows.iter().find(|r| r.name == "dfs_web").unwrap();
        assert_eq!(web.rules, 4);
        assert_eq!(web.families, 4);
        assert!(Table::new(&rows).to_string().contains("dm_mapproxy"));
    }
}
