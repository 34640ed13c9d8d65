use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use logster_config::RunOverrides;
use logster_core::{LogsterError, Metric, MetricSink};
use logster_engine::format::{format_plain, format_structured};
use logster_engine::{Aggregator, Session};
use tracing::{info, warn};

use super::CliError;

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub parsers: Vec<String>,
    pub duration: Option<f64>,
    pub diagnostics: bool,
    pub prefix: Option<String>,
    pub json: bool,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
enum Source {
    Stdin,
    File(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => f.write_str("<stdin>"),
            Source::File(p) => write!(f, "{}", p.display()),
        }
    }
}

pub async fn run(args: RunArgs) -> Result<(), CliError> {
    let config = super::load_config(args.config.as_deref())?;
    let overrides = RunOverrides {
        interval: args.duration,
        mode: None,
        diagnostics: args.diagnostics.then_some(true),
    };
    let settings = logster_config::merge_with_cli(&config.settings, &overrides)?;
    let template = config.build_session(&args.parsers, &overrides)?;

    let sources: Vec<Source> = if args.files.is_empty() {
        vec![Source::Stdin]
    } else {
        args.files.into_iter().map(Source::File).collect()
    };

    // One session per source, each on its own blocking task.
    let duration = settings.interval;
    let handles: Vec<_> = sources
        .iter()
        .cloned()
        .map(|source| {
            let mut session = template.clone();
            tokio::task::spawn_blocking(move || aggregate_source(&source, &mut session, duration))
        })
        .collect();

    let stdout = io::stdout();
    let mut sink = StdoutSink::new(stdout.lock(), args.json, args.prefix);
    let mut failed = 0usize;
    let mut submitted = 0usize;

    for (source, handle) in sources.iter().zip(handles) {
        match handle.await? {
            Ok(metrics) => {
                sink.submit_all(&metrics)?;
                submitted += metrics.len();
            }
            Err(e) => {
                warn!(source = %source, error = %e, "failed to read log source");
                failed += 1;
            }
        }
    }
    sink.flush()?;

    info!(
        sources = sources.len(),
        failed,
        metrics = submitted,
        duration_secs = duration,
        "run complete"
    );

    if failed > 0 {
        return Err(CliError::Usage(format!(
            "{failed} of {} log source(s) could not be read",
            sources.len()
        )));
    }
    Ok(())
}

fn aggregate_source(source: &Source, session: &mut Session, duration: f64) -> io::Result<Vec<Metric>> {
    match source {
        Source::Stdin => aggregate(io::stdin().lock(), session, duration),
        Source::File(path) => aggregate(BufReader::new(File::open(path)?), session, duration),
    }
}

/// Feed every line of `reader` into `session` and finalize one interval.
/// Invalid UTF-8 is replaced rather than rejected.
fn aggregate<R: BufRead>(mut reader: R, session: &mut Session, duration: f64) -> io::Result<Vec<Metric>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        session.process_line(line.trim_end_matches(|c| c == '\n' || c == '\r'));
    }
    Ok(session.finalize(duration))
}

/// Writes metrics one per line, plain or JSON.
pub struct StdoutSink<W: Write> {
    out: W,
    json: bool,
    prefix: Option<String>,
}

impl<W: Write> StdoutSink<W> {
    pub fn new(out: W, json: bool, prefix: Option<String>) -> Self {
        Self { out, json, prefix }
    }

    pub fn flush(&mut self) -> Result<(), LogsterError> {
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> MetricSink for StdoutSink<W> {
    fn submit(&mut self, metric: &Metric) -> Result<(), LogsterError> {
        let prefixed;
        let metric = match &self.prefix {
            Some(p) => {
                prefixed = metric.with_prefix(p);
                &prefixed
            }
            None => metric,
        };
        let line = if self.json {
            format_structured(metric)
        } else {
            format_plain(metric)
        };
        writeln!(self.out, "{line}")?;
        Ok(())
    }
}
