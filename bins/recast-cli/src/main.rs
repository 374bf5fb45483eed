use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use recast_engine::json::encode_record;
use recast_engine::{EngineError, ErrorPolicy, PipelineConfig, RecordReader, TransformChain};

#[derive(Parser)]
#[command(name = "recast", about = "Recast fields of JSON-lines records through transform plugins")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "recast.toml", env = "RECAST_CONFIG")]
    config: PathBuf,

    /// Input file with one JSON record per line (default: stdin).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overrides `on_error` from the configuration file.
    #[arg(long, value_enum)]
    on_error: Option<OnError>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Fail,
    Skip,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Fail => ErrorPolicy::Fail,
            OnError::Skip => ErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    read: usize,
    written: usize,
    skipped: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config.display(), "loading configuration");
    let config = match PipelineConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };
    let policy = cli.on_error.map_or(config.on_error, ErrorPolicy::from);

    let mut chain = match TransformChain::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load transforms");
            std::process::exit(1);
        }
    };

    let result =
        open_io(&cli).and_then(|(input, mut output)| run(&chain, input, &mut output, policy));
    chain.close();

    match result {
        Ok(stats) => tracing::info!(
            read = stats.read,
            written = stats.written,
            skipped = stats.skipped,
            "done"
        ),
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            std::process::exit(1);
        }
    }
}

fn open_io(cli: &Cli) -> Result<(Box<dyn BufRead>, Box<dyn Write>), EngineError> {
    let input: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    Ok((input, output))
}

fn run<R: BufRead, W: Write>(
    chain: &TransformChain,
    input: R,
    output: &mut W,
    policy: ErrorPolicy,
) -> Result<Stats, EngineError> {
    let mut reader = RecordReader::new();
    let mut stats = Stats::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.read += 1;
        let line_no = index + 1;

        let processed = reader
            .decode_line(&line)
            .map_err(EngineError::from)
            .and_then(|record| chain.apply(record))
            .and_then(|record| Ok(encode_record(&record)?));

        match processed {
            Ok(json) => {
                writeln!(output, "{json}")?;
                stats.written += 1;
            }
            Err(e) => match policy {
                ErrorPolicy::Fail => return Err(at_line(line_no, e)),
                ErrorPolicy::Skip => {
                    tracing::warn!(line = line_no, error = %e, "skipping record");
                    stats.skipped += 1;
                }
            },
        }
    }

    output.flush()?;
    Ok(stats)
}

fn at_line(index: usize, e: EngineError) -> EngineError {
    match e {
        EngineError::Plugin(source) => EngineError::Record { index, source },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const GOOD: &str = r#"{"topic":"t","value":"a"}"#;

    fn run_lines(input: &str, policy: ErrorPolicy) -> (Result<Stats, EngineError>, String) {
        let mut out = Vec::new();
        let result = run(&TransformChain::new(), Cursor::new(input), &mut out, policy);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_copies_records_and_skips_blank_lines() {
        let (result, out) = run_lines(&format!("{GOOD}\n\n{GOOD}\n"), ErrorPolicy::Fail);
        let stats = result.unwrap();
        assert_eq!((stats.read, stats.written, stats.skipped), (2, 2, 0));
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l == GOOD));
    }

    #[test]
    fn test_skip_policy_drops_bad_lines() {
        let (result, out) = run_lines(&format!("not json\n{GOOD}\n"), ErrorPolicy::Skip);
        let stats = result.unwrap();
        assert_eq!((stats.read, stats.written, stats.skipped), (2, 1, 1));
        assert_eq!(out.trim_end(), GOOD);
    }

    #[test]
    fn test_fail_policy_reports_line() {
        let (result, _) = run_lines(&format!("{GOOD}\nnot json\n"), ErrorPolicy::Fail);
        match result.unwrap_err() {
            EngineError::Record { index, .. } => assert_eq!(index, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
