mod compare;
mod config;
mod error;
mod ext;
mod format;
mod github;
mod logger;
mod stats;

use std::{ffi::OsString, process::ExitCode};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::LevelFilter;

use self::{
  config::{Config, Inputs, PullRequest},
  github::{GithubClient, Published},
  stats::BenchmarkSet,
};

/// Posts pytest-benchmark results as a comment on the triggering pull
/// request, updating the previous report if there is one.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  /// Token used for the GitHub API.
  #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
  token: Option<String>,
  #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
  api_url: String,
  /// Print the report instead of commenting.
  #[arg(long)]
  dry_run: bool,
  #[arg(long, default_value = "info")]
  log_level: LevelFilter,
  #[command(flatten)]
  inputs: Inputs,
}

/// Parses the command line. Help and version requests are printed and yield
/// `None`; any other rejected option is returned as an error, so it is
/// reported like every other failure.
fn parse_args<I, T>(iter: I) -> Result<Option<Args>>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
{
  match Args::try_parse_from(iter) {
    Ok(args) => Ok(Some(args)),
    Err(err) if !err.use_stderr() => {
      err.print().context("print")?;
      Ok(None)
    }
    Err(err) => Err(anyhow!("{}", err.render().to_string().trim_end())),
  }
}

fn main() -> ExitCode {
  if let Err(err) = logger::init(LevelFilter::Info) {
    eprintln!("logger: {err}");
  }

  let result = parse_args(std::env::args_os()).and_then(|args| match args {
    Some(args) => {
      logger::set_level(args.log_level);
      run(args)
    }
    None => Ok(()),
  });

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      log::error!("Workflow failed! {err:#}");
      ExitCode::FAILURE
    }
  }
}

/// The comparison file is optional, so failing to read it only drops the
/// comparison.
fn read_baseline(config: &Config) -> Option<BenchmarkSet> {
  let path = config.comparison_file.as_deref()?;

  match BenchmarkSet::build(path, config.time_unit, config.identifier, &config.loaded_metrics()) {
    Ok(set) => {
      log::debug!("loaded {} comparison benchmarks from {path:?}", set.len());
      Some(set)
    }
    Err(err) => {
      log::warn!("Can not read comparison file. Continue without it. ({err})");
      None
    }
  }
}

fn run(args: Args) -> Result<()> {
  let config = args.inputs.validate().context("inputs")?;

  let target = if args.dry_run {
    None
  } else {
    let pr = PullRequest::from_env().context("event")?;
    let token = args
      .token
      .filter(|token| !token.is_empty())
      .context("token is required to comment on the pull request")?;

    Some((pr, token))
  };

  let current = BenchmarkSet::build(
    &config.benchmark_file,
    config.time_unit,
    config.identifier,
    &config.loaded_metrics(),
  )
  .context("benchmark file")?;
  log::debug!("loaded {} benchmarks from {:?}", current.len(), config.benchmark_file);

  let baseline = read_baseline(&config);

  let message = format::render(&current, baseline.as_ref(), &config.report_options()).context("render")?;

  let Some((pr, token)) = target else {
    println!("{message}");
    return Ok(());
  };

  log::info!("{message}");

  let client = GithubClient::new(&args.api_url, token).context("GithubClient::new")?;
  match github::publish(&client, &pr, &config.title, &message).context("publish")? {
    Published::Created => log::info!("created report on #{}", pr.number),
    Published::Updated(id) => log::info!("updated report {id} on #{}", pr.number),
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::{
    io::Write,
    path::{Path, PathBuf},
  };

  use super::*;
  use crate::config::{IdentifierField, Metric, TimeUnit};

  fn fixture(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{json}").unwrap();
    file
  }

  fn current() -> tempfile::NamedTempFile {
    fixture(
      r#"{
        "benchmarks": [
          {
            "name": "test_parse",
            "fullname": "tests/test_io.py::test_parse",
            "stats": {"min": 0.5, "max": 2.0, "mean": 1.25, "stddev": 0.25}
          }
        ]
      }"#,
    )
  }

  fn config(benchmark_file: &Path, comparison_file: Option<PathBuf>) -> Config {
    Config {
      benchmark_file: benchmark_file.to_path_buf(),
      comparison_file,
      identifier: IdentifierField::Name,
      time_unit: TimeUnit::Seconds,
      metrics: vec![Metric::Min, Metric::Max, Metric::Mean, Metric::Stddev],
      compare_metric: Metric::Mean,
      higher_is_better: false,
      threshold: 0.0,
      title: "Result of Benchmark Tests".to_string(),
    }
  }

  fn render_without_baseline(config: &Config) -> String {
    let baseline = read_baseline(config);
    assert!(baseline.is_none());

    let current = BenchmarkSet::build(
      &config.benchmark_file,
      config.time_unit,
      config.identifier,
      &config.loaded_metrics(),
    )
    .unwrap();

    format::render(&current, baseline.as_ref(), &config.report_options()).unwrap()
  }

  #[test]
  fn malformed_comparison_file_is_skipped() {
    let current = current();
    let malformed = fixture(r#"{"benchmarks": [{"name": "test_parse"#);
    let config = config(current.path(), Some(malformed.path().to_path_buf()));

    let message = render_without_baseline(&config);

    assert!(message.contains("| 0.50 s | 2.00 s | 1.25 s | 0.25 s |"), "{message}");
    assert!(!message.contains("Change"), "{message}");
    assert!(!message.contains("Total Benchmarks"), "{message}");
  }

  #[test]
  fn missing_comparison_file_is_skipped() {
    let current = current();
    let dir = tempfile::tempdir().unwrap();
    let config = config(current.path(), Some(dir.path().join("missing.json")));

    let message = render_without_baseline(&config);

    assert!(message.contains("1.25 s"), "{message}");
    assert!(!message.contains("Change"), "{message}");
  }

  #[test]
  fn no_comparison_file_is_not_read() {
    let current = current();

    assert!(read_baseline(&config(current.path(), None)).is_none());
  }

  #[test]
  fn rejected_option_is_a_workflow_error() {
    let err = parse_args(["benchmark-commenter", "--comparison-threshold="]).unwrap_err();

    assert!(err.to_string().contains("--comparison-threshold"), "{err}");
  }

  #[test]
  fn parses_options() {
    let args = parse_args(["benchmark-commenter", "--dry-run", "--comparison-threshold=2.5"])
      .unwrap()
      .unwrap();

    assert!(args.dry_run);
    assert_eq!(args.inputs.comparison_threshold, 2.5);
  }
}
