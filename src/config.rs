use std::{fmt, path::PathBuf, str::FromStr};

use clap::builder::BoolishValueParser;
use serde::Deserialize;

use crate::{
  error::{Error, Result},
  ext::PathExt,
  format::ReportOptions,
};

const PULL_REQUEST_EVENTS: &[&str] = &["pull_request", "pull_request_target"];

/// Scale applied to every timing metric of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
  Seconds,
  Milliseconds,
  Microseconds,
}

impl TimeUnit {
  pub const NAMES: &'static [&'static str] = &["seconds", "milliseconds", "microseconds"];

  /// Factor converting seconds into this unit.
  pub fn scale(self) -> f64 {
    match self {
      TimeUnit::Seconds => 1.0,
      TimeUnit::Milliseconds => 1_000.0,
      TimeUnit::Microseconds => 1_000_000.0,
    }
  }

  pub fn suffix(self) -> &'static str {
    match self {
      TimeUnit::Seconds => "s",
      TimeUnit::Milliseconds => "ms",
      TimeUnit::Microseconds => "μs",
    }
  }
}

impl FromStr for TimeUnit {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "seconds" => Ok(TimeUnit::Seconds),
      // Older workflows still spell it this way.
      "milliseconds" | "miliseconds" => Ok(TimeUnit::Milliseconds),
      "microseconds" => Ok(TimeUnit::Microseconds),
      _ => Err(Error::invalid_value("benchmark-time-unit", &[s], Self::NAMES)),
    }
  }
}

/// Which field of a raw benchmark entry identifies it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentifierField {
  Name,
  Fullname,
}

impl IdentifierField {
  pub const NAMES: &'static [&'static str] = &["name", "fullname"];

  pub fn name(self) -> &'static str {
    match self {
      IdentifierField::Name => "name",
      IdentifierField::Fullname => "fullname",
    }
  }
}

impl FromStr for IdentifierField {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "name" => Ok(IdentifierField::Name),
      "fullname" => Ok(IdentifierField::Fullname),
      _ => Err(Error::invalid_value("benchmark-name", &[s], Self::NAMES)),
    }
  }
}

/// How a metric is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
  /// Seconds, scaled by the run's [`TimeUnit`].
  Timing,
  /// Operations per second.
  Throughput,
  Count,
  /// pytest-benchmark's `"<mild>;<severe>"` pair, or a plain count.
  Outliers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
  Min,
  Max,
  Mean,
  Median,
  Stddev,
  Ops,
  Rounds,
  Iterations,
  Outliers,
}

impl Metric {
  pub const ALL: [Metric; 9] = [
    Metric::Min,
    Metric::Max,
    Metric::Mean,
    Metric::Median,
    Metric::Stddev,
    Metric::Ops,
    Metric::Rounds,
    Metric::Iterations,
    Metric::Outliers,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Metric::Min => "min",
      Metric::Max => "max",
      Metric::Mean => "mean",
      Metric::Median => "median",
      Metric::Stddev => "stddev",
      Metric::Ops => "ops",
      Metric::Rounds => "rounds",
      Metric::Iterations => "iterations",
      Metric::Outliers => "outliers",
    }
  }

  pub fn kind(self) -> MetricKind {
    match self {
      Metric::Min | Metric::Max | Metric::Mean | Metric::Median | Metric::Stddev => MetricKind::Timing,
      Metric::Ops => MetricKind::Throughput,
      Metric::Rounds | Metric::Iterations => MetricKind::Count,
      Metric::Outliers => MetricKind::Outliers,
    }
  }

  fn names() -> Vec<&'static str> {
    Self::ALL.iter().map(|m| m.name()).collect()
  }

  /// Parses a comma separated metric list, rejecting the whole list if any
  /// entry is unknown.
  pub fn parse_list(input: &str, list: &str) -> Result<Vec<Metric>> {
    let provided = list
      .split(',')
      .map(str::trim)
      .filter(|m| !m.is_empty())
      .collect::<Vec<_>>();

    if provided.is_empty() {
      return Err(Error::configuration(format!("{input} must name at least one metric")));
    }

    provided
      .iter()
      .map(|name| {
        Self::ALL
          .into_iter()
          .find(|m| m.name() == *name)
          .ok_or_else(|| Error::invalid_value(input, &provided, &Self::names()))
      })
      .collect()
  }
}

impl fmt::Display for Metric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Action inputs as received, before validation. Every option can also be
/// supplied through the `INPUT_*` variable the runner sets for it.
#[derive(clap::Args, Debug, Clone)]
pub struct Inputs {
  /// Path to the pytest-benchmark JSON file of this run.
  #[arg(long, env = "INPUT_BENCHMARK-FILE", default_value = "output.json")]
  pub benchmark_file: PathBuf,
  /// Path to a JSON file of a previous run to compare against.
  #[arg(long, env = "INPUT_COMPARISON-BENCHMARK-FILE")]
  pub comparison_benchmark_file: Option<String>,
  /// Field identifying a benchmark (`name` or `fullname`).
  #[arg(long, env = "INPUT_BENCHMARK-NAME", default_value = "name")]
  pub benchmark_name: String,
  #[arg(long, env = "INPUT_BENCHMARK-TIME-UNIT", default_value = "seconds")]
  pub benchmark_time_unit: String,
  /// Comma separated metrics shown as table columns.
  #[arg(long, env = "INPUT_BENCHMARK-METRICS", default_value = "min,max,mean,stddev")]
  pub benchmark_metrics: String,
  /// Metric used for the comparison column.
  #[arg(long, env = "INPUT_COMPARISON-BENCHMARK-METRIC", default_value = "mean")]
  pub comparison_benchmark_metric: String,
  #[arg(
    long,
    env = "INPUT_COMPARISON-HIGHER-IS-BETTER",
    default_value = "false",
    action = clap::ArgAction::Set,
    value_parser = BoolishValueParser::new()
  )]
  pub comparison_higher_is_better: bool,
  /// Changes at or below this many percent are not highlighted.
  #[arg(long, env = "INPUT_COMPARISON-THRESHOLD", default_value_t = 0.0)]
  pub comparison_threshold: f64,
  #[arg(long, env = "INPUT_BENCHMARK-TITLE", default_value = "Result of Benchmark Tests")]
  pub benchmark_title: String,
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub benchmark_file: PathBuf,
  pub comparison_file: Option<PathBuf>,
  pub identifier: IdentifierField,
  pub time_unit: TimeUnit,
  pub metrics: Vec<Metric>,
  pub compare_metric: Metric,
  pub higher_is_better: bool,
  pub threshold: f64,
  pub title: String,
}

impl Inputs {
  /// Checks every enumerated option. Runs before any file is touched.
  pub fn validate(&self) -> Result<Config> {
    let identifier: IdentifierField = self.benchmark_name.parse()?;
    let time_unit: TimeUnit = self.benchmark_time_unit.parse()?;
    let metrics = Metric::parse_list("benchmark-metrics", &self.benchmark_metrics)?;

    let compare_metric = match Metric::parse_list("comparison-benchmark-metric", &self.comparison_benchmark_metric)?[..] {
      [metric] => metric,
      _ => {
        return Err(Error::configuration(format!(
          "comparison-benchmark-metric takes a single metric, got {:?}",
          self.comparison_benchmark_metric
        )))
      }
    };

    if !self.comparison_threshold.is_finite() || self.comparison_threshold < 0.0 {
      return Err(Error::configuration(format!(
        "comparison-threshold must be a non-negative number, got {}",
        self.comparison_threshold
      )));
    }

    let title = self.benchmark_title.trim();
    if title.is_empty() {
      return Err(Error::configuration("benchmark-title must not be empty"));
    }

    Ok(Config {
      benchmark_file: self.benchmark_file.clone(),
      comparison_file: self
        .comparison_benchmark_file
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from),
      identifier,
      time_unit,
      metrics,
      compare_metric,
      higher_is_better: self.comparison_higher_is_better,
      threshold: self.comparison_threshold,
      title: title.to_string(),
    })
  }
}

impl Config {
  /// Metrics each record must carry: the table columns plus the comparison
  /// metric.
  pub fn loaded_metrics(&self) -> Vec<Metric> {
    let mut metrics = self.metrics.clone();
    if !metrics.contains(&self.compare_metric) {
      metrics.push(self.compare_metric);
    }

    metrics
  }

  pub fn report_options(&self) -> ReportOptions<'_> {
    ReportOptions {
      metrics: &self.metrics,
      compare_metric: self.compare_metric,
      higher_is_better: self.higher_is_better,
      threshold: self.threshold,
      title: &self.title,
    }
  }
}

/// The pull request a run reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
  pub owner: String,
  pub repo: String,
  pub number: u64,
}

#[derive(Deserialize)]
struct Event {
  pull_request: EventPullRequest,
}

#[derive(Deserialize)]
struct EventPullRequest {
  number: u64,
}

impl PullRequest {
  pub fn from_env() -> Result<Self> {
    Self::from_vars(|key| std::env::var(key).ok())
  }

  /// Resolves the pull request from the runner's `GITHUB_*` variables. Any
  /// event other than a pull request is rejected.
  pub fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> Result<Self> {
    let event_name = var("GITHUB_EVENT_NAME").unwrap_or_default();
    if !PULL_REQUEST_EVENTS.contains(&event_name.as_str()) {
      return Err(Error::configuration(format!(
        "Can only run on pull requests! (event: {event_name:?})"
      )));
    }

    let repository = var("GITHUB_REPOSITORY").ok_or_else(|| Error::configuration("GITHUB_REPOSITORY is not set"))?;
    let (owner, repo) = repository
      .split_once('/')
      .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
      .ok_or_else(|| Error::configuration(format!("GITHUB_REPOSITORY {repository:?} is not owner/repo")))?;

    let event_path = var("GITHUB_EVENT_PATH").ok_or_else(|| Error::configuration("GITHUB_EVENT_PATH is not set"))?;
    let event: Event = PathBuf::from(event_path)
      .read_json()
      .map_err(|err| Error::configuration(format!("could not read pull request event: {err}")))?;

    Ok(Self {
      owner: owner.to_string(),
      repo: repo.to_string(),
      number: event.pull_request.number,
    })
  }
}
