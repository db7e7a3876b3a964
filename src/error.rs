use std::path::PathBuf;

use thiserror::Error;

use crate::config::Metric;

#[derive(Debug, Error)]
pub enum Error {
  /// Invalid trigger context or option value. Nothing is read or posted.
  #[error("{0}")]
  Configuration(String),
  #[error("could not parse {path:?}: {reason}")]
  Parse { path: PathBuf, reason: String },
  #[error("benchmark {name:?} has no entry in the comparison file")]
  MissingBaseline { name: String },
  /// A record was asked for a metric it was not built with.
  #[error("metric {metric} was not loaded")]
  MetricNotLoaded { metric: Metric },
  #[error("{call} failed: {reason}")]
  Remote { call: &'static str, reason: String },
}

impl Error {
  pub fn configuration<T: Into<String>>(msg: T) -> Self {
    Error::Configuration(msg.into())
  }

  pub fn parse<P: Into<PathBuf>, T: ToString>(path: P, reason: T) -> Self {
    Error::Parse {
      path: path.into(),
      reason: reason.to_string(),
    }
  }

  pub fn remote<T: ToString>(call: &'static str, reason: T) -> Self {
    Error::Remote {
      call,
      reason: reason.to_string(),
    }
  }

  /// Formats the message used for a rejected enumerated input.
  pub fn invalid_value(input: &str, provided: &[&str], permissible: &[&str]) -> Self {
    Error::Configuration(format!(
      "Invalid value for {input}: {} - valid values for {input} are: {}",
      provided.join(", "),
      permissible.join(", ")
    ))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
