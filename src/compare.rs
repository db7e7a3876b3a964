use crate::{
  config::Metric,
  error::{Error, Result},
  stats::{BenchmarkRecord, MetricValue},
};

/// Change of one benchmark against its baseline on the comparison metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
  pub change_percent: f64,
  pub is_improvement: bool,
  pub is_relevant: bool,
}

fn metric(record: &BenchmarkRecord, metric: Metric) -> Result<&MetricValue> {
  record
    .get(metric)
    .ok_or(Error::MetricNotLoaded { metric })
}

/// Compares `current` against `baseline` on `on`.
///
/// Only a positive change with `higher_is_better` counts as an improvement;
/// with `higher_is_better` unset nothing does. A zero baseline yields an
/// infinite (or NaN) change, which is reported as is.
pub fn compare(
  current: &BenchmarkRecord,
  baseline: &BenchmarkRecord,
  on: Metric,
  higher_is_better: bool,
  threshold: f64,
) -> Result<Comparison> {
  let current = metric(current, on)?.value;
  let baseline = metric(baseline, on)?.value;

  let change_percent = (current - baseline) / baseline * 100.0;

  Ok(Comparison {
    change_percent,
    is_improvement: higher_is_better && change_percent > 0.0,
    is_relevant: change_percent.abs() > threshold,
  })
}

/// Overall outcome shown in the report title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Ok,
  Warning,
  Fail,
}

impl Status {
  pub fn classify(improved: i64, worsened: i64) -> Status {
    if worsened == 0 {
      Status::Ok
    } else if improved >= 0 {
      Status::Warning
    } else {
      Status::Fail
    }
  }
}

/// Running counts over every compared benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
  pub total: usize,
  pub improved: usize,
  pub worsened: usize,
}

impl Tally {
  pub fn add(&mut self, comparison: &Comparison) {
    self.total += 1;

    if comparison.is_relevant {
      if comparison.is_improvement {
        self.improved += 1;
      } else {
        self.worsened += 1;
      }
    }
  }

  pub fn status(&self) -> Status {
    Status::classify(self.improved as i64, self.worsened as i64)
  }
}
