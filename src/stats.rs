use std::{
  collections::{BTreeMap, HashMap},
  path::Path,
};

use serde::Deserialize;

use crate::{
  config::{IdentifierField, Metric, MetricKind, TimeUnit},
  error::{Error, Result},
  ext::{F64Ext, PathExt},
};

/// A pytest-benchmark JSON document. Fields other than `benchmarks` are
/// ignored.
#[derive(Deserialize, Debug)]
pub struct RawBenchmarkFile {
  pub benchmarks: Vec<RawBenchmark>,
}

#[derive(Deserialize, Debug)]
pub struct RawBenchmark {
  pub name: Option<String>,
  pub fullname: Option<String>,
  pub stats: Option<RawStats>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RawStats {
  pub min: Option<f64>,
  pub max: Option<f64>,
  pub mean: Option<f64>,
  pub median: Option<f64>,
  pub stddev: Option<f64>,
  pub ops: Option<f64>,
  pub rounds: Option<f64>,
  pub iterations: Option<f64>,
  pub outliers: Option<RawOutliers>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawOutliers {
  Count(f64),
  Split(String),
}

type Accessor = fn(&RawStats) -> Option<f64>;

/// Numeric field backing each metric. Outliers are handled separately since
/// their raw form may be text.
fn accessor(metric: Metric) -> Accessor {
  match metric {
    Metric::Min => |s| s.min,
    Metric::Max => |s| s.max,
    Metric::Mean => |s| s.mean,
    Metric::Median => |s| s.median,
    Metric::Stddev => |s| s.stddev,
    Metric::Ops => |s| s.ops,
    Metric::Rounds => |s| s.rounds,
    Metric::Iterations => |s| s.iterations,
    Metric::Outliers => |s| match s.outliers {
      Some(RawOutliers::Count(count)) => Some(count),
      _ => None,
    },
  }
}

/// A single metric of a benchmark, with the run's unit applied.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
  pub value: f64,
  pub value_with_unit: String,
}

impl MetricValue {
  fn from_stats(metric: Metric, stats: &RawStats, unit: TimeUnit) -> std::result::Result<Self, String> {
    let missing = || format!("missing stats.{metric}");

    let value = match metric.kind() {
      MetricKind::Outliers => {
        if let Some(RawOutliers::Split(text)) = &stats.outliers {
          return Ok(Self {
            value: outlier_total(text).ok_or_else(|| format!("malformed stats.outliers {text:?}"))?,
            value_with_unit: text.clone(),
          });
        }

        accessor(metric)(stats).ok_or_else(missing)?
      }
      _ => accessor(metric)(stats).ok_or_else(missing)?,
    };

    Ok(match metric.kind() {
      MetricKind::Timing => {
        let scaled = value * unit.scale();
        Self {
          value: scaled,
          value_with_unit: format!("{} {}", scaled.fixed(2), unit.suffix()),
        }
      }
      MetricKind::Throughput => Self {
        value,
        value_with_unit: value.fixed(4),
      },
      MetricKind::Count | MetricKind::Outliers => Self {
        value,
        value_with_unit: count(value),
      },
    })
  }
}

/// Sums pytest-benchmark's `"<mild>;<severe>"` outlier pair.
fn outlier_total(text: &str) -> Option<f64> {
  text
    .split(';')
    .map(|part| part.trim().parse::<f64>().ok())
    .sum()
}

fn count(value: f64) -> String {
  if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
    (value as i64).to_string()
  } else {
    value.to_string()
  }
}

/// Metrics of one benchmark, restricted to those requested for the run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenchmarkRecord {
  metrics: BTreeMap<Metric, MetricValue>,
}

impl BenchmarkRecord {
  pub fn new(metrics: BTreeMap<Metric, MetricValue>) -> Self {
    Self { metrics }
  }

  pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
    self.metrics.get(&metric)
  }
}

/// Benchmarks of one file, keyed by identifier, in file order.
///
/// A repeated identifier replaces the earlier record but keeps its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenchmarkSet {
  order: Vec<String>,
  records: HashMap<String, BenchmarkRecord>,
}

impl BenchmarkSet {
  /// Reads `path` and normalizes every benchmark in it.
  pub fn build(path: &Path, unit: TimeUnit, identifier: IdentifierField, metrics: &[Metric]) -> Result<Self> {
    let raw: RawBenchmarkFile = path.read_json()?;

    Self::from_raw(raw, unit, identifier, metrics).map_err(|reason| Error::parse(path, reason))
  }

  pub fn from_raw(
    raw: RawBenchmarkFile,
    unit: TimeUnit,
    identifier: IdentifierField,
    metrics: &[Metric],
  ) -> std::result::Result<Self, String> {
    let mut set = Self::default();

    for (i, benchmark) in raw.benchmarks.into_iter().enumerate() {
      let name = match identifier {
        IdentifierField::Name => benchmark.name,
        IdentifierField::Fullname => benchmark.fullname,
      }
      .ok_or_else(|| format!("benchmark #{i} has no {} field", identifier.name()))?;

      let stats = benchmark.stats.ok_or_else(|| format!("benchmark {name:?} has no stats"))?;

      let record = metrics
        .iter()
        .map(|&metric| {
          MetricValue::from_stats(metric, &stats, unit)
            .map(|value| (metric, value))
            .map_err(|reason| format!("benchmark {name:?}: {reason}"))
        })
        .collect::<std::result::Result<_, _>>()?;

      set.insert(name, BenchmarkRecord::new(record));
    }

    Ok(set)
  }

  pub fn insert(&mut self, name: String, record: BenchmarkRecord) {
    if self.records.insert(name.clone(), record).is_none() {
      self.order.push(name);
    }
  }

  pub fn get(&self, name: &str) -> Option<&BenchmarkRecord> {
    self.records.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &BenchmarkRecord)> {
    self
      .order
      .iter()
      .map(|name| (name.as_str(), &self.records[name]))
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use pretty_assertions::assert_eq;

  use super::*;

  const TIMING: &[Metric] = &[Metric::Min, Metric::Max, Metric::Mean, Metric::Stddev];

  fn fixture(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{json}").unwrap();
    file
  }

  fn sample() -> tempfile::NamedTempFile {
    fixture(
      r#"{
        "machine_info": {"node": "runner"},
        "benchmarks": [
          {
            "group": null,
            "name": "test_parse",
            "fullname": "tests/test_io.py::test_parse",
            "stats": {
              "min": 0.5, "max": 2.0, "mean": 1.25, "median": 1.0, "stddev": 0.125,
              "ops": 0.8, "rounds": 5, "iterations": 1, "outliers": "1;0", "iqr": 0.3
            }
          },
          {
            "name": "test_dump",
            "fullname": "tests/test_io.py::test_dump",
            "stats": {
              "min": 0.001, "max": 0.003, "mean": 0.002, "median": 0.002, "stddev": 0.0005,
              "ops": 500.0, "rounds": 120, "iterations": 10, "outliers": "2;3"
            }
          }
        ]
      }"#,
    )
  }

  #[test]
  fn builds_records_in_file_order() {
    let file = sample();
    let set = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Name, TIMING).unwrap();

    let names = set.iter().map(|(name, _)| name).collect::<Vec<_>>();
    assert_eq!(names, vec!["test_parse", "test_dump"]);
    assert_eq!(set.len(), 2);

    let mean = set.get("test_parse").unwrap().get(Metric::Mean).unwrap();
    assert_eq!(mean.value, 1.25);
    assert_eq!(mean.value_with_unit, "1.25 s");
    assert_eq!(set.get("test_parse").unwrap().get(Metric::Ops), None);
  }

  #[test]
  fn keys_by_fullname() {
    let file = sample();
    let set = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Fullname, TIMING).unwrap();

    assert!(set.get("tests/test_io.py::test_dump").is_some());
    assert!(set.get("test_dump").is_none());
  }

  #[test]
  fn scales_timing_metrics() {
    let file = sample();
    let set = BenchmarkSet::build(file.path(), TimeUnit::Milliseconds, IdentifierField::Name, TIMING).unwrap();
    let dump = set.get("test_dump").unwrap();

    assert_eq!(dump.get(Metric::Min).unwrap().value_with_unit, "1.00 ms");
    assert_eq!(dump.get(Metric::Stddev).unwrap().value_with_unit, "0.50 ms");

    let set = BenchmarkSet::build(file.path(), TimeUnit::Microseconds, IdentifierField::Name, TIMING).unwrap();
    let dump = set.get("test_dump").unwrap();

    assert_eq!(dump.get(Metric::Max).unwrap().value_with_unit, "3000.00 μs");
  }

  #[test]
  fn formats_non_timing_metrics() {
    let file = sample();
    let metrics = [Metric::Ops, Metric::Rounds, Metric::Iterations, Metric::Outliers];
    let set = BenchmarkSet::build(file.path(), TimeUnit::Microseconds, IdentifierField::Name, &metrics).unwrap();
    let dump = set.get("test_dump").unwrap();

    assert_eq!(dump.get(Metric::Ops).unwrap().value_with_unit, "500.0000");
    assert_eq!(dump.get(Metric::Rounds).unwrap().value_with_unit, "120");
    assert_eq!(dump.get(Metric::Iterations).unwrap().value_with_unit, "10");
    assert_eq!(
      dump.get(Metric::Outliers).unwrap(),
      &MetricValue {
        value: 5.0,
        value_with_unit: "2;3".to_string(),
      }
    );
  }

  #[test]
  fn mean_of_one_hundred_seconds() {
    let raw = RawBenchmarkFile {
      benchmarks: vec![RawBenchmark {
        name: Some("a".to_string()),
        fullname: None,
        stats: Some(RawStats {
          mean: Some(100.0),
          stddev: Some(5.0),
          ..RawStats::default()
        }),
      }],
    };

    let set = BenchmarkSet::from_raw(raw, TimeUnit::Seconds, IdentifierField::Name, &[Metric::Mean]).unwrap();
    assert_eq!(set.get("a").unwrap().get(Metric::Mean).unwrap().value_with_unit, "100.00 s");
  }

  #[test]
  fn duplicate_identifiers_last_write_wins() {
    let file = fixture(
      r#"{"benchmarks": [
        {"name": "dup", "stats": {"mean": 1.0}},
        {"name": "other", "stats": {"mean": 2.0}},
        {"name": "dup", "stats": {"mean": 3.0}}
      ]}"#,
    );
    let set = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Name, &[Metric::Mean]).unwrap();

    assert_eq!(set.len(), 2);
    assert_eq!(set.iter().map(|(name, _)| name).collect::<Vec<_>>(), vec!["dup", "other"]);
    assert_eq!(set.get("dup").unwrap().get(Metric::Mean).unwrap().value, 3.0);
  }

  #[test]
  fn missing_stats_is_a_parse_error() {
    let file = fixture(r#"{"benchmarks": [{"name": "a"}]}"#);
    let err = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Name, &[Metric::Mean]).unwrap_err();

    assert!(matches!(&err, Error::Parse { reason, .. } if reason.contains("has no stats")), "{err}");
  }

  #[test]
  fn missing_metric_is_a_parse_error() {
    let file = fixture(r#"{"benchmarks": [{"name": "a", "stats": {"mean": 1.0}}]}"#);
    let err = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Name, &[Metric::Median]).unwrap_err();

    assert!(matches!(&err, Error::Parse { reason, .. } if reason.contains("stats.median")), "{err}");
  }

  #[test]
  fn missing_identifier_is_a_parse_error() {
    let file = fixture(r#"{"benchmarks": [{"name": "a", "stats": {"mean": 1.0}}]}"#);
    let err = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Fullname, &[Metric::Mean]).unwrap_err();

    assert!(matches!(err, Error::Parse { .. }));
  }

  #[test]
  fn wrong_shape_is_a_parse_error() {
    let file = fixture(r#"{"results": []}"#);
    let err = BenchmarkSet::build(file.path(), TimeUnit::Seconds, IdentifierField::Name, &[Metric::Mean]).unwrap_err();

    assert!(matches!(err, Error::Parse { .. }));
  }

  #[test]
  fn outlier_text_must_be_numeric() {
    assert_eq!(outlier_total("1;0"), Some(1.0));
    assert_eq!(outlier_total("4"), Some(4.0));
    assert_eq!(outlier_total("x;1"), None);
  }
}
