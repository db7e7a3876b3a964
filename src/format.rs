use std::fmt::Write;

use anyhow::{Context, Result};

use crate::{
  compare::{compare, Comparison, Status, Tally},
  config::Metric,
  error::Error,
  ext::F64Ext,
  stats::{BenchmarkRecord, BenchmarkSet},
};

const GREEN: &str = "#35bf28";
const RED: &str = "#d91a1a";

const MIN_COLUMN_WIDTH: usize = 3;

const DETAILS_SUMMARY: &str = "<summary> Expand to view detailed results </summary>";

/// Report heading prefix. Every report body starts with it.
pub const REPORT_PREFIX: &str = "## ";

/// What to put in the table and how to judge changes.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions<'a> {
  pub metrics: &'a [Metric],
  pub compare_metric: Metric,
  pub higher_is_better: bool,
  pub threshold: f64,
  pub title: &'a str,
}

/// Upper-cases the first word character of every word, lower-casing the rest.
pub fn title_case(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut in_word = false;

  for c in s.chars() {
    if c.is_whitespace() {
      in_word = false;
      out.push(c);
    } else if in_word {
      out.extend(c.to_lowercase());
    } else if c.is_alphanumeric() || c == '_' {
      in_word = true;
      out.extend(c.to_uppercase());
    } else {
      out.push(c);
    }
  }

  out
}

fn glyph(status: Status) -> &'static str {
  match status {
    Status::Ok => r"$\color{#35bf28}\textsf{\Large\&#x2714;\kern{0.2cm}\normalsize OK}$",
    Status::Warning => r"$\color{#D29922}\textsf{\Large\&#x26A0;\kern{0.2cm}\normalsize Warning}$",
    Status::Fail => r"$\color{#d91a1a}\textsf{\Large\&#x26D4;\kern{0.2cm}\normalsize Fail}$",
  }
}

fn format_header(options: &ReportOptions, with_baseline: bool) -> Vec<String> {
  let mut header = options
    .metrics
    .iter()
    .map(|metric| title_case(metric.name()))
    .collect::<Vec<_>>();

  if with_baseline {
    header.push(format!("{} on Repo `HEAD`", title_case(options.compare_metric.name())));
    header.push("Change".to_string());
  }

  header
}

fn cell(record: &BenchmarkRecord, metric: Metric) -> Result<String> {
  let value = record.get(metric).ok_or(Error::MetricNotLoaded { metric })?;

  Ok(value.value_with_unit.clone())
}

/// Signed percentage, colored once it is visible at two decimals and bold
/// when relevant.
fn format_change(comparison: &Comparison) -> String {
  let sign = if comparison.change_percent > 0.0 { "+" } else { "" };
  let mut change = format!(r"{sign}{}\\%", comparison.change_percent.fixed(2));

  if comparison.change_percent.abs() >= 0.01 {
    let color = if comparison.is_improvement { GREEN } else { RED };
    change = format!(r"\color{{{color}}}{change}");
  }

  if comparison.is_relevant {
    change = format!(r"\textbf{{{change}}}");
  }

  format!("${change}$")
}

fn format_summary(tally: &Tally) -> String {
  format!(
    "### Total Benchmarks: {}. Improved: $\\large\\color{{{GREEN}}}{}$. Worsened: $\\large\\color{{{RED}}}{}$.\n",
    tally.total, tally.improved, tally.worsened
  )
}

fn format_row(row: &[String], widths: &[usize]) -> String {
  let cells = widths
    .iter()
    .enumerate()
    .map(|(i, &width)| {
      let col = row.get(i).map(String::as_str).unwrap_or("");
      format!("{col:<width$}")
    })
    .collect::<Vec<_>>()
    .join(" | ");

  format!("| {cells} |")
}

/// Renders a GitHub pipe table, the first row being the header.
fn format_table(rows: &[Vec<String>]) -> Result<String> {
  let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
  let widths = (0..columns)
    .map(|i| {
      rows
        .iter()
        .filter_map(|row| row.get(i))
        .map(|col| col.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_COLUMN_WIDTH)
    })
    .collect::<Vec<_>>();

  let delimiter = widths.iter().map(|&width| "-".repeat(width)).collect::<Vec<_>>();

  let mut table = String::new();
  for (i, row) in rows.iter().enumerate() {
    if i > 0 {
      writeln!(table)?;
    }
    write!(table, "{}", format_row(row, &widths))?;

    if i == 0 {
      write!(table, "\n{}", format_row(&delimiter, &widths))?;
    }
  }

  Ok(table)
}

/// Builds the comment body. With a baseline, every benchmark of `current`
/// must also be in `baseline`.
pub fn render(current: &BenchmarkSet, baseline: Option<&BenchmarkSet>, options: &ReportOptions) -> Result<String> {
  let mut rows = vec![format_header(options, baseline.is_some())];
  let mut tally = Tally::default();

  for (name, record) in current.iter() {
    let mut row = options
      .metrics
      .iter()
      .map(|&metric| cell(record, metric))
      .collect::<Result<Vec<_>>>()
      .with_context(|| format!("row {name:?}"))?;

    if let Some(baseline) = baseline {
      let old = baseline.get(name).ok_or_else(|| Error::MissingBaseline { name: name.to_string() })?;
      let comparison = compare(
        record,
        old,
        options.compare_metric,
        options.higher_is_better,
        options.threshold,
      )
      .with_context(|| format!("compare {name:?}"))?;

      tally.add(&comparison);

      row.push(cell(old, options.compare_metric)?);
      row.push(format_change(&comparison));
    }

    rows.push(row);
  }

  let (status, summary) = match baseline {
    Some(_) => (glyph(tally.status()), format_summary(&tally)),
    None => ("", String::new()),
  };

  let title = format!("{REPORT_PREFIX}{status} \t {} \n", options.title);
  let details = format!(
    "<details> {DETAILS_SUMMARY} \n\n {} \n </details>",
    format_table(&rows).context("table")?
  );

  Ok(format!("{title} {summary} {details}"))
}
