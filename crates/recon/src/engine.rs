use chrono::NaiveDate;
use serde_json::Value;

use crate::aggregate::{aggregate, totals};
use crate::classify::classify_rows;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::evidence::compute_breakdown;
use crate::model::{Breakdown, ReconMeta, ReconResult, RejectedRow, SourceMode, WeeklyAggregate};
use crate::normalize::normalize_rows;
use crate::reasons::ReasonCatalog;
use crate::summary::{compare, summary_to_weeks};

/// Raw records from one endpoint, not yet normalized.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub records: Vec<Value>,
}

impl ReconInput {
    /// Accepts a bare JSON array, or an object wrapping the array under
    /// `items` or `rows`. Anything else is a whole-input error.
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        let value: Value =
            serde_json::from_str(input).map_err(|e| ReconError::InputShape(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ReconError> {
        match value {
            Value::Array(records) => Ok(Self { records }),
            Value::Object(mut obj) => {
                let inner = ["items", "rows"].iter().find_map(|k| obj.remove(*k));
                match inner {
                    Some(Value::Array(records)) => Ok(Self { records }),
                    _ => Err(ReconError::InputShape(
                        "expected an array or an object with an `items`/`rows` array".into(),
                    )),
                }
            }
            other => Err(ReconError::InputShape(format!(
                "expected an array, found {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Which raw inputs are available. Items are authoritative whenever present.
#[derive(Debug, Clone, Copy)]
pub enum ReconSource<'a> {
    Items(&'a ReconInput),
    Summary(&'a ReconInput),
    Both {
        items: &'a ReconInput,
        summary: &'a ReconInput,
    },
}

/// Run reconciliation as of `as_of`. Only config problems fail the call;
/// bad rows from either input are returned in `rejected`, tagged with
/// their source.
pub fn run(
    config: &ReconConfig,
    source: ReconSource<'_>,
    as_of: NaiveDate,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    let catalog = ReasonCatalog::from_config(config);

    let (mode, weeks, rejected, breakdown, divergences) = match source {
        ReconSource::Items(items) => {
            let (weeks, rejected, breakdown) = run_items(config, items, as_of, &catalog);
            (SourceMode::Items, weeks, rejected, breakdown, Vec::new())
        }
        ReconSource::Summary(summary) => {
            let (weeks, rejected) = summary_to_weeks(&summary.records);
            (SourceMode::Summary, weeks, rejected, Breakdown::default(), Vec::new())
        }
        ReconSource::Both { items, summary } => {
            let (weeks, mut rejected, breakdown) = run_items(config, items, as_of, &catalog);
            let (summary_weeks, summary_rejected) = summary_to_weeks(&summary.records);
            rejected.extend(summary_rejected);
            let divergences = compare(&weeks, &summary_weeks);
            (SourceMode::ItemsWithSummaryCheck, weeks, rejected, breakdown, divergences)
        }
    };

    let grand = totals(&weeks);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            as_of,
            mode,
        },
        weeks,
        totals: grand,
        rejected,
        breakdown,
        divergences,
    })
}

fn run_items(
    config: &ReconConfig,
    items: &ReconInput,
    as_of: NaiveDate,
    catalog: &ReasonCatalog,
) -> (Vec<WeeklyAggregate>, Vec<RejectedRow>, Breakdown) {
    let (rows, rejected) = normalize_rows(&items.records, config);
    let classified = classify_rows(&rows, as_of);
    let weeks = aggregate(&classified);
    let breakdown = compute_breakdown(&classified, catalog);
    (weeks, rejected, breakdown)
}
