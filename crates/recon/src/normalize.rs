//! Input boundary: turns loosely-shaped JSON records into [`ReconRow`]s.
//!
//! Upstream endpoints disagree on key spelling (snake_case vs camelCase,
//! legacy names), on whether amounts are numbers or strings, and on whether
//! dates carry a time part. All of that is resolved here, once, so nothing
//! downstream branches on which field name was populated.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::config::ReconConfig;
use crate::error::RowError;
use crate::model::{IdentityStatus, InputSource, MatchConfidence, ReconRow, RejectedRow};

pub(crate) type Object = Map<String, Value>;

/// Largest amount accepted in any single field, in minor units (10 billion
/// in major units). Keeps every weekly and grand-total sum inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

// ---------------------------------------------------------------------------
// Field aliases
// ---------------------------------------------------------------------------

const PERSON_KEY: &[&str] = &["person_key", "personKey"];
const DRIVER_ID: &[&str] = &["driver_id", "driverId"];
const MILESTONE: &[&str] = &["milestone_value", "milestoneValue", "milestone"];
const EXPECTED_AMOUNT: &[&str] = &["expected_amount", "expectedAmount", "amount_expected"];
const CURRENCY: &[&str] = &["currency"];
const LEAD_DATE: &[&str] = &["lead_date", "leadDate"];
const DUE_DATE: &[&str] = &["due_date", "dueDate"];
const PAY_WEEK: &[&str] = &["pay_week_start_monday", "payWeekStartMonday"];
const PAYMENT_KEY: &[&str] = &["paid_payment_key", "paidPaymentKey", "payment_key"];
const PAID_DATE: &[&str] = &["paid_date", "paidDate"];
const PAID_CONFIRMED: &[&str] = &["paid_confirmed_flag", "paidConfirmedFlag", "paid_is_confirmed"];
const PAID_ENRICHED: &[&str] = &["paid_enriched_flag", "paidEnrichedFlag", "paid_is_enriched"];
const PAID_AMOUNT: &[&str] = &["paid_amount", "paidAmount", "amount_paid"];
const IDENTITY_STATUS: &[&str] = &["identity_status", "identityStatus"];
const MATCH_RULE: &[&str] = &["match_rule", "matchRule"];
const MATCH_CONFIDENCE: &[&str] = &["match_confidence", "matchConfidence"];

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Normalize every record, splitting the batch into accepted rows and
/// rejected rows. Never fails as a whole.
pub fn normalize_rows(records: &[Value], config: &ReconConfig) -> (Vec<ReconRow>, Vec<RejectedRow>) {
    let mut rows = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match normalize_row(record, config) {
            Ok(row) => rows.push(row),
            Err(err) => {
                let person_key = record
                    .as_object()
                    .and_then(|obj| lookup(obj, PERSON_KEY))
                    .map(display_value);
                log::warn!(
                    "rejecting reconciliation row {index} (person_key={}): {err}",
                    person_key.as_deref().unwrap_or("?")
                );
                rejected.push(RejectedRow {
                    source: InputSource::Items,
                    index,
                    person_key,
                    kind: err.kind(),
                    field: err.field(),
                    raw_value: err.raw_value().map(str::to_string),
                    message: err.to_string(),
                });
            }
        }
    }

    (rows, rejected)
}

// ---------------------------------------------------------------------------
// Single row
// ---------------------------------------------------------------------------

pub fn normalize_row(record: &Value, config: &ReconConfig) -> Result<ReconRow, RowError> {
    let obj = record.as_object().ok_or(RowError::NotAnObject)?;

    let person_key = opt_string(obj, "person_key", PERSON_KEY)?
        .ok_or(RowError::MissingField { field: "person_key" })?;
    let driver_id = opt_string(obj, "driver_id", DRIVER_ID)?;

    let milestone_value = milestone(obj, config)?;

    let expected_cents = opt_amount(obj, "expected_amount", EXPECTED_AMOUNT)?;
    let paid_cents = opt_amount(obj, "paid_amount", PAID_AMOUNT)?;

    let currency = match opt_string(obj, "currency", CURRENCY)? {
        Some(c) => {
            let upper = c.to_ascii_uppercase();
            if upper.len() != 3 || !upper.chars().all(|ch| ch.is_ascii_alphabetic()) {
                return Err(RowError::InvalidValue { field: "currency", value: c });
            }
            upper
        }
        None => config.default_currency.trim().to_ascii_uppercase(),
    };

    let lead_date = opt_date(obj, "lead_date", LEAD_DATE)?
        .ok_or(RowError::MissingField { field: "lead_date" })?;
    let due_date = match opt_date(obj, "due_date", DUE_DATE)? {
        Some(d) => d,
        None => lead_date
            .checked_add_days(Days::new(u64::from(config.window_days)))
            .ok_or_else(|| {
                RowError::Invariant(format!(
                    "due_date derived from lead_date {lead_date} + {} days is out of range",
                    config.window_days
                ))
            })?,
    };
    if due_date < lead_date {
        return Err(RowError::Invariant(format!(
            "due_date {due_date} is before lead_date {lead_date}"
        )));
    }

    let pay_week_start_monday = opt_date(obj, "pay_week_start_monday", PAY_WEEK)?;
    let paid_payment_key = opt_string(obj, "paid_payment_key", PAYMENT_KEY)?;
    let paid_date = opt_date(obj, "paid_date", PAID_DATE)?;

    let paid_confirmed = flag(obj, "paid_confirmed_flag", PAID_CONFIRMED)?;
    let paid_enriched = flag(obj, "paid_enriched_flag", PAID_ENRICHED)?;
    if paid_confirmed && paid_enriched {
        return Err(RowError::Invariant(
            "payment is flagged both confirmed and enriched".into(),
        ));
    }

    // Absent identity evidence is treated as no match.
    let identity_status = match opt_string(obj, "identity_status", IDENTITY_STATUS)? {
        Some(s) => IdentityStatus::parse(&s)
            .ok_or(RowError::InvalidValue { field: "identity_status", value: s })?,
        None => IdentityStatus::NoMatch,
    };
    if identity_status == IdentityStatus::Confirmed && driver_id.is_none() {
        return Err(RowError::Invariant(
            "confirmed identity without a driver_id".into(),
        ));
    }

    let match_rule = opt_string(obj, "match_rule", MATCH_RULE)?;
    let match_confidence = match opt_string(obj, "match_confidence", MATCH_CONFIDENCE)? {
        Some(s) => Some(
            MatchConfidence::parse(&s)
                .ok_or(RowError::InvalidValue { field: "match_confidence", value: s })?,
        ),
        None => None,
    };

    Ok(ReconRow {
        person_key,
        driver_id,
        milestone_value,
        expected_cents,
        currency,
        lead_date,
        due_date,
        pay_week_start_monday,
        paid_payment_key,
        paid_date,
        paid_confirmed,
        paid_enriched,
        paid_cents,
        identity_status,
        match_rule,
        match_confidence,
    })
}

// ---------------------------------------------------------------------------
// Scalar parsers
// ---------------------------------------------------------------------------

/// Parse an upstream date: plain `YYYY-MM-DD`, RFC 3339, or a naive
/// timestamp. Timestamps keep only their calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Parse a decimal amount into minor units (two decimal places).
pub fn parse_amount_cents(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    if frac_part.len() > 2 {
        let value: f64 = s.parse().ok()?;
        return cents_from_f64(value);
    }

    let whole: i64 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let frac: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse().ok()?,
    };
    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}

fn cents_from_f64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let cents = (value * 100.0).round();
    if cents.abs() > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

// ---------------------------------------------------------------------------
// Field accessors
// ---------------------------------------------------------------------------

/// First non-null value among the aliases.
pub(crate) fn lookup<'a>(obj: &'a Object, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

pub(crate) fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn opt_string(obj: &Object, field: &'static str, aliases: &[&str]) -> Result<Option<String>, RowError> {
    match lookup(obj, aliases) {
        None => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(RowError::InvalidValue { field, value: other.to_string() }),
    }
}

pub(crate) fn opt_date(obj: &Object, field: &'static str, aliases: &[&str]) -> Result<Option<NaiveDate>, RowError> {
    match lookup(obj, aliases) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_date(s)
            .map(Some)
            .ok_or_else(|| RowError::DateParse { field, value: s.clone() }),
        Some(other) => Err(RowError::DateParse { field, value: other.to_string() }),
    }
}

pub(crate) fn opt_amount(obj: &Object, field: &'static str, aliases: &[&str]) -> Result<Option<i64>, RowError> {
    let cents = match lookup(obj, aliases) {
        None => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => parse_amount_cents(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i.checked_mul(100),
            None => n.as_f64().and_then(cents_from_f64),
        },
        Some(_) => None,
    };
    match cents {
        Some(c) if !(0..=MAX_AMOUNT_CENTS).contains(&c) => Err(RowError::InvalidValue {
            field,
            value: display_value(lookup(obj, aliases).unwrap_or(&Value::Null)),
        }),
        Some(c) => Ok(Some(c)),
        None => Err(RowError::AmountParse {
            field,
            value: display_value(lookup(obj, aliases).unwrap_or(&Value::Null)),
        }),
    }
}

fn flag(obj: &Object, field: &'static str, aliases: &[&str]) -> Result<bool, RowError> {
    match lookup(obj, aliases) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(RowError::InvalidValue { field, value: n.to_string() }),
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Ok(true),
            "false" | "f" | "0" | "no" | "" => Ok(false),
            _ => Err(RowError::InvalidValue { field, value: s.clone() }),
        },
        Some(other) => Err(RowError::InvalidValue { field, value: other.to_string() }),
    }
}

pub(crate) fn opt_count(obj: &Object, field: &'static str, aliases: &[&str]) -> Result<Option<usize>, RowError> {
    let raw = match lookup(obj, aliases) {
        None => return Ok(None),
        Some(v) => v,
    };
    let count = match raw {
        Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    count
        .map(Some)
        .ok_or_else(|| RowError::InvalidValue { field, value: display_value(raw) })
}

fn milestone(obj: &Object, config: &ReconConfig) -> Result<u32, RowError> {
    const FIELD: &str = "milestone_value";
    let raw = lookup(obj, MILESTONE).ok_or(RowError::MissingField { field: FIELD })?;
    let value = match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    match value {
        Some(v) if config.is_known_milestone(v) => Ok(v),
        _ => Err(RowError::InvalidValue { field: FIELD, value: display_value(raw) }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
