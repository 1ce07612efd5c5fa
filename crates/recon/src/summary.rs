//! Pre-aggregated summary mode.
//!
//! The summary endpoint reports one record per week (sometimes split per
//! milestone). Those records are converted into [`Totals`] partials and
//! folded with the same `merge` the item path uses, so there is exactly one
//! aggregation implementation. When raw items are also available they are
//! authoritative and the summary is only compared against them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::RowError;
use crate::model::{Divergence, DivergenceField, InputSource, RejectedRow, Totals, WeeklyAggregate};
use crate::normalize::{opt_amount, opt_count, opt_date, opt_string};
use crate::week::iso_week_start;

const WEEK: &[&str] = &["pay_week_start_monday", "payWeekStartMonday", "week_start"];
const EXPECTED: &[&str] = &["amount_expected_sum", "amountExpectedSum", "expected_sum"];
const CONFIRMED: &[&str] = &["amount_paid_confirmed_sum", "amountPaidConfirmedSum"];
const ENRICHED: &[&str] = &["amount_paid_enriched_sum", "amountPaidEnrichedSum"];
// Two spellings of the same visible total.
const VISIBLE: &[&str] = &["amount_paid_total_visible", "amount_paid_sum", "amountPaidSum"];
const PENDING_ACTIVE: &[&str] = &["amount_pending_active_sum", "amountPendingActiveSum"];
const CURRENCY: &[&str] = &["currency"];

const COUNT_ROWS: &[&str] = &["count_items", "count_rows", "rows_total"];
const COUNT_EXPECTED: &[&str] = &["count_expected", "countExpected"];
const COUNT_PAID: &[&str] = &["count_paid", "countPaid"];
const COUNT_CONFIRMED: &[&str] = &["count_paid_confirmed", "countPaidConfirmed"];
const COUNT_ENRICHED: &[&str] = &["count_paid_enriched", "countPaidEnriched"];
const COUNT_ACTIVE: &[&str] = &["count_pending_active", "countPendingActive"];
const COUNT_EXPIRED: &[&str] = &["count_pending_expired", "countPendingExpired"];
const ANOMALIES: &[&str] = &["anomalies_total", "count_anomalies", "anomaliesTotal"];

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert one summary record into a week start and a totals partial.
///
/// When only the visible paid total is reported, the part not attributed to
/// enriched payments is counted as confirmed. Row count defaults to the sum
/// of the status counts.
pub fn summary_row_totals(record: &Value) -> Result<(NaiveDate, Totals), RowError> {
    let obj = record.as_object().ok_or(RowError::NotAnObject)?;

    let week = opt_date(obj, "pay_week_start_monday", WEEK)?
        .ok_or(RowError::MissingField { field: "pay_week_start_monday" })?;

    let mut t = Totals::default();
    t.expected_cents = opt_amount(obj, "amount_expected_sum", EXPECTED)?.unwrap_or(0);

    let enriched = opt_amount(obj, "amount_paid_enriched_sum", ENRICHED)?;
    let confirmed = opt_amount(obj, "amount_paid_confirmed_sum", CONFIRMED)?;
    let visible = opt_amount(obj, "amount_paid_total_visible", VISIBLE)?;
    t.paid_enriched_cents = enriched.unwrap_or(0);
    t.paid_confirmed_cents = match (confirmed, visible) {
        (Some(c), _) => c,
        (None, Some(v)) => v - t.paid_enriched_cents,
        (None, None) => 0,
    };
    t.assumed.pending_active_cents = opt_amount(obj, "amount_pending_active_sum", PENDING_ACTIVE)?.unwrap_or(0);

    t.count_expected = opt_count(obj, "count_expected", COUNT_EXPECTED)?.unwrap_or(0);
    t.count_paid_enriched = opt_count(obj, "count_paid_enriched", COUNT_ENRICHED)?.unwrap_or(0);
    t.count_paid_confirmed = match (
        opt_count(obj, "count_paid_confirmed", COUNT_CONFIRMED)?,
        opt_count(obj, "count_paid", COUNT_PAID)?,
    ) {
        (Some(c), _) => c,
        (None, Some(p)) => p.saturating_sub(t.count_paid_enriched),
        (None, None) => 0,
    };
    t.count_pending_active = opt_count(obj, "count_pending_active", COUNT_ACTIVE)?.unwrap_or(0);
    t.count_pending_expired = opt_count(obj, "count_pending_expired", COUNT_EXPIRED)?.unwrap_or(0);
    t.count_rows = match opt_count(obj, "count_items", COUNT_ROWS)? {
        Some(n) => n,
        None => {
            t.count_paid_confirmed
                + t.count_paid_enriched
                + t.count_pending_active
                + t.count_pending_expired
        }
    };
    t.anomalies_total = opt_count(obj, "anomalies_total", ANOMALIES)?.unwrap_or(0);

    if let Some(c) = opt_string(obj, "currency", CURRENCY)? {
        t.currencies.insert(c.to_ascii_uppercase());
    }

    t.refresh();
    Ok((iso_week_start(week), t))
}

/// Fold summary records into weekly aggregates, most recent week first.
/// Bad records are rejected individually.
pub fn summary_to_weeks(records: &[Value]) -> (Vec<WeeklyAggregate>, Vec<RejectedRow>) {
    let mut weeks: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match summary_row_totals(record) {
            Ok((week, partial)) => weeks.entry(week).or_default().merge(&partial),
            Err(err) => {
                log::warn!("rejecting summary row {index}: {err}");
                rejected.push(RejectedRow {
                    source: InputSource::Summary,
                    index,
                    person_key: None,
                    kind: err.kind(),
                    field: err.field(),
                    raw_value: err.raw_value().map(str::to_string),
                    message: err.to_string(),
                });
            }
        }
    }

    let weeks = weeks
        .into_iter()
        .rev()
        .map(|(week_start, totals)| WeeklyAggregate { week_start, totals })
        .collect();
    (weeks, rejected)
}

// ---------------------------------------------------------------------------
// Divergence
// ---------------------------------------------------------------------------

/// Compare item-derived weeks against summary weeks. Most recent week first.
pub fn compare(items: &[WeeklyAggregate], summary: &[WeeklyAggregate]) -> Vec<Divergence> {
    let by_week = |weeks: &[WeeklyAggregate]| -> BTreeMap<NaiveDate, Totals> {
        weeks.iter().map(|w| (w.week_start, w.totals.clone())).collect()
    };
    let items = by_week(items);
    let summary = by_week(summary);

    let all_weeks: BTreeSet<NaiveDate> = items.keys().chain(summary.keys()).copied().collect();
    let mut out = Vec::new();

    for week in all_weeks.into_iter().rev() {
        match (items.get(&week), summary.get(&week)) {
            (Some(i), Some(s)) => {
                let checks = [
                    (DivergenceField::ExpectedCents, i.expected_cents, s.expected_cents),
                    (DivergenceField::PaidVisibleCents, i.paid_visible_cents, s.paid_visible_cents),
                    (DivergenceField::CountRows, i.count_rows as i64, s.count_rows as i64),
                    (DivergenceField::AnomaliesTotal, i.anomalies_total as i64, s.anomalies_total as i64),
                ];
                for (field, items_value, summary_value) in checks {
                    if items_value != summary_value {
                        out.push(Divergence { week_start: week, field, items: items_value, summary: summary_value });
                    }
                }
            }
            (Some(i), None) => out.push(Divergence {
                week_start: week,
                field: DivergenceField::WeekPresence,
                items: i.count_rows as i64,
                summary: 0,
            }),
            (None, Some(s)) => out.push(Divergence {
                week_start: week,
                field: DivergenceField::WeekPresence,
                items: 0,
                summary: s.count_rows as i64,
            }),
            (None, None) => {}
        }
    }

    for d in &out {
        log::warn!(
            "summary diverges from items for week {} on {:?}: items={} summary={}",
            d.week_start,
            d.field,
            d.items,
            d.summary
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn visible_alias_spellings_agree() {
        let a = json!({"pay_week_start_monday": "2024-01-15", "amount_paid_sum": 60, "amount_paid_enriched_sum": 10});
        let b = json!({"pay_week_start_monday": "2024-01-15", "amount_paid_total_visible": "60.00", "amount_paid_enriched_sum": 10});
        let (_, ta) = summary_row_totals(&a).unwrap();
        let (_, tb) = summary_row_totals(&b).unwrap();
        assert_eq!(ta, tb);
        assert_eq!(ta.paid_visible_cents, 6000);
        assert_eq!(ta.paid_confirmed_cents, 5000);
        assert_eq!(ta.paid_enriched_cents, 1000);
    }

    #[test]
    fn derived_fields_follow_shared_rules() {
        let rec = json!({
            "pay_week_start_monday": "2024-01-17",
            "amount_expected_sum": 60,
            "amount_paid_confirmed_sum": 25,
            "amount_pending_active_sum": 35,
            "count_paid_confirmed": 1,
            "count_pending_active": 1,
            "anomalies_total": 0
        });
        let (week, t) = summary_row_totals(&rec).unwrap();
        // Non-Monday week dates are snapped to their ISO Monday.
        assert_eq!(week, date("2024-01-15"));
        assert_eq!(t.amount_diff_cents, 3500);
        assert_eq!(t.assumed.paid_assumed_cents, 6000);
        assert_eq!(t.count_rows, 2);
        assert_eq!(t.count_paid, 1);
    }

    #[test]
    fn split_rows_merge_per_week() {
        let records = vec![
            json!({"pay_week_start_monday": "2024-01-15", "amount_expected_sum": 25, "count_items": 1}),
            json!({"pay_week_start_monday": "2024-01-15", "amount_expected_sum": 35, "count_items": 1}),
            json!({"pay_week_start_monday": "2024-01-22", "amount_expected_sum": 100, "count_items": 1}),
            json!({"amount_expected_sum": 1}),
        ];
        let (weeks, rejected) = summary_to_weeks(&records);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start, date("2024-01-22"));
        assert_eq!(weeks[1].totals.expected_cents, 6000);
        assert_eq!(weeks[1].totals.count_rows, 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].source, InputSource::Summary);
        assert_eq!(rejected[0].index, 3);
        assert_eq!(rejected[0].field, Some("pay_week_start_monday"));
    }

    #[test]
    fn compare_reports_each_mismatch() {
        let (summary, _) = summary_to_weeks(&[
            json!({"pay_week_start_monday": "2024-01-15", "amount_expected_sum": 60, "count_items": 2, "anomalies_total": 1}),
            json!({"pay_week_start_monday": "2024-01-01", "amount_expected_sum": 5, "count_items": 1}),
        ]);
        let (items, _) = summary_to_weeks(&[
            json!({"pay_week_start_monday": "2024-01-15", "amount_expected_sum": 60, "count_items": 2, "anomalies_total": 0}),
            json!({"pay_week_start_monday": "2024-01-08", "amount_expected_sum": 5, "count_items": 1}),
        ]);
        let diffs = compare(&items, &summary);
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].week_start, date("2024-01-15"));
        assert_eq!(diffs[0].field, DivergenceField::AnomaliesTotal);
        assert_eq!((diffs[0].items, diffs[0].summary), (0, 1));
        assert_eq!(diffs[1].week_start, date("2024-01-08"));
        assert_eq!(diffs[1].field, DivergenceField::WeekPresence);
        assert_eq!(diffs[2].week_start, date("2024-01-01"));
        assert_eq!((diffs[2].items, diffs[2].summary), (0, 1));
    }

    #[test]
    fn identical_sides_have_no_divergence() {
        let (weeks, _) = summary_to_weeks(&[
            json!({"pay_week_start_monday": "2024-01-15", "amount_expected_sum": 60, "count_items": 2}),
        ]);
        assert!(compare(&weeks, &weeks).is_empty());
    }
}
