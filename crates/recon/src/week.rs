//! Effective-week bucketing.
//!
//! The upstream `pay_week_start_monday` can lag behind when a payment
//! actually lands, so rows are bucketed by their most authoritative date
//! instead and the nominal week is only a last resort.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{EffectiveWeek, ReconRow, WeekSource};

/// Monday of the ISO week containing `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    let week = date.iso_week();
    // Every (iso year, iso week) produced by chrono has a Monday.
    NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
        .unwrap_or_else(|| date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday())))
}

/// Pick the authoritative date by priority and bucket it. `None` only when
/// every candidate is absent.
pub fn resolve_week(
    paid_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    lead_date: Option<NaiveDate>,
    nominal_week: Option<NaiveDate>,
) -> Option<EffectiveWeek> {
    let (date, source) = paid_date
        .map(|d| (d, WeekSource::PaidDate))
        .or_else(|| due_date.map(|d| (d, WeekSource::DueDate)))
        .or_else(|| lead_date.map(|d| (d, WeekSource::LeadDate)))
        .or_else(|| nominal_week.map(|d| (d, WeekSource::NominalWeek)))?;

    Some(EffectiveWeek {
        week_start: iso_week_start(date),
        source,
        inferred: source == WeekSource::NominalWeek,
    })
}

/// The week a row is aggregated under. The paid date only counts when the
/// row is actually paid; otherwise the due date, which every normalized row
/// has, decides. Rows are therefore never inferred from the nominal week.
pub fn effective_week(row: &ReconRow) -> EffectiveWeek {
    let is_paid = row.paid_confirmed || row.paid_enriched;
    let (date, source) = match row.paid_date.filter(|_| is_paid) {
        Some(paid) => (paid, WeekSource::PaidDate),
        None => (row.due_date, WeekSource::DueDate),
    };
    EffectiveWeek {
        week_start: iso_week_start(date),
        source,
        inferred: false,
    }
}

impl EffectiveWeek {
    /// The nominal upstream week, when it disagrees with this one.
    pub fn reassigned_from(&self, nominal: Option<NaiveDate>) -> Option<NaiveDate> {
        nominal
            .map(iso_week_start)
            .filter(|n| *n != self.week_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdentityStatus;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(lead: &str, due: &str) -> ReconRow {
        ReconRow {
            person_key: "pk".into(),
            driver_id: None,
            milestone_value: 1,
            expected_cents: Some(2500),
            currency: "RUB".into(),
            lead_date: date(lead),
            due_date: date(due),
            pay_week_start_monday: None,
            paid_payment_key: None,
            paid_date: None,
            paid_confirmed: false,
            paid_enriched: false,
            paid_cents: None,
            identity_status: IdentityStatus::NoMatch,
            match_rule: None,
            match_confidence: None,
        }
    }

    #[test]
    fn monday_is_its_own_week_start() {
        assert_eq!(iso_week_start(date("2024-01-01")), date("2024-01-01"));
    }

    #[test]
    fn sunday_belongs_to_previous_monday() {
        assert_eq!(iso_week_start(date("2024-01-14")), date("2024-01-08"));
    }

    #[test]
    fn week_53_spans_year_boundary() {
        // 2020-W53 runs Mon 2020-12-28 .. Sun 2021-01-03
        assert_eq!(date("2021-01-03").iso_week().week(), 53);
        assert_eq!(iso_week_start(date("2021-01-03")), date("2020-12-28"));
        assert_eq!(iso_week_start(date("2020-12-31")), date("2020-12-28"));
        // 2026-W53 runs Mon 2026-12-28 .. Sun 2027-01-03
        assert_eq!(iso_week_start(date("2027-01-02")), date("2026-12-28"));
    }

    #[test]
    fn january_days_in_last_years_week_one() {
        // 2024-12-30 is ISO 2025-W01
        assert_eq!(iso_week_start(date("2025-01-01")), date("2024-12-30"));
    }

    #[test]
    fn unpaid_row_buckets_by_due_date() {
        let r = row("2024-01-01", "2024-01-15");
        let w = effective_week(&r);
        assert_eq!(w.week_start, date("2024-01-15"));
        assert_eq!(w.source, WeekSource::DueDate);
        assert!(!w.inferred);
    }

    #[test]
    fn paid_row_buckets_by_paid_date() {
        let mut r = row("2024-01-01", "2024-01-15");
        r.paid_confirmed = true;
        r.paid_date = Some(date("2024-01-10"));
        let w = effective_week(&r);
        assert_eq!(w.week_start, date("2024-01-08"));
        assert_eq!(w.source, WeekSource::PaidDate);
    }

    #[test]
    fn paid_date_ignored_when_not_paid() {
        let mut r = row("2024-01-01", "2024-01-15");
        r.paid_date = Some(date("2024-01-03"));
        assert_eq!(effective_week(&r).source, WeekSource::DueDate);
    }

    #[test]
    fn nominal_week_is_last_resort_and_inferred() {
        let w = resolve_week(None, None, None, Some(date("2024-01-10"))).unwrap();
        assert_eq!(w.week_start, date("2024-01-08"));
        assert_eq!(w.source, WeekSource::NominalWeek);
        assert!(w.inferred);

        let w = resolve_week(None, None, Some(date("2024-01-02")), Some(date("2024-03-04"))).unwrap();
        assert_eq!(w.source, WeekSource::LeadDate);
        assert_eq!(w.week_start, date("2024-01-01"));

        assert!(resolve_week(None, None, None, None).is_none());
    }

    #[test]
    fn paid_row_without_paid_date_falls_back_to_due_date() {
        let mut r = row("2024-01-01", "2024-01-15");
        r.paid_confirmed = true;
        r.pay_week_start_monday = Some(date("2024-01-08"));
        let w = effective_week(&r);
        assert_eq!(w.source, WeekSource::DueDate);
        assert!(!w.inferred);
    }

    #[test]
    fn reassignment_against_nominal_week() {
        let mut r = row("2024-01-01", "2024-01-15");
        r.pay_week_start_monday = Some(date("2024-01-08"));
        let w = effective_week(&r);
        assert_eq!(w.reassigned_from(r.pay_week_start_monday), Some(date("2024-01-08")));

        r.pay_week_start_monday = Some(date("2024-01-17"));
        assert_eq!(effective_week(&r).reassigned_from(r.pay_week_start_monday), None);
    }

    #[test]
    fn bucketing_is_idempotent() {
        let mut r = row("2024-12-20", "2025-01-03");
        r.paid_enriched = true;
        r.paid_date = Some(date("2024-12-31"));
        assert_eq!(effective_week(&r), effective_week(&r));
        assert_eq!(effective_week(&r).week_start, date("2024-12-30"));
    }
}
