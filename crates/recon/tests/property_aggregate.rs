// Property-based tests for classification and weekly aggregation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use yango_recon::aggregate::{aggregate, aggregate_rows, merge_weeks};
use yango_recon::classify::{classify, classify_rows};
use yango_recon::model::{IdentityStatus, PaidStatus, ReconRow};
use yango_recon::reasons::PAYMENT_WITHOUT_EXPECTATION;
use yango_recon::week::effective_week;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
}

#[derive(Debug, Clone, Copy)]
enum Payment {
    None,
    Confirmed,
    Enriched,
}

fn arb_payment() -> impl Strategy<Value = Payment> {
    prop_oneof![
        2 => Just(Payment::None),
        1 => Just(Payment::Confirmed),
        1 => Just(Payment::Enriched),
    ]
}

fn arb_identity() -> impl Strategy<Value = IdentityStatus> {
    prop_oneof![
        Just(IdentityStatus::Confirmed),
        Just(IdentityStatus::Enriched),
        Just(IdentityStatus::Ambiguous),
        Just(IdentityStatus::NoMatch),
    ]
}

/// Rows straddling the 2024/2025 year boundary so ISO week 1 edges are hit.
fn arb_row() -> impl Strategy<Value = ReconRow> {
    (
        0i64..60,
        prop_oneof![1 => Just(None), 4 => (0i64..20_000).prop_map(Some)],
        arb_payment(),
        0i64..30,
        arb_identity(),
        prop::bool::ANY,
        prop::sample::select(vec![1u32, 5, 25]),
    )
        .prop_map(|(lead_offset, expected, payment, paid_offset, identity, stale_week, milestone)| {
            let lead_date = base_date() + Duration::days(lead_offset);
            let due_date = lead_date + Duration::days(14);
            let paid = !matches!(payment, Payment::None);
            ReconRow {
                person_key: format!("pk_{lead_offset}_{paid_offset}"),
                driver_id: Some("drv".into()),
                milestone_value: milestone,
                expected_cents: expected,
                currency: "RUB".into(),
                lead_date,
                due_date,
                pay_week_start_monday: stale_week.then_some(lead_date),
                paid_payment_key: paid.then(|| format!("pay_{paid_offset}")),
                paid_date: paid.then(|| lead_date + Duration::days(paid_offset)),
                paid_confirmed: matches!(payment, Payment::Confirmed),
                paid_enriched: matches!(payment, Payment::Enriched),
                paid_cents: None,
                identity_status: identity,
                match_rule: None,
                match_confidence: None,
            }
        })
}

fn arb_as_of() -> impl Strategy<Value = NaiveDate> {
    (0i64..90).prop_map(|d| base_date() + Duration::days(d))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn aggregation_is_idempotent(rows in prop::collection::vec(arb_row(), 0..40), as_of in arb_as_of()) {
        prop_assert_eq!(aggregate_rows(&rows, as_of), aggregate_rows(&rows, as_of));
    }

    #[test]
    fn partition_invariance(
        rows in prop::collection::vec(arb_row(), 0..40),
        mask in prop::collection::vec(prop::bool::ANY, 40),
        as_of in arb_as_of(),
    ) {
        let (left, right): (Vec<_>, Vec<_>) = rows
            .iter()
            .cloned()
            .enumerate()
            .partition(|(i, _)| mask[*i]);
        let left: Vec<ReconRow> = left.into_iter().map(|(_, r)| r).collect();
        let right: Vec<ReconRow> = right.into_iter().map(|(_, r)| r).collect();

        let whole = aggregate_rows(&rows, as_of);
        let merged = merge_weeks(&aggregate_rows(&left, as_of), &aggregate_rows(&right, as_of));
        prop_assert_eq!(whole.clone(), merged);

        // Merge order does not matter either.
        let swapped = merge_weeks(&aggregate_rows(&right, as_of), &aggregate_rows(&left, as_of));
        prop_assert_eq!(whole, swapped);
    }

    #[test]
    fn three_way_merge_is_associative(
        rows in prop::collection::vec(arb_row(), 0..40),
        parts in prop::collection::vec(0u8..3, 40),
        as_of in arb_as_of(),
    ) {
        let part = |n: u8| -> Vec<ReconRow> {
            rows.iter()
                .zip(&parts)
                .filter(|(_, p)| **p == n)
                .map(|(r, _)| r.clone())
                .collect()
        };
        let a = aggregate_rows(&part(0), as_of);
        let b = aggregate_rows(&part(1), as_of);
        let c = aggregate_rows(&part(2), as_of);

        let left_first = merge_weeks(&merge_weeks(&a, &b), &c);
        let right_first = merge_weeks(&a, &merge_weeks(&b, &c));
        prop_assert_eq!(left_first.clone(), right_first);
        prop_assert_eq!(aggregate_rows(&rows, as_of), left_first);
    }

    #[test]
    fn expected_amount_is_conserved_per_week(rows in prop::collection::vec(arb_row(), 0..40), as_of in arb_as_of()) {
        let mut by_week: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for r in &rows {
            *by_week.entry(effective_week(r).week_start).or_insert(0) += r.expected_cents.unwrap_or(0);
        }
        let weeks = aggregate_rows(&rows, as_of);
        prop_assert_eq!(weeks.len(), by_week.len());
        for w in &weeks {
            prop_assert_eq!(w.totals.expected_cents, by_week[&w.week_start]);
        }
    }

    #[test]
    fn statuses_are_exhaustive(rows in prop::collection::vec(arb_row(), 0..40), as_of in arb_as_of()) {
        let weeks = aggregate(&classify_rows(&rows, as_of));
        let mut total = 0;
        for w in &weeks {
            let t = &w.totals;
            let statuses = t.count_paid_confirmed + t.count_paid_enriched
                + t.count_pending_active + t.count_pending_expired;
            prop_assert_eq!(statuses, t.count_rows);
            prop_assert_eq!(t.paid_visible_cents, t.paid_confirmed_cents + t.paid_enriched_cents);
            prop_assert_eq!(t.amount_diff_cents, t.expected_cents - t.paid_visible_cents);
            prop_assert_eq!(
                t.assumed.paid_assumed_cents,
                t.paid_visible_cents + t.assumed.pending_active_cents
            );
            total += t.count_rows;
        }
        prop_assert_eq!(total, rows.len());
    }

    #[test]
    fn weeks_strictly_descending_mondays(rows in prop::collection::vec(arb_row(), 0..40), as_of in arb_as_of()) {
        let weeks = aggregate_rows(&rows, as_of);
        for pair in weeks.windows(2) {
            prop_assert!(pair[0].week_start > pair[1].week_start);
        }
        for w in &weeks {
            prop_assert_eq!(w.week_start.format("%u").to_string(), "1");
        }
    }

    #[test]
    fn unpaid_future_rows_never_expire(row in arb_row(), as_of in arb_as_of()) {
        let c = classify(&row, as_of);
        if !row.paid_confirmed && !row.paid_enriched && row.due_date >= as_of {
            prop_assert_eq!(c.paid_status, PaidStatus::PendingActive);
        }
    }

    #[test]
    fn expectation_gap_always_wins(mut row in arb_row(), as_of in arb_as_of()) {
        row.paid_payment_key = Some("X".into());
        row.paid_confirmed = true;
        row.paid_enriched = false;
        row.expected_cents = None;
        row.identity_status = IdentityStatus::NoMatch;
        let c = classify(&row, as_of);
        prop_assert!(c.is_anomaly);
        prop_assert_eq!(c.reason, Some(PAYMENT_WITHOUT_EXPECTATION));
    }
}
