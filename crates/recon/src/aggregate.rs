use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::classify::classify_rows;
use crate::model::{
    ClassifiedRow, GrandTotal, IdentityTier, PaidStatus, ReconRow, Totals, WeeklyAggregate,
};

// ---------------------------------------------------------------------------
// Totals monoid
// ---------------------------------------------------------------------------

impl Totals {
    /// Fold one classified row into the running sums.
    pub fn record(&mut self, item: &ClassifiedRow) {
        let row = &item.row;
        let c = &item.classification;

        self.count_rows += 1;
        self.expected_cents = self.expected_cents.saturating_add(row.expected_cents.unwrap_or(0));
        if row.has_expectation() {
            self.count_expected += 1;
        }

        match c.paid_status {
            PaidStatus::PaidConfirmed => {
                self.paid_confirmed_cents = self.paid_confirmed_cents.saturating_add(row.paid_amount_cents());
                self.count_paid_confirmed += 1;
            }
            PaidStatus::PaidEnriched => {
                self.paid_enriched_cents = self.paid_enriched_cents.saturating_add(row.paid_amount_cents());
                self.count_paid_enriched += 1;
            }
            PaidStatus::PendingActive => {
                self.assumed.pending_active_cents =
                    self.assumed.pending_active_cents.saturating_add(row.expected_cents.unwrap_or(0));
                self.count_pending_active += 1;
            }
            PaidStatus::PendingExpired => self.count_pending_expired += 1,
        }

        if c.is_anomaly {
            self.anomalies_total += 1;
        }

        match c.identity_tier {
            IdentityTier::HighTrust => self.identity.high_trust += 1,
            IdentityTier::Probable => self.identity.probable += 1,
            IdentityTier::Untrusted => self.identity.untrusted += 1,
        }

        if item.week.inferred {
            self.count_week_inferred += 1;
        }
        if item.week.reassigned_from(row.pay_week_start_monday).is_some() {
            self.count_week_reassigned += 1;
        }

        self.currencies.insert(row.currency.clone());

        self.refresh();
    }

    /// Add another partial's sums into this one. Associative and
    /// commutative, so partitioned aggregation merges to the same result.
    /// Amount sums saturate at `i64::MAX` instead of overflowing; with
    /// per-field amounts capped at normalization that needs millions of
    /// rows in one week.
    pub fn merge(&mut self, other: &Totals) {
        self.expected_cents = self.expected_cents.saturating_add(other.expected_cents);
        self.paid_confirmed_cents = self.paid_confirmed_cents.saturating_add(other.paid_confirmed_cents);
        self.paid_enriched_cents = self.paid_enriched_cents.saturating_add(other.paid_enriched_cents);
        self.assumed.pending_active_cents = self
            .assumed
            .pending_active_cents
            .saturating_add(other.assumed.pending_active_cents);
        self.count_rows += other.count_rows;
        self.count_expected += other.count_expected;
        self.count_paid_confirmed += other.count_paid_confirmed;
        self.count_paid_enriched += other.count_paid_enriched;
        self.count_pending_active += other.count_pending_active;
        self.count_pending_expired += other.count_pending_expired;
        self.anomalies_total += other.anomalies_total;
        self.identity.high_trust += other.identity.high_trust;
        self.identity.probable += other.identity.probable;
        self.identity.untrusted += other.identity.untrusted;
        self.count_week_inferred += other.count_week_inferred;
        self.count_week_reassigned += other.count_week_reassigned;
        self.currencies.extend(other.currencies.iter().cloned());
        self.refresh();
    }

    /// Recompute the derived fields from the raw sums.
    pub(crate) fn refresh(&mut self) {
        self.paid_visible_cents = self.paid_confirmed_cents.saturating_add(self.paid_enriched_cents);
        self.amount_diff_cents = self.expected_cents.saturating_sub(self.paid_visible_cents);
        self.count_paid = self.count_paid_confirmed + self.count_paid_enriched;
        self.assumed.paid_assumed_cents = self
            .paid_visible_cents
            .saturating_add(self.assumed.pending_active_cents);
    }
}

// ---------------------------------------------------------------------------
// Weekly aggregation
// ---------------------------------------------------------------------------

/// Group classified rows by effective week. Most recent week first.
pub fn aggregate(rows: &[ClassifiedRow]) -> Vec<WeeklyAggregate> {
    let mut weeks: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for item in rows {
        weeks.entry(item.week.week_start).or_default().record(item);
    }
    into_descending(weeks)
}

/// Classify, bucket and aggregate in one pass.
pub fn aggregate_rows(rows: &[ReconRow], as_of: NaiveDate) -> Vec<WeeklyAggregate> {
    aggregate(&classify_rows(rows, as_of))
}

/// Merge two weekly aggregations (e.g. from disjoint row partitions).
pub fn merge_weeks(left: &[WeeklyAggregate], right: &[WeeklyAggregate]) -> Vec<WeeklyAggregate> {
    let mut weeks: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for w in left.iter().chain(right) {
        weeks.entry(w.week_start).or_default().merge(&w.totals);
    }
    into_descending(weeks)
}

fn into_descending(weeks: BTreeMap<NaiveDate, Totals>) -> Vec<WeeklyAggregate> {
    weeks
        .into_iter()
        .rev()
        .map(|(week_start, totals)| WeeklyAggregate { week_start, totals })
        .collect()
}

/// Grand total across all weeks.
pub fn totals(weeks: &[WeeklyAggregate]) -> GrandTotal {
    let mut grand = GrandTotal::default();
    for w in weeks {
        grand.totals.merge(&w.totals);
        grand.first_week = Some(grand.first_week.map_or(w.week_start, |d| d.min(w.week_start)));
        grand.last_week = Some(grand.last_week.map_or(w.week_start, |d| d.max(w.week_start)));
    }
    grand.week_count = weeks.len();
    log::debug!(
        "aggregated {} rows into {} weeks (expected={} visible={} diff={})",
        grand.totals.count_rows,
        grand.week_count,
        grand.totals.expected_cents,
        grand.totals.paid_visible_cents,
        grand.totals.amount_diff_cents,
    );
    grand
}
