use chrono::NaiveDate;

use crate::model::{
    Classification, ClassifiedRow, IdentityStatus, IdentityTier, PaidStatus, ReconRow,
    WindowStatus,
};
use crate::reasons::{PAID_WITHOUT_IDENTITY, PAYMENT_WITHOUT_EXPECTATION};
use crate::week::effective_week;

// ---------------------------------------------------------------------------
// Anomaly rules
// ---------------------------------------------------------------------------

struct AnomalyRule {
    code: &'static str,
    applies: fn(&ReconRow, PaidStatus) -> bool,
}

/// Evaluated top to bottom; the first rule that applies names the reason.
const ANOMALY_RULES: &[AnomalyRule] = &[
    AnomalyRule {
        code: PAYMENT_WITHOUT_EXPECTATION,
        applies: |row, _| row.paid_payment_key.is_some() && !row.has_expectation(),
    },
    AnomalyRule {
        code: PAID_WITHOUT_IDENTITY,
        applies: |row, status| row.identity_status == IdentityStatus::NoMatch && status.is_paid(),
    },
];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// `active` through the due date inclusive.
pub fn window_status(due_date: NaiveDate, as_of: NaiveDate) -> WindowStatus {
    if as_of <= due_date {
        WindowStatus::Active
    } else {
        WindowStatus::Expired
    }
}

pub fn paid_status(row: &ReconRow, window: WindowStatus) -> PaidStatus {
    if row.paid_confirmed {
        PaidStatus::PaidConfirmed
    } else if row.paid_enriched {
        PaidStatus::PaidEnriched
    } else if window == WindowStatus::Active {
        PaidStatus::PendingActive
    } else {
        PaidStatus::PendingExpired
    }
}

pub fn identity_tier(status: IdentityStatus) -> IdentityTier {
    match status {
        IdentityStatus::Confirmed => IdentityTier::HighTrust,
        IdentityStatus::Enriched => IdentityTier::Probable,
        IdentityStatus::Ambiguous | IdentityStatus::NoMatch => IdentityTier::Untrusted,
    }
}

/// Code of the first anomaly rule the row trips, if any.
pub fn anomaly_reason(row: &ReconRow, status: PaidStatus) -> Option<&'static str> {
    ANOMALY_RULES
        .iter()
        .find(|rule| (rule.applies)(row, status))
        .map(|rule| rule.code)
}

pub fn classify(row: &ReconRow, as_of: NaiveDate) -> Classification {
    let window = window_status(row.due_date, as_of);
    let status = paid_status(row, window);
    let reason = anomaly_reason(row, status);
    Classification {
        paid_status: status,
        window_status: window,
        identity_tier: identity_tier(row.identity_status),
        is_anomaly: reason.is_some(),
        reason,
    }
}

/// Classify and bucket every row.
pub fn classify_rows(rows: &[ReconRow], as_of: NaiveDate) -> Vec<ClassifiedRow> {
    rows.iter()
        .map(|row| ClassifiedRow {
            row: row.clone(),
            classification: classify(row, as_of),
            week: effective_week(row),
        })
        .collect()
}
