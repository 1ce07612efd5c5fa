use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::reasons::Severity;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One expected milestone payment joined with its ledger and identity
/// evidence. Produced only by [`crate::normalize::normalize_row`], so every
/// field has already been alias-resolved and type-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconRow {
    pub person_key: String,
    pub driver_id: Option<String>,
    pub milestone_value: u32,
    /// Expected payout in minor units. `None` when upstream has no expectation.
    pub expected_cents: Option<i64>,
    pub currency: String,
    pub lead_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Week bucket as supplied upstream. Informational only.
    pub pay_week_start_monday: Option<NaiveDate>,
    pub paid_payment_key: Option<String>,
    pub paid_date: Option<NaiveDate>,
    pub paid_confirmed: bool,
    pub paid_enriched: bool,
    /// Ledger amount actually paid, when reported.
    pub paid_cents: Option<i64>,
    pub identity_status: IdentityStatus,
    pub match_rule: Option<String>,
    pub match_confidence: Option<MatchConfidence>,
}

impl ReconRow {
    /// Amount counted into the paid sums: the ledger amount when known,
    /// otherwise the expectation.
    pub fn paid_amount_cents(&self) -> i64 {
        self.paid_cents.or(self.expected_cents).unwrap_or(0)
    }

    pub fn has_expectation(&self) -> bool {
        matches!(self.expected_cents, Some(c) if c != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    Confirmed,
    Enriched,
    Ambiguous,
    NoMatch,
}

impl IdentityStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Some(Self::Confirmed),
            "enriched" => Some(Self::Enriched),
            "ambiguous" => Some(Self::Ambiguous),
            "no_match" | "nomatch" | "no-match" => Some(Self::NoMatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::Enriched => write!(f, "enriched"),
            Self::Ambiguous => write!(f, "ambiguous"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
}

impl MatchConfidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidStatus {
    PaidConfirmed,
    PaidEnriched,
    PendingActive,
    PendingExpired,
}

impl PaidStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::PaidConfirmed | Self::PaidEnriched)
    }
}

impl std::fmt::Display for PaidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaidConfirmed => write!(f, "paid_confirmed"),
            Self::PaidEnriched => write!(f, "paid_enriched"),
            Self::PendingActive => write!(f, "pending_active"),
            Self::PendingExpired => write!(f, "pending_expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Active,
    Expired,
}

/// Display-confidence bucket derived from [`IdentityStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityTier {
    HighTrust,
    Probable,
    Untrusted,
}

impl std::fmt::Display for IdentityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighTrust => write!(f, "high_trust"),
            Self::Probable => write!(f, "probable"),
            Self::Untrusted => write!(f, "untrusted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub paid_status: PaidStatus,
    pub window_status: WindowStatus,
    pub identity_tier: IdentityTier,
    pub is_anomaly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Week bucketing
// ---------------------------------------------------------------------------

/// Which date an effective week was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekSource {
    PaidDate,
    DueDate,
    LeadDate,
    NominalWeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveWeek {
    pub week_start: NaiveDate,
    pub source: WeekSource,
    /// True when only the upstream nominal week was available.
    pub inferred: bool,
}

/// A row after classification and week bucketing.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRow {
    pub row: ReconRow,
    pub classification: Classification,
    pub week: EffectiveWeek,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Optimistic projection: visible payments plus every pending row still in
/// its window. Always serialized with `"kind": "estimate"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename = "estimate")]
pub struct AssumedProjection {
    pub pending_active_cents: i64,
    pub paid_assumed_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub high_trust: usize,
    pub probable: usize,
    pub untrusted: usize,
}

/// Running sums shared by weekly aggregates and the grand total.
///
/// `paid_visible_cents`, `amount_diff_cents` and
/// `assumed.paid_assumed_cents` are derived and kept in step by every
/// mutation. `amount_diff_cents` is signed: positive means still owed,
/// negative means overpaid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub expected_cents: i64,
    pub paid_confirmed_cents: i64,
    pub paid_enriched_cents: i64,
    pub paid_visible_cents: i64,
    pub amount_diff_cents: i64,
    pub assumed: AssumedProjection,
    pub count_rows: usize,
    pub count_expected: usize,
    pub count_paid: usize,
    pub count_paid_confirmed: usize,
    pub count_paid_enriched: usize,
    pub count_pending_active: usize,
    pub count_pending_expired: usize,
    pub anomalies_total: usize,
    pub identity: TierCounts,
    /// Rows bucketed by the upstream nominal week alone. Item rows always
    /// carry a due date, so only direct `resolve_week` callers set this.
    pub count_week_inferred: usize,
    pub count_week_reassigned: usize,
    pub currencies: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GrandTotal {
    pub week_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_week: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_week: Option<NaiveDate>,
    #[serde(flatten)]
    pub totals: Totals,
}

// ---------------------------------------------------------------------------
// Rejections + Breakdown + Divergence
// ---------------------------------------------------------------------------

/// Which endpoint a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Items,
    Summary,
}

/// A row excluded from every aggregate, surfaced as a data-quality warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub source: InputSource,
    /// Position in the input array of `source`.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_key: Option<String>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub code: String,
    pub label: String,
    pub severity: Severity,
    pub count: usize,
}

/// Batch-wide counts for filter chips and the anomaly table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub by_paid_status: std::collections::BTreeMap<String, usize>,
    pub by_identity_tier: std::collections::BTreeMap<String, usize>,
    pub by_reason: Vec<ReasonCount>,
    pub by_match_rule: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceField {
    ExpectedCents,
    PaidVisibleCents,
    CountRows,
    AnomaliesTotal,
    /// Week present on one side only.
    WeekPresence,
}

/// A week where the pre-aggregated summary disagrees with the raw items.
/// Raw items are authoritative; divergences are reported, never resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub week_start: NaiveDate,
    pub field: DivergenceField,
    pub items: i64,
    pub summary: i64,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    Items,
    Summary,
    ItemsWithSummaryCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub as_of: NaiveDate,
    pub mode: SourceMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    /// Most recent week first.
    pub weeks: Vec<WeeklyAggregate>,
    pub totals: GrandTotal,
    pub rejected: Vec<RejectedRow>,
    pub breakdown: Breakdown,
    pub divergences: Vec<Divergence>,
}
