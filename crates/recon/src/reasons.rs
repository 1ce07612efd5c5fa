//! Reason catalog — stable codes for anomaly and unmatched-ledger reasons.
//!
//! Upstream may introduce codes before the catalog knows them, so lookups
//! never fail: unknown codes resolve to a low-severity sentinel labelled with
//! the code itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ReconConfig;

pub const PAYMENT_WITHOUT_EXPECTATION: &str = "payment_without_expectation";
pub const PAID_WITHOUT_IDENTITY: &str = "paid_without_identity";

/// Built-in entries: the two anomaly codes the classifier emits, then the
/// unmatched-ledger codes the dashboard filters on.
const BUILTIN: &[(&str, &str, Severity)] = &[
    (PAYMENT_WITHOUT_EXPECTATION, "Payment without matching expectation", Severity::High),
    (PAID_WITHOUT_IDENTITY, "Paid with no attributable driver", Severity::High),
    ("no_driver_id", "Ledger row has no driver id", Severity::Medium),
    ("ambiguous_identity", "Several drivers match the ledger name", Severity::Medium),
    ("driver_not_found", "No driver matches the ledger name", Severity::Medium),
    ("amount_mismatch", "Paid amount differs from expectation", Severity::Medium),
    ("paid_outside_window", "Paid after the window closed", Severity::Low),
];

/// Ordered most severe first: `High < Medium < Low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    #[default]
    Low,
}

impl Severity {
    /// 0 is the most severe. Ordering goes through this, not declaration order.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalyReason {
    pub code: String,
    pub label: String,
    pub severity: Severity,
}

impl AnomalyReason {
    fn unknown(code: &str) -> Self {
        Self {
            code: code.to_string(),
            label: code.to_string(),
            severity: Severity::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonLookup<'a> {
    Known(&'a AnomalyReason),
    Unknown(AnomalyReason),
}

impl ReasonLookup<'_> {
    pub fn reason(&self) -> &AnomalyReason {
        match self {
            Self::Known(r) => r,
            Self::Unknown(r) => r,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

#[derive(Debug, Clone)]
pub struct ReasonCatalog {
    entries: BTreeMap<String, AnomalyReason>,
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReasonCatalog {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(code, label, severity)| {
                (
                    code.to_string(),
                    AnomalyReason {
                        code: code.to_string(),
                        label: label.to_string(),
                        severity,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Built-in catalog with the config's `[[reasons]]` layered on top.
    pub fn from_config(config: &ReconConfig) -> Self {
        let mut catalog = Self::builtin();
        for r in &config.reasons {
            catalog.entries.insert(
                r.code.clone(),
                AnomalyReason {
                    code: r.code.clone(),
                    label: r.label.clone(),
                    severity: r.severity,
                },
            );
        }
        catalog
    }

    pub fn lookup(&self, code: &str) -> ReasonLookup<'_> {
        match self.entries.get(code) {
            Some(r) => ReasonLookup::Known(r),
            None => ReasonLookup::Unknown(AnomalyReason::unknown(code)),
        }
    }

    /// Entries at or above `min`, most severe first, then by code.
    pub fn at_least(&self, min: Severity) -> Vec<&AnomalyReason> {
        let mut out: Vec<_> = self
            .entries
            .values()
            .filter(|r| r.severity.rank() <= min.rank())
            .collect();
        out.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.code.cmp(&b.code)));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
