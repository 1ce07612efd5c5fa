use std::collections::BTreeMap;

use crate::model::{Breakdown, ClassifiedRow, PaidStatus, ReasonCount};
use crate::reasons::ReasonCatalog;

/// Compute batch-wide counts from classified rows.
pub fn compute_breakdown(rows: &[ClassifiedRow], catalog: &ReasonCatalog) -> Breakdown {
    let mut by_paid_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_identity_tier: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_match_rule: BTreeMap<String, usize> = BTreeMap::new();
    let mut reason_counts: BTreeMap<&str, usize> = BTreeMap::new();

    for item in rows {
        let c = &item.classification;
        *by_paid_status.entry(c.paid_status.to_string()).or_insert(0) += 1;
        *by_identity_tier.entry(c.identity_tier.to_string()).or_insert(0) += 1;

        if c.paid_status == PaidStatus::PaidEnriched {
            let rule = item.row.match_rule.as_deref().unwrap_or("unspecified");
            *by_match_rule.entry(rule.to_string()).or_insert(0) += 1;
        }

        if let Some(code) = c.reason {
            *reason_counts.entry(code).or_insert(0) += 1;
        }
    }

    let mut by_reason: Vec<ReasonCount> = reason_counts
        .into_iter()
        .map(|(code, count)| {
            let lookup = catalog.lookup(code);
            let reason = lookup.reason();
            ReasonCount {
                code: reason.code.clone(),
                label: reason.label.clone(),
                severity: reason.severity,
                count,
            }
        })
        .collect();
    by_reason.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.code.cmp(&b.code)));

    Breakdown {
        by_paid_status,
        by_identity_tier,
        by_reason,
        by_match_rule,
    }
}
