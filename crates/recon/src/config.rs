use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ReconError;
use crate::reasons::Severity;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Days between lead date and due date when upstream omits `due_date`.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Milestone tiers a row may carry.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<u32>,
    /// Currency applied to rows that omit one.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Reason catalog additions; an entry with a built-in code overrides it.
    #[serde(default)]
    pub reasons: Vec<ReasonConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasonConfig {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub severity: Severity,
}

fn default_name() -> String {
    "yango-reconciliation".into()
}

/// Upper bound for `window_days`; a due date more than a year after the
/// lead date is a configuration mistake.
pub const MAX_WINDOW_DAYS: u32 = 366;

fn default_window_days() -> u32 {
    14
}

fn default_milestones() -> Vec<u32> {
    vec![1, 5, 25]
}

fn default_currency() -> String {
    "RUB".into()
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            window_days: default_window_days(),
            milestones: default_milestones(),
            default_currency: default_currency(),
            reasons: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.window_days == 0 {
            return Err(ReconError::ConfigValidation(
                "window_days must be at least 1".into(),
            ));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(ReconError::ConfigValidation(format!(
                "window_days must be at most {MAX_WINDOW_DAYS}, got {}",
                self.window_days
            )));
        }

        if self.milestones.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one milestone is required".into(),
            ));
        }
        if self.milestones.contains(&0) {
            return Err(ReconError::ConfigValidation(
                "milestone values must be positive".into(),
            ));
        }

        let currency = self.default_currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ReconError::ConfigValidation(format!(
                "default_currency must be a 3-letter code, got '{}'",
                self.default_currency
            )));
        }

        let mut seen = HashSet::new();
        for reason in &self.reasons {
            if reason.code.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "reason code must not be empty".into(),
                ));
            }
            if !seen.insert(reason.code.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate reason code '{}'",
                    reason.code
                )));
            }
        }

        Ok(())
    }

    pub fn is_known_milestone(&self, value: u32) -> bool {
        self.milestones.contains(&value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
