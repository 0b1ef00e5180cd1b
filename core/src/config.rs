//! Split-rate configuration.
//!
//! The per-level default table is data, not code: production reads it from
//! `data/commission/split_config.json`, tests build it directly.

use crate::{
    error::{CommissionError, CommissionResult},
    types::Level,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_AGENT_SPLIT: f64 = 0.85;
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_RENEWAL_RATE: f64 = 0.05;
pub const DEFAULT_TRAIL_RATE: f64 = 0.003;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Level-0 share when the payee's membership has no override.
    pub agent_default_split: f64,
    /// Override share per ancestor level. Levels not listed get 0.
    pub level_defaults: BTreeMap<Level, f64>,
    /// Number of hierarchy levels inspected, level 0 included.
    pub max_depth: usize,
    pub renewal_rate: f64,
    pub trail_rate: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            agent_default_split: DEFAULT_AGENT_SPLIT,
            level_defaults: BTreeMap::from([(1, 0.10), (2, 0.03), (3, 0.02)]),
            max_depth: DEFAULT_MAX_DEPTH,
            renewal_rate: DEFAULT_RENEWAL_RATE,
            trail_rate: DEFAULT_TRAIL_RATE,
        }
    }
}

impl SplitConfig {
    /// Load from the data/ directory.
    /// In tests, use SplitConfig::default() or build one inline.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/commission/split_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SplitConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Default share for an ancestor level. 0 for any level not in the table.
    pub fn level_default(&self, level: Level) -> f64 {
        self.level_defaults.get(&level).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> CommissionResult<()> {
        let invalid = |reason: String| Err(CommissionError::InvalidConfig { reason });

        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1".into());
        }
        if !is_fraction(self.agent_default_split) {
            return invalid(format!(
                "agent_default_split must be in [0, 1], got {}",
                self.agent_default_split
            ));
        }
        for (level, share) in &self.level_defaults {
            if *level == 0 {
                return invalid("level_defaults starts at level 1".into());
            }
            if !is_fraction(*share) {
                return invalid(format!("level {level} default must be in [0, 1], got {share}"));
            }
        }
        if !is_fraction(self.renewal_rate) || !is_fraction(self.trail_rate) {
            return invalid("renewal_rate and trail_rate must be in [0, 1]".into());
        }

        let table_total = self.agent_default_split + self.level_defaults.values().sum::<f64>();
        if table_total > 1.0 + 1e-9 {
            // Still usable: the allocator caps each level at what remains.
            log::warn!("split defaults sum to {table_total:.4}; deeper levels will be capped");
        }
        Ok(())
    }
}

fn is_fraction(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
