use serde::{Deserialize, Serialize};

use crate::{BvhError, Result};

/// Default depth past which no node is split.
pub const BVH_MAX_DEPTH: u32 = 20;
/// Default number of candidate planes tested per axis.
pub const SPLIT_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Longest axis, cut at the centre of the node bounds.
    ///
    /// Splits regardless of cost, even when one child ends up empty, but
    /// stops at `max_depth` and at nodes holding at most one triangle.
    Median,
    /// Sampled surface area heuristic.
    #[default]
    Sah,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    pub max_depth: u32,
    pub split_samples: u32,
    pub policy: SplitPolicy,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            max_depth: BVH_MAX_DEPTH,
            split_samples: SPLIT_ATTEMPTS,
            policy: SplitPolicy::default(),
        }
    }
}

impl BvhConfig {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_split_samples(mut self, split_samples: u32) -> Self {
        self.split_samples = split_samples;
        self
    }

    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.policy == SplitPolicy::Sah && self.split_samples == 0 {
            return Err(BvhError::InvalidConfig(
                "split_samples must be at least 1 for the sah policy".to_string(),
            ));
        }
        Ok(())
    }
}
