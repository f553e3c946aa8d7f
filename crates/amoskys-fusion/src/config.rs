//! Fusion Engine tunables (§6.3). Not a `clap::Parser` binary config on its
//! own — embedded inside the ingestor's config and constructed directly by
//! callers that build a [`crate::engine::FusionEngine`].

use crate::rules::RuleConfig;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FusionConfig {
    pub window: Duration,
    pub rules: RuleConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30 * 60),
            rules: RuleConfig::default(),
        }
    }
}
