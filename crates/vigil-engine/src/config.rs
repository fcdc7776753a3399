use std::collections::HashMap;

use vigil_model::{DedupeAlgorithm, EndpointField};

use crate::sla::SlaConfig;

/// Behavior switches for the store and the import pipeline.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Run deduplication after every import.
    pub dedupe_enabled: bool,
    /// Endpoint parts compared when matching findings by location.
    pub endpoint_fields: Vec<EndpointField>,
    /// Silence findings matching an already triaged false positive.
    pub false_positive_history: bool,
    /// Propagate a fresh false-positive verdict to existing matches.
    pub retroactive_false_positive_history: bool,
    pub sla: SlaConfig,
    /// Per scan type overrides of the parser's deduplication algorithm.
    pub algorithm_overrides: HashMap<String, DedupeAlgorithm>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedupe_enabled: true,
            endpoint_fields: EndpointField::ALL.to_vec(),
            false_positive_history: false,
            retroactive_false_positive_history: false,
            sla: SlaConfig::default(),
            algorithm_overrides: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Effective deduplication algorithm for a scan type.
    pub fn algorithm_for(&self, scan_type: &str, parser_default: DedupeAlgorithm) -> DedupeAlgorithm {
        self.algorithm_overrides
            .get(scan_type)
            .copied()
            .unwrap_or(parser_default)
    }
}
