//! Parser registry that resolves a scan type to its `ReportParser` implementation.
//!
//! Parsers are checked in registration order; the scan type string is the
//! key clients send with an import request.
use std::sync::Arc;

use vigil_model::{DEFAULT_HASH_FIELDS, DedupeAlgorithm, Finding, HashField};

use crate::error::{ParserError, ParserResult};
use crate::file::ReportFile;
use crate::{AquaParser, CycloneDxParser, GenericParser, OpenVasParser, TwistlockParser};

/// One scan-report parser.
///
/// Implementations are stateless; a single instance serves all imports.
pub trait ReportParser: std::fmt::Debug + Send + Sync {
    /// Registry key, e.g. `"OpenVAS Parser"`.
    fn scan_type(&self) -> &'static str;

    /// Short description of the accepted report format.
    fn description(&self) -> &'static str;

    /// Parse one uploaded report into findings.
    ///
    /// Findings come back in report order with sanitized severities; the
    /// import pipeline handles filtering, hashing and deduplication.
    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>>;

    /// Fields folded into the content hash for this scan type.
    fn hash_fields(&self) -> &'static [HashField] {
        DEFAULT_HASH_FIELDS
    }

    /// Deduplication algorithm for findings of this scan type.
    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::HashCode
    }
}

/// Registry of [`ReportParser`] implementations keyed by scan type.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn ReportParser>>,
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry with all built-in parsers.
    ///
    /// Registration order is the order scan types are listed over the API.
    pub fn defaults() -> Self {
        let mut registry = Self::new();
        registry.parsers.push(Arc::new(OpenVasParser));
        registry.parsers.push(Arc::new(TwistlockParser));
        registry.parsers.push(Arc::new(CycloneDxParser));
        registry.parsers.push(Arc::new(AquaParser));
        registry.parsers.push(Arc::new(GenericParser));
        registry
    }

    /// Register a parser.
    ///
    /// Scan types must be unique; registering a second parser under an
    /// already-known scan type is an error.
    pub fn register(&mut self, parser: Arc<dyn ReportParser>) -> ParserResult<()> {
        let scan_type = parser.scan_type();
        if self.pick(scan_type).is_some() {
            return Err(ParserError::DuplicateScanType(scan_type.to_string()));
        }
        self.parsers.push(parser);
        Ok(())
    }

    /// Look up the parser for a scan type.
    pub fn pick(&self, scan_type: &str) -> Option<&Arc<dyn ReportParser>> {
        self.parsers.iter().find(|p| p.scan_type() == scan_type)
    }

    /// Like [`ParserRegistry::pick`], but an unknown scan type is an error.
    pub fn resolve(&self, scan_type: &str) -> ParserResult<&Arc<dyn ReportParser>> {
        self.pick(scan_type)
            .ok_or_else(|| ParserError::UnknownScanType(scan_type.to_string()))
    }

    /// Registered scan types, in registration order.
    pub fn scan_types(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.scan_type()).collect()
    }

    /// Number of registered parsers.
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Returns `true` when no parser is registered.
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}
