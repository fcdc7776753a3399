mod severity;
pub use severity::Severity;

mod endpoint;
pub use endpoint::{Endpoint, EndpointField};

mod tags;
pub use tags::Tags;

mod hash;
pub use hash::{DEFAULT_HASH_FIELDS, FindingHash, HashField};

mod constants;
pub use constants::{NOTE_AUTO_CLOSED, NOTE_AUTO_REOPENED};

/// Registry key naming a scan-report parser, e.g. `"OpenVAS Parser"`.
///
/// Tests record the scan type they were imported with; deduplication by
/// tool-native ids is scoped to it.
pub type ScanType = String;
