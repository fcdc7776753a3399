//! Well-known strings used across the import pipeline.

/// Note left on a finding when an import closes it because it is missing
/// from the latest report.
pub const NOTE_AUTO_CLOSED: &str =
    "This finding has been automatically closed as it is not present anymore in recent scans.";

/// Note left on a finding when a reimport reactivates it.
pub const NOTE_AUTO_REOPENED: &str =
    "This finding has been automatically re-opened as it was found in recent scans.";
