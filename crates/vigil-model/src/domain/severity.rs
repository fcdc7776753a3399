use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Finding severity on the five-level scale.
///
/// The numeric rank orders severities with `Critical` at 0 and `Info` at 4,
/// so a *lower* rank means a *more* severe finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Numeric rank used for ordering and filters. Lower is more severe.
    pub const fn numeric(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    /// Whether `self` is at least as severe as `min`.
    pub const fn at_least(self, min: Severity) -> bool {
        self.numeric() <= min.numeric()
    }

    /// Normalize a scanner-reported severity string.
    ///
    /// Scanners disagree on vocabulary, so this is deliberately lenient:
    /// the five canonical names match case-insensitively, `important` maps
    /// to `High`, `moderate` to `Medium`, and everything else (including
    /// the empty string, `information` and `informational`) falls back to
    /// `Info` instead of failing the import.
    pub fn sanitize(raw: &str) -> Severity {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" | "important" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Days allowed to remediate before the SLA is breached.
    ///
    /// `Info` findings carry no SLA.
    pub const fn sla_days(self) -> Option<u16> {
        match self {
            Severity::Critical => Some(7),
            Severity::High => Some(30),
            Severity::Medium => Some(90),
            Severity::Low => Some(120),
            Severity::Info => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    /// Strict conversion accepting only the canonical capitalized names.
    ///
    /// Use [`Severity::sanitize`] for raw scanner output.
    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "Critical" => Ok(Severity::Critical),
            "High" => Ok(Severity::High),
            "Medium" => Ok(Severity::Medium),
            "Low" => Ok(Severity::Low),
            "Info" => Ok(Severity::Info),
            other => Err(ModelError::UnknownSeverity(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Severity;

    #[test]
    fn numeric_rank_is_ordered_most_severe_first() {
        assert_eq!(Severity::Critical.numeric(), 0);
        assert_eq!(Severity::High.numeric(), 1);
        assert_eq!(Severity::Medium.numeric(), 2);
        assert_eq!(Severity::Low.numeric(), 3);
        assert_eq!(Severity::Info.numeric(), 4);
    }

    #[test]
    fn at_least_compares_by_rank() {
        assert!(Severity::Critical.at_least(Severity::Low));
        assert!(Severity::Low.at_least(Severity::Low));
        assert!(!Severity::Info.at_least(Severity::Low));
        // The Info floor keeps everything.
        for sev in Severity::ALL {
            assert!(sev.at_least(Severity::Info));
        }
    }

    #[test]
    fn sanitize_maps_known_aliases() {
        assert_eq!(Severity::sanitize("Critical"), Severity::Critical);
        assert_eq!(Severity::sanitize("HIGH"), Severity::High);
        assert_eq!(Severity::sanitize("important"), Severity::High);
        assert_eq!(Severity::sanitize("moderate"), Severity::Medium);
        assert_eq!(Severity::sanitize(" low "), Severity::Low);
    }

    #[test]
    fn sanitize_falls_back_to_info() {
        assert_eq!(Severity::sanitize(""), Severity::Info);
        assert_eq!(Severity::sanitize("information"), Severity::Info);
        assert_eq!(Severity::sanitize("informational"), Severity::Info);
        assert_eq!(Severity::sanitize("whatever"), Severity::Info);
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        for sev in Severity::ALL {
            let back: Severity = sev.to_string().parse().unwrap();
            assert_eq!(back, sev);
        }
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn sla_days_per_severity() {
        assert_eq!(Severity::Critical.sla_days(), Some(7));
        assert_eq!(Severity::High.sla_days(), Some(30));
        assert_eq!(Severity::Medium.sla_days(), Some(90));
        assert_eq!(Severity::Low.sla_days(), Some(120));
        assert_eq!(Severity::Info.sla_days(), None);
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"High\"");
        let back: Severity = serde_json::from_str("\"Critical\"").unwrap();
        assert_eq!(back, Severity::Critical);
    }
}
