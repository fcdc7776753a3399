//! CVSS v3 base vectors: parsing, scoring, severity buckets.
//!
//! Only the base metric group is scored. Temporal and environmental metrics
//! are accepted in the input and ignored, since scanners routinely append
//! them to the vector they report.

use std::fmt;

use vigil_model::Severity;

/// A parsed CVSS v3.0 / v3.1 base vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CvssV3 {
    minor: u8,
    av: AttackVector,
    ac: AttackComplexity,
    pr: PrivilegesRequired,
    ui: UserInteraction,
    scope: Scope,
    c: Impact,
    i: Impact,
    a: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttackVector {
    Network,
    Adjacent,
    Local,
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttackComplexity {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrivilegesRequired {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserInteraction {
    None,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Impact {
    High,
    Low,
    None,
}

impl CvssV3 {
    /// Parse a vector string.
    ///
    /// The `CVSS:3.x/` prefix is optional; a bare metric string is treated
    /// as v3.1. Returns `None` when the vector is malformed or a base
    /// metric is missing.
    pub(crate) fn parse(raw: &str) -> Option<CvssV3> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (minor, metrics) = if let Some(rest) = raw.strip_prefix("CVSS:3.0/") {
            (0, rest)
        } else if let Some(rest) = raw.strip_prefix("CVSS:3.1/") {
            (1, rest)
        } else if raw.starts_with("CVSS:") {
            return None;
        } else {
            (1, raw)
        };

        let mut av = None;
        let mut ac = None;
        let mut pr = None;
        let mut ui = None;
        let mut scope = None;
        let mut c = None;
        let mut i = None;
        let mut a = None;

        for part in metrics.split('/') {
            let (key, value) = part.split_once(':')?;
            match key {
                "AV" => {
                    av = Some(match value {
                        "N" => AttackVector::Network,
                        "A" => AttackVector::Adjacent,
                        "L" => AttackVector::Local,
                        "P" => AttackVector::Physical,
                        _ => return None,
                    });
                }
                "AC" => {
                    ac = Some(match value {
                        "L" => AttackComplexity::Low,
                        "H" => AttackComplexity::High,
                        _ => return None,
                    });
                }
                "PR" => {
                    pr = Some(match value {
                        "N" => PrivilegesRequired::None,
                        "L" => PrivilegesRequired::Low,
                        "H" => PrivilegesRequired::High,
                        _ => return None,
                    });
                }
                "UI" => {
                    ui = Some(match value {
                        "N" => UserInteraction::None,
                        "R" => UserInteraction::Required,
                        _ => return None,
                    });
                }
                "S" => {
                    scope = Some(match value {
                        "U" => Scope::Unchanged,
                        "C" => Scope::Changed,
                        _ => return None,
                    });
                }
                "C" => c = Some(Impact::parse(value)?),
                "I" => i = Some(Impact::parse(value)?),
                "A" => a = Some(Impact::parse(value)?),
                _ => {}
            }
        }

        Some(CvssV3 {
            minor,
            av: av?,
            ac: ac?,
            pr: pr?,
            ui: ui?,
            scope: scope?,
            c: c?,
            i: i?,
            a: a?,
        })
    }

    /// Base score per the v3.1 specification, rounded up to one decimal.
    pub(crate) fn base_score(&self) -> f64 {
        let iss = 1.0
            - (1.0 - self.c.weight()) * (1.0 - self.i.weight()) * (1.0 - self.a.weight());
        let impact = match self.scope {
            Scope::Unchanged => 6.42 * iss,
            Scope::Changed => 7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15),
        };
        if impact <= 0.0 {
            return 0.0;
        }
        let exploitability = 8.22
            * self.av.weight()
            * self.ac.weight()
            * self.pr.weight(self.scope)
            * self.ui.weight();
        match self.scope {
            Scope::Unchanged => roundup((impact + exploitability).min(10.0)),
            Scope::Changed => roundup((1.08 * (impact + exploitability)).min(10.0)),
        }
    }

    /// Severity bucket of the base score. A zero score maps to `Info`.
    pub(crate) fn severity(&self) -> Severity {
        let score = self.base_score();
        if score <= 0.0 {
            Severity::Info
        } else if score < 4.0 {
            Severity::Low
        } else if score < 7.0 {
            Severity::Medium
        } else if score < 9.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// Canonical base vector, metrics in specification order.
impl fmt::Display for CvssV3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CVSS:3.{}/AV:{}/AC:{}/PR:{}/UI:{}/S:{}/C:{}/I:{}/A:{}",
            self.minor,
            self.av.letter(),
            self.ac.letter(),
            self.pr.letter(),
            self.ui.letter(),
            self.scope.letter(),
            self.c.letter(),
            self.i.letter(),
            self.a.letter(),
        )
    }
}

impl AttackVector {
    fn weight(self) -> f64 {
        match self {
            AttackVector::Network => 0.85,
            AttackVector::Adjacent => 0.62,
            AttackVector::Local => 0.55,
            AttackVector::Physical => 0.2,
        }
    }

    fn letter(self) -> char {
        match self {
            AttackVector::Network => 'N',
            AttackVector::Adjacent => 'A',
            AttackVector::Local => 'L',
            AttackVector::Physical => 'P',
        }
    }
}

impl AttackComplexity {
    fn weight(self) -> f64 {
        match self {
            AttackComplexity::Low => 0.77,
            AttackComplexity::High => 0.44,
        }
    }

    fn letter(self) -> char {
        match self {
            AttackComplexity::Low => 'L',
            AttackComplexity::High => 'H',
        }
    }
}

impl PrivilegesRequired {
    // The Low/High weights rise when the scope changes.
    fn weight(self, scope: Scope) -> f64 {
        match (self, scope) {
            (PrivilegesRequired::None, _) => 0.85,
            (PrivilegesRequired::Low, Scope::Unchanged) => 0.62,
            (PrivilegesRequired::Low, Scope::Changed) => 0.68,
            (PrivilegesRequired::High, Scope::Unchanged) => 0.27,
            (PrivilegesRequired::High, Scope::Changed) => 0.5,
        }
    }

    fn letter(self) -> char {
        match self {
            PrivilegesRequired::None => 'N',
            PrivilegesRequired::Low => 'L',
            PrivilegesRequired::High => 'H',
        }
    }
}

impl UserInteraction {
    fn weight(self) -> f64 {
        match self {
            UserInteraction::None => 0.85,
            UserInteraction::Required => 0.62,
        }
    }

    fn letter(self) -> char {
        match self {
            UserInteraction::None => 'N',
            UserInteraction::Required => 'R',
        }
    }
}

impl Scope {
    fn letter(self) -> char {
        match self {
            Scope::Unchanged => 'U',
            Scope::Changed => 'C',
        }
    }
}

impl Impact {
    fn parse(value: &str) -> Option<Impact> {
        match value {
            "H" => Some(Impact::High),
            "L" => Some(Impact::Low),
            "N" => Some(Impact::None),
            _ => None,
        }
    }

    fn weight(self) -> f64 {
        match self {
            Impact::High => 0.56,
            Impact::Low => 0.22,
            Impact::None => 0.0,
        }
    }

    fn letter(self) -> char {
        match self {
            Impact::High => 'H',
            Impact::Low => 'L',
            Impact::None => 'N',
        }
    }
}

/// Round up to one decimal, as the v3.1 specification defines it.
fn roundup(value: f64) -> f64 {
    let scaled = (value * 100_000.0).round() as i64;
    if scaled % 10_000 == 0 {
        scaled as f64 / 100_000.0
    } else {
        ((scaled / 10_000) + 1) as f64 / 10.0
    }
}
