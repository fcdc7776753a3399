use serde::{Deserialize, Serialize};
use time::Date;

use vigil_model::{Finding, Severity};

/// Remediation deadlines in days, per severity.
///
/// Info findings carry no deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaConfig {
    pub critical: u16,
    pub high: u16,
    pub medium: u16,
    pub low: u16,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            critical: Severity::Critical.sla_days().unwrap_or(0),
            high: Severity::High.sla_days().unwrap_or(0),
            medium: Severity::Medium.sla_days().unwrap_or(0),
            low: Severity::Low.sla_days().unwrap_or(0),
        }
    }
}

impl SlaConfig {
    pub fn days_for(&self, severity: Severity) -> Option<u16> {
        match severity {
            Severity::Critical => Some(self.critical),
            Severity::High => Some(self.high),
            Severity::Medium => Some(self.medium),
            Severity::Low => Some(self.low),
            Severity::Info => None,
        }
    }
}

/// SLA position of one finding at a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SlaStatus {
    pub age_days: i64,
    pub days_remaining: i64,
    pub breached: bool,
}

/// Where a finding stands against its remediation deadline as of `today`.
///
/// `None` when the finding has no date or its severity has no deadline.
pub fn sla_status(finding: &Finding, config: &SlaConfig, today: Date) -> Option<SlaStatus> {
    let date = finding.date?;
    let allowed = i64::from(config.days_for(finding.severity)?);
    let age_days = (today - date).whole_days();
    let days_remaining = allowed - age_days;
    Some(SlaStatus {
        age_days,
        days_remaining,
        breached: days_remaining < 0,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn finding_with_date(severity: Severity, date: Date) -> Finding {
        let mut finding = Finding::new("SQL injection in /search", severity);
        finding.date = Some(date);
        finding
    }

    #[test]
    fn critical_breaches_after_seven_days() {
        let config = SlaConfig::default();
        let finding = finding_with_date(Severity::Critical, date!(2026 - 01 - 01));

        let inside = sla_status(&finding, &config, date!(2026 - 01 - 08));
        assert_eq!(
            inside,
            Some(SlaStatus {
                age_days: 7,
                days_remaining: 0,
                breached: false,
            })
        );

        let breached = sla_status(&finding, &config, date!(2026 - 01 - 09));
        assert_eq!(
            breached,
            Some(SlaStatus {
                age_days: 8,
                days_remaining: -1,
                breached: true,
            })
        );
    }

    #[test]
    fn low_keeps_its_longer_window() {
        let config = SlaConfig::default();
        let finding = finding_with_date(Severity::Low, date!(2026 - 01 - 01));

        let status = sla_status(&finding, &config, date!(2026 - 03 - 01));
        assert_eq!(
            status,
            Some(SlaStatus {
                age_days: 59,
                days_remaining: 61,
                breached: false,
            })
        );
    }

    #[test]
    fn info_and_undated_findings_have_no_sla() {
        let config = SlaConfig::default();

        let info = finding_with_date(Severity::Info, date!(2026 - 01 - 01));
        assert_eq!(sla_status(&info, &config, date!(2026 - 06 - 01)), None);

        let undated = Finding::new("Server banner disclosure", Severity::High);
        assert_eq!(sla_status(&undated, &config, date!(2026 - 06 - 01)), None);
    }

    #[test]
    fn custom_windows_override_the_defaults() {
        let config = SlaConfig {
            critical: 1,
            high: 2,
            medium: 3,
            low: 4,
        };
        assert_eq!(config.days_for(Severity::Critical), Some(1));
        assert_eq!(config.days_for(Severity::Low), Some(4));
        assert_eq!(config.days_for(Severity::Info), None);
    }
}
