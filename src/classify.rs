use serde::Serialize;
use std::fmt;

pub const CAUTION_THRESHOLD_PERCENT: f64 = 70.0;
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;
pub const CRITICAL_THRESHOLD_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Normal,
    Caution,
    Warning,
    Critical,
}

impl Severity {
    pub fn classify(usage_percent: f64) -> Self {
        if usage_percent >= CRITICAL_THRESHOLD_PERCENT {
            Self::Critical
        } else if usage_percent >= WARNING_THRESHOLD_PERCENT {
            Self::Warning
        } else if usage_percent >= CAUTION_THRESHOLD_PERCENT {
            Self::Caution
        } else {
            Self::Normal
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Caution => "CAUTION",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Separate flag from the four-level label; kept in step with the CRITICAL threshold.
pub fn is_critical(usage_percent: f64) -> bool {
    usage_percent >= CRITICAL_THRESHOLD_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(Severity::classify(0.0), Severity::Normal);
        assert_eq!(Severity::classify(69.9), Severity::Normal);
        assert_eq!(Severity::classify(70.0), Severity::Caution);
        assert_eq!(Severity::classify(79.9), Severity::Caution);
        assert_eq!(Severity::classify(80.0), Severity::Warning);
        assert_eq!(Severity::classify(89.9), Severity::Warning);
        assert_eq!(Severity::classify(90.0), Severity::Critical);
        assert_eq!(Severity::classify(100.0), Severity::Critical);
    }

    #[test]
    fn severity_is_monotonic_in_usage() {
        let mut prev = Severity::Normal;
        for step in 0..=1000 {
            let pct = step as f64 / 10.0;
            let current = Severity::classify(pct);
            assert!(current >= prev, "severity dropped at {pct}%");
            prev = current;
        }
    }

    #[test]
    fn critical_flag_matches_threshold() {
        for pct in [0.0, 50.0, 89.99, 90.0, 95.0, 100.0] {
            assert_eq!(is_critical(pct), pct >= 90.0);
            assert_eq!(is_critical(pct), Severity::classify(pct) == Severity::Critical);
        }
    }

    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&Severity::Caution).unwrap();
        assert_eq!(json, "\"CAUTION\"");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
    }
}
