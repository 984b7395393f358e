use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decides which rows are new relative to a site's last stored timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkGate {
    /// No prior datapoints: every row is a candidate.
    FreshImport,
    /// Only rows strictly later than the stored timestamp qualify.
    Since(DateTime<Utc>),
}

impl WatermarkGate {
    pub fn new(watermark: Option<DateTime<Utc>>) -> Self {
        match watermark {
            None => WatermarkGate::FreshImport,
            Some(ts) => WatermarkGate::Since(ts),
        }
    }

    pub fn should_insert(&self, candidate: DateTime<Utc>) -> bool {
        match self {
            WatermarkGate::FreshImport => true,
            WatermarkGate::Since(watermark) => candidate > *watermark,
        }
    }

    pub fn is_fresh_import(&self) -> bool {
        matches!(self, WatermarkGate::FreshImport)
    }
}

pub fn should_insert(candidate: DateTime<Utc>, watermark: Option<DateTime<Utc>>) -> bool {
    WatermarkGate::new(watermark).should_insert(candidate)
}

/// Which instant is recorded as a site's watermark after an import pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPolicy {
    /// Wall-clock time at the end of the pass, whatever was inserted.
    #[default]
    RunTime,
    /// Latest timestamp actually inserted; unchanged when nothing was inserted.
    MaxInsertedTimestamp,
}

impl WatermarkPolicy {
    /// Value to record, or `None` when the watermark should be left alone.
    pub fn resolve(&self, now: DateTime<Utc>, max_inserted: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self {
            WatermarkPolicy::RunTime => Some(now),
            WatermarkPolicy::MaxInsertedTimestamp => max_inserted,
        }
    }
}

impl fmt::Display for WatermarkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatermarkPolicy::RunTime => write!(f, "run_time"),
            WatermarkPolicy::MaxInsertedTimestamp => write!(f, "max_inserted_timestamp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_import_accepts_everything() {
        let gate = WatermarkGate::new(None);
        assert!(gate.is_fresh_import());
        assert!(gate.should_insert(at(0)));
        assert!(gate.should_insert(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_comparison_is_strict() {
        let gate = WatermarkGate::new(Some(at(6)));
        assert!(!gate.should_insert(at(5)));
        assert!(!gate.should_insert(at(6)));
        assert!(gate.should_insert(at(7)));

        assert!(!should_insert(at(6), Some(at(6))));
        assert!(should_insert(at(6), None));
    }

    #[test]
    fn test_policy_resolution() {
        let now = at(12);

        assert_eq!(WatermarkPolicy::RunTime.resolve(now, Some(at(3))), Some(now));
        assert_eq!(WatermarkPolicy::RunTime.resolve(now, None), Some(now));
        assert_eq!(
            WatermarkPolicy::MaxInsertedTimestamp.resolve(now, Some(at(3))),
            Some(at(3))
        );
        assert_eq!(WatermarkPolicy::MaxInsertedTimestamp.resolve(now, None), None);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(WatermarkPolicy::default(), WatermarkPolicy::RunTime);
        assert_eq!(WatermarkPolicy::MaxInsertedTimestamp.to_string(), "max_inserted_timestamp");

        let parsed: WatermarkPolicy = serde_json::from_str("\"max_inserted_timestamp\"").unwrap();
        assert_eq!(parsed, WatermarkPolicy::MaxInsertedTimestamp);
    }
}
