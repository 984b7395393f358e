use crate::processors::claim::ClaimState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Counters for one file imported into one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub site_id: i32,
    pub rows_total: usize,
    pub inserted: usize,
    pub skipped_existing: usize,
    pub transform_failures: usize,
    pub insert_failures: usize,
    /// Latest timestamp actually inserted during this pass
    pub max_inserted: Option<DateTime<Utc>>,
    /// Value recorded as the site's last-updated time, if any
    pub watermark: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

impl ImportReport {
    pub fn new(site_id: i32) -> Self {
        Self {
            site_id,
            ..Default::default()
        }
    }

    pub fn record_insert(&mut self, timestamp: DateTime<Utc>) {
        self.inserted += 1;
        self.max_inserted = Some(match self.max_inserted {
            Some(current) if current >= timestamp => current,
            _ => timestamp,
        });
    }

    pub fn failures(&self) -> usize {
        self.transform_failures + self.insert_failures
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteOutcome {
    pub site_id: i32,
    pub site_name: String,
    pub worker: String,
    pub state: ClaimState,
    pub report: Option<ImportReport>,
    pub error: Option<String>,
}

impl SiteOutcome {
    pub fn is_failed(&self) -> bool {
        self.state == ClaimState::Failed
    }
}

/// Result of one sync run across every site in the catalog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub outcomes: Vec<SiteOutcome>,
    pub unclaimed: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncSummary {
    pub fn sites_downloaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state == ClaimState::Downloaded).count()
    }

    pub fn sites_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn total_inserted(&self) -> usize {
        self.reports().map(|r| r.inserted).sum()
    }

    pub fn total_row_failures(&self) -> usize {
        self.reports().map(ImportReport::failures).sum()
    }

    pub fn outcome_for(&self, site_id: i32) -> Option<&SiteOutcome> {
        self.outcomes.iter().find(|o| o.site_id == site_id)
    }

    fn reports(&self) -> impl Iterator<Item = &ImportReport> {
        self.outcomes.iter().filter_map(|o| o.report.as_ref())
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Sync Summary ===\n");
        summary.push_str(&format!("Sites Processed: {}\n", self.outcomes.len()));
        summary.push_str(&format!("  Downloaded: {}\n", self.sites_downloaded()));
        summary.push_str(&format!("  Failed: {}\n", self.sites_failed()));
        if self.unclaimed > 0 {
            summary.push_str(&format!("  Not reached: {}\n", self.unclaimed));
        }
        summary.push_str(&format!("Datapoints Inserted: {}\n", self.total_inserted()));
        summary.push_str(&format!("Row Failures: {}\n", self.total_row_failures()));
        summary.push_str(&format!("Elapsed: {:.1}s\n", self.elapsed.as_secs_f64()));

        let mut outcomes: Vec<&SiteOutcome> = self.outcomes.iter().collect();
        outcomes.sort_by_key(|o| o.site_id);

        summary.push_str("\nPer Site:\n");
        for outcome in outcomes {
            match (&outcome.report, &outcome.error) {
                (Some(report), _) => summary.push_str(&format!(
                    "  [{}] {} ({}): {} inserted, {} existing, {} failed{}\n",
                    outcome.site_id,
                    outcome.site_name,
                    outcome.worker,
                    report.inserted,
                    report.skipped_existing,
                    report.failures(),
                    if report.cancelled { ", cancelled" } else { "" }
                )),
                (None, Some(error)) => summary.push_str(&format!(
                    "  [{}] {} ({}): FAILED {}\n",
                    outcome.site_id, outcome.site_name, outcome.worker, error
                )),
                (None, None) => summary.push_str(&format!(
                    "  [{}] {} ({}): {:?}\n",
                    outcome.site_id, outcome.site_name, outcome.worker, outcome.state
                )),
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_insert_tracks_maximum() {
        let mut report = ImportReport::new(1);
        report.record_insert(Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap());
        report.record_insert(Utc.with_ymd_and_hms(2021, 6, 1, 6, 0, 0).unwrap());

        assert_eq!(report.inserted, 2);
        assert_eq!(report.max_inserted, Some(Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_summary_text() {
        let mut report = ImportReport::new(1);
        report.inserted = 24;
        report.insert_failures = 1;

        let summary = SyncSummary {
            outcomes: vec![
                SiteOutcome {
                    site_id: 2,
                    site_name: "Pinedale".to_string(),
                    worker: "worker-1".to_string(),
                    state: ClaimState::Failed,
                    report: None,
                    error: Some("status 404".to_string()),
                },
                SiteOutcome {
                    site_id: 1,
                    site_name: "Laramie".to_string(),
                    worker: "worker-0".to_string(),
                    state: ClaimState::Downloaded,
                    report: Some(report),
                    error: None,
                },
            ],
            unclaimed: 0,
            elapsed: Duration::from_millis(1500),
        };

        assert_eq!(summary.sites_downloaded(), 1);
        assert_eq!(summary.sites_failed(), 1);
        assert_eq!(summary.total_inserted(), 24);

        let text = summary.generate_summary();
        assert!(text.contains("Datapoints Inserted: 24"));
        assert!(text.contains("[1] Laramie (worker-0): 24 inserted, 0 existing, 1 failed"));
        assert!(text.contains("[2] Pinedale (worker-1): FAILED status 404"));
        assert!(text.find("[1]") < text.find("[2]"));
    }
}
