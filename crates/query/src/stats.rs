//! Dashboard statistics over a time window
//!
//! The window selects cases by submission date (UTC days, inclusive). All
//! ratios and averages over empty sets are 0.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kycflow_core::{CaseStatus, KycError, KycResult, RiskLevel, VerificationRecord};

/// Longest custom window, in days
const MAX_CUSTOM_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    Last90Days,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl TimeRange {
    /// Parse the dashboard shorthand ("7d", "30d", "90d")
    pub fn from_shorthand(value: &str) -> Option<Self> {
        match value {
            "7d" => Some(TimeRange::Last7Days),
            "30d" => Some(TimeRange::Last30Days),
            "90d" => Some(TimeRange::Last90Days),
            _ => None,
        }
    }

    /// Inclusive first and last day of the window as seen at `now`
    pub fn bounds(&self, now: DateTime<Utc>) -> KycResult<(NaiveDate, NaiveDate)> {
        let today = now.date_naive();
        let trailing = |days: i64| (today - Duration::days(days - 1), today);
        match *self {
            TimeRange::Last7Days => Ok(trailing(7)),
            TimeRange::Last30Days => Ok(trailing(30)),
            TimeRange::Last90Days => Ok(trailing(90)),
            TimeRange::Custom { start, end } => {
                if start > end {
                    return Err(KycError::validation("time range start is after its end"));
                }
                if (end - start).num_days() >= MAX_CUSTOM_DAYS {
                    return Err(KycError::validation(format!(
                        "time range is limited to {MAX_CUSTOM_DAYS} days"
                    )));
                }
                Ok((start, end))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: u64,
    pub pending: u64,
    pub under_review: u64,
    pub approved: u64,
    pub rejected: u64,
    pub expired: u64,
    /// approved / (approved + rejected) x 100, two decimals
    pub approval_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: CaseStatus,
    pub count: u64,
}

/// `risk_level` is `None` for cases not yet assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCount {
    pub risk_level: Option<RiskLevel>,
    pub count: u64,
}

/// Submission-to-decision time of terminal cases
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub avg_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    pub processed_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerThroughput {
    pub reviewer_id: String,
    pub reviewed: u64,
    pub approved: u64,
    pub rejected: u64,
    pub avg_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub summary: StatusSummary,
    pub status_distribution: Vec<StatusCount>,
    pub risk_distribution: Vec<RiskCount>,
    pub processing: ProcessingStats,
    pub daily_submissions: Vec<DailyCount>,
    pub reviewer_performance: Vec<ReviewerThroughput>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator as f64 / denominator as f64 * 100.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Approved at decision time; expiry does not undo the decision
fn was_approved(record: &VerificationRecord) -> bool {
    matches!(record.status, CaseStatus::Approved | CaseStatus::Expired)
}

fn processing(hours: &[f64]) -> ProcessingStats {
    if hours.is_empty() {
        return ProcessingStats::default();
    }
    ProcessingStats {
        avg_hours: mean(hours),
        min_hours: round2(hours.iter().copied().fold(f64::INFINITY, f64::min)),
        max_hours: round2(hours.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        processed_count: hours.len() as u64,
    }
}

fn reviewer_performance(scope: &[&VerificationRecord]) -> Vec<ReviewerThroughput> {
    #[derive(Default)]
    struct Tally {
        approved: u64,
        rejected: u64,
        hours: Vec<f64>,
    }

    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for record in scope.iter().filter(|r| r.is_terminal()) {
        let Some(reviewer) = record.reviewed_by.as_deref() else {
            continue;
        };
        let tally = tallies.entry(reviewer).or_default();
        if was_approved(record) {
            tally.approved += 1;
        } else {
            tally.rejected += 1;
        }
        if let Some(hours) = record.processing_hours() {
            tally.hours.push(hours);
        }
    }

    let mut rows: Vec<ReviewerThroughput> = tallies
        .into_iter()
        .map(|(reviewer_id, tally)| ReviewerThroughput {
            reviewer_id: reviewer_id.to_string(),
            reviewed: tally.approved + tally.rejected,
            approved: tally.approved,
            rejected: tally.rejected,
            avg_hours: mean(&tally.hours),
        })
        .collect();
    // BTreeMap order already breaks ties by reviewer id; the sort is stable
    rows.sort_by(|a, b| b.reviewed.cmp(&a.reviewed));
    rows
}

/// Aggregate the cases submitted inside `range` as seen at `now`
pub fn compute_stats(
    records: &[VerificationRecord],
    range: &TimeRange,
    now: DateTime<Utc>,
) -> KycResult<StatsSummary> {
    let (start, end) = range.bounds(now)?;

    let scope: Vec<&VerificationRecord> = records
        .iter()
        .filter(|r| {
            let day = r.submitted_at.date_naive();
            day >= start && day <= end
        })
        .collect();

    let count_status = |status: CaseStatus| -> u64 {
        scope.iter().filter(|r| r.status == status).count() as u64
    };
    let status_distribution: Vec<StatusCount> = CaseStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: count_status(status),
        })
        .collect();

    let approved = count_status(CaseStatus::Approved);
    let rejected = count_status(CaseStatus::Rejected);
    let summary = StatusSummary {
        total: scope.len() as u64,
        pending: count_status(CaseStatus::Pending),
        under_review: count_status(CaseStatus::UnderReview),
        approved,
        rejected,
        expired: count_status(CaseStatus::Expired),
        approval_rate: ratio(approved, approved + rejected),
    };

    let mut risk_distribution: Vec<RiskCount> = RiskLevel::ALL
        .iter()
        .map(|&level| RiskCount {
            risk_level: Some(level),
            count: scope.iter().filter(|r| r.risk_level == Some(level)).count() as u64,
        })
        .collect();
    risk_distribution.push(RiskCount {
        risk_level: None,
        count: scope.iter().filter(|r| r.risk_level.is_none()).count() as u64,
    });

    let hours: Vec<f64> = scope.iter().filter_map(|r| r.processing_hours()).collect();

    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in &scope {
        *per_day.entry(record.submitted_at.date_naive()).or_default() += 1;
    }
    let daily_submissions = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| DailyCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect();

    Ok(StatsSummary {
        range_start: start,
        range_end: end,
        summary,
        status_distribution,
        risk_distribution,
        processing: processing(&hours),
        daily_submissions,
        reviewer_performance: reviewer_performance(&scope),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::record_at;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn decided(
        applicant: &str,
        submitted: DateTime<Utc>,
        status: CaseStatus,
        reviewer: &str,
        hours: i64,
    ) -> VerificationRecord {
        let mut r = record_at(applicant, submitted);
        r.status = status;
        r.reviewed_by = Some(reviewer.to_string());
        r.reviewed_at = Some(submitted + Duration::hours(hours));
        r.risk_level = Some(RiskLevel::Low);
        r
    }

    #[test]
    fn test_empty_store() {
        let stats = compute_stats(&[], &TimeRange::Last7Days, now()).unwrap();

        assert_eq!(stats.summary.total, 0);
        assert_eq!(stats.summary.approval_rate, 0.0);
        assert_eq!(stats.processing.avg_hours, 0.0);
        assert_eq!(stats.processing.processed_count, 0);
        assert_eq!(stats.daily_submissions.len(), 7);
        assert!(stats.daily_submissions.iter().all(|d| d.count == 0));
        assert!(stats.reviewer_performance.is_empty());
    }

    #[test]
    fn test_no_terminal_cases_gives_zero_average() {
        let records = vec![
            record_at("USER-1", now() - Duration::days(1)),
            record_at("USER-2", now() - Duration::days(2)),
        ];
        let stats = compute_stats(&records, &TimeRange::Last7Days, now()).unwrap();

        assert_eq!(stats.summary.pending, 2);
        assert_eq!(stats.processing.avg_hours, 0.0);
        assert_eq!(stats.processing.min_hours, 0.0);
        assert_eq!(stats.processing.max_hours, 0.0);
    }

    #[test]
    fn test_counts_rates_and_processing() {
        let day = now() - Duration::days(3);
        let records = vec![
            decided("USER-1", day, CaseStatus::Approved, "REV-A", 2),
            decided("USER-2", day, CaseStatus::Approved, "REV-A", 4),
            decided("USER-3", day, CaseStatus::Rejected, "REV-B", 9),
            record_at("USER-4", day),
            // outside the window
            decided("USER-5", now() - Duration::days(40), CaseStatus::Rejected, "REV-B", 1),
        ];
        let stats = compute_stats(&records, &TimeRange::Last7Days, now()).unwrap();

        assert_eq!(stats.summary.total, 4);
        assert_eq!(stats.summary.approved, 2);
        assert_eq!(stats.summary.rejected, 1);
        assert_eq!(stats.summary.approval_rate, 66.67);

        assert_eq!(stats.processing.processed_count, 3);
        assert_eq!(stats.processing.avg_hours, 5.0);
        assert_eq!(stats.processing.min_hours, 2.0);
        assert_eq!(stats.processing.max_hours, 9.0);

        let low = stats
            .risk_distribution
            .iter()
            .find(|r| r.risk_level == Some(RiskLevel::Low))
            .unwrap();
        assert_eq!(low.count, 3);

        let total_daily: u64 = stats.daily_submissions.iter().map(|d| d.count).sum();
        assert_eq!(total_daily, 4);

        assert_eq!(stats.reviewer_performance[0].reviewer_id, "REV-A");
        assert_eq!(stats.reviewer_performance[0].reviewed, 2);
        assert_eq!(stats.reviewer_performance[0].avg_hours, 3.0);
        assert_eq!(stats.reviewer_performance[1].rejected, 1);
    }

    #[test]
    fn test_bounds() {
        let (start, end) = TimeRange::Last30Days.bounds(now()).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        let inverted = TimeRange::Custom {
            start: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        assert!(inverted.bounds(now()).is_err());

        assert_eq!(TimeRange::from_shorthand("90d"), Some(TimeRange::Last90Days));
        assert_eq!(TimeRange::from_shorthand("1y"), None);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = compute_stats(&[], &TimeRange::Last7Days, now()).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["summary"]["approval_rate"], 0.0);
        assert_eq!(json["status_distribution"][1]["status"], "under_review");
    }
}
