//! KYCFlow Query - read-side views over cases
//!
//! Pure functions over snapshots loaded from the store: nothing here performs
//! I/O, so callers decide how fresh the data is.

pub mod search;
pub mod stats;

pub use search::{search, DateRange, SearchFilters, SortBy, SortOrder, SortSpec};
pub use stats::{
    compute_stats, DailyCount, ProcessingStats, ReviewerThroughput, RiskCount, StatsSummary,
    StatusCount, StatusSummary, TimeRange,
};

#[cfg(test)]
pub(crate) mod tests_support {
    use chrono::{DateTime, NaiveDate, Utc};
    use kycflow_core::risk::*;
    use kycflow_core::{PersonalInfo, VerificationRecord};

    pub fn record_at(applicant_id: &str, submitted_at: DateTime<Utc>) -> VerificationRecord {
        let info = PersonalInfo {
            first_name: "Alice".to_string(),
            last_name: "Nguyen".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            nationality: "VN".to_string(),
            address: "12 Le Loi Street, District 1".to_string(),
            phone_number: "+84 912 345 678".to_string(),
            email: Some(format!("{}@example.com", applicant_id.to_lowercase())),
        };
        let assessment = RiskAssessment {
            employment_status: EmploymentStatus::SelfEmployed,
            annual_income: AnnualIncome::From100kTo250k,
            source_of_funds: SourceOfFunds::Business,
            investment_experience: InvestmentExperience::Advanced,
            crypto_experience: CryptoExperience::Intermediate,
            risk_tolerance: RiskTolerance::High,
            investment_horizon: InvestmentHorizon::ShortTerm,
            is_politically_exposed: false,
            has_criminal_record: false,
            sanctions_list_check: true,
            investment_goals: vec!["growth".to_string()],
            additional_notes: None,
        };
        VerificationRecord::new(applicant_id, info, assessment, submitted_at)
    }

    pub fn record(applicant_id: &str) -> VerificationRecord {
        record_at(applicant_id, Utc::now())
    }
}
