//! Risk assessment questionnaire captured at submission
//!
//! Advisory input for reviewers. The flags only gate approval when
//! `KycConfig::escalate_flagged_risk` is enabled.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Unemployed,
    Retired,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum AnnualIncome {
    #[serde(rename = "under_25k")]
    #[strum(serialize = "under_25k")]
    Under25k,
    #[serde(rename = "25k_50k")]
    #[strum(serialize = "25k_50k")]
    From25kTo50k,
    #[serde(rename = "50k_100k")]
    #[strum(serialize = "50k_100k")]
    From50kTo100k,
    #[serde(rename = "100k_250k")]
    #[strum(serialize = "100k_250k")]
    From100kTo250k,
    #[serde(rename = "over_250k")]
    #[strum(serialize = "over_250k")]
    Over250k,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceOfFunds {
    Salary,
    Business,
    Investment,
    Inheritance,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvestmentExperience {
    None,
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CryptoExperience {
    None,
    Basic,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTolerance {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvestmentHorizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

/// Questionnaire answers, captured once per case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub employment_status: EmploymentStatus,
    pub annual_income: AnnualIncome,
    pub source_of_funds: SourceOfFunds,
    pub investment_experience: InvestmentExperience,
    pub crypto_experience: CryptoExperience,
    pub risk_tolerance: RiskTolerance,
    pub investment_horizon: InvestmentHorizon,

    /// Politically exposed person
    pub is_politically_exposed: bool,
    pub has_criminal_record: bool,
    /// Applicant confirmed they are not on a sanctions list
    pub sanctions_list_check: bool,

    pub investment_goals: Vec<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl RiskAssessment {
    /// Any compliance answer a reviewer should look at twice
    pub fn has_risk_flags(&self) -> bool {
        self.is_politically_exposed || self.has_criminal_record || !self.sanctions_list_check
    }
}
