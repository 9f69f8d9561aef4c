//! Shape validation for submissions and uploads
//!
//! Every check collects all failures before returning, so the caller sees the
//! full list in one `KycError::Validation`.

use chrono::{Datelike, NaiveDate};

use crate::case::PersonalInfo;
use crate::config::KycConfig;
use crate::document::FileRef;
use crate::error::{KycError, KycResult};
use crate::risk::RiskAssessment;

const MIN_NAME_LEN: usize = 2;
const MIN_ADDRESS_LEN: usize = 10;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_AGE: u32 = 120;
const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn push(&mut self, field: &str, message: &str) {
        self.0.push(format!("{field}: {message}"));
    }

    fn into_result(self) -> KycResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(KycError::Validation(self.0.join("; ")))
        }
    }
}

/// Completed years between `dob` and `today`
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn is_valid_name(name: &str) -> bool {
    let name = name.trim();
    name.chars().count() >= MIN_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '\'' || c == '-')
}

fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    // '+' only as a leading prefix
    let plus_ok = phone.trim_start().chars().skip(1).all(|c| c != '+');
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    allowed && plus_ok && digits >= MIN_PHONE_DIGITS
}

pub fn validate_personal_info(
    info: &PersonalInfo,
    today: NaiveDate,
    min_age: u32,
) -> KycResult<()> {
    let mut v = Violations::default();

    if !is_valid_name(&info.first_name) {
        v.push(
            "first_name",
            "at least 2 characters; letters, spaces, hyphens and apostrophes only",
        );
    }
    if !is_valid_name(&info.last_name) {
        v.push(
            "last_name",
            "at least 2 characters; letters, spaces, hyphens and apostrophes only",
        );
    }

    if info.date_of_birth > today {
        v.push("date_of_birth", "must not be in the future");
    } else {
        let age = age_on(info.date_of_birth, today);
        if age < min_age {
            v.push(
                "date_of_birth",
                &format!("applicant must be at least {min_age} years old"),
            );
        } else if age > MAX_AGE {
            v.push("date_of_birth", "implausible age");
        }
    }

    if info.nationality.trim().is_empty() {
        v.push("nationality", "required");
    }
    if info.address.trim().chars().count() < MIN_ADDRESS_LEN {
        v.push("address", "at least 10 characters");
    }
    if !is_valid_phone(&info.phone_number) {
        v.push("phone_number", "at least 10 digits; digits, spaces, + - ( ) only");
    }
    if let Some(email) = &info.email {
        let email = email.trim();
        let shaped = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !shaped {
            v.push("email", "not an email address");
        }
    }

    v.into_result()
}

pub fn validate_risk_assessment(assessment: &RiskAssessment) -> KycResult<()> {
    let mut v = Violations::default();
    if assessment
        .investment_goals
        .iter()
        .all(|g| g.trim().is_empty())
    {
        v.push("investment_goals", "select at least one goal");
    }
    v.into_result()
}

/// Reference checks only; the file content is never read
pub fn validate_file_ref(file: &FileRef, config: &KycConfig) -> KycResult<()> {
    let mut v = Violations::default();

    if file.url.trim().is_empty() {
        v.push("url", "required");
    }
    if file.file_name.trim().is_empty() {
        v.push("file_name", "required");
    } else if file.file_name.chars().count() > MAX_FILE_NAME_LEN {
        v.push("file_name", "at most 255 characters");
    }
    if !config
        .accepted_mime_types
        .iter()
        .any(|m| m.eq_ignore_ascii_case(&file.mime_type))
    {
        v.push(
            "mime_type",
            &format!("{} is not an accepted file type", file.mime_type),
        );
    }
    if file.size_bytes == 0 {
        v.push("size_bytes", "file is empty");
    } else if file.size_bytes > config.max_document_bytes {
        v.push(
            "size_bytes",
            &format!("file exceeds {} bytes", config.max_document_bytes),
        );
    }
    if let Some(hash) = &file.sha256 {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            v.push("sha256", "expected 64 hex characters");
        }
    }

    v.into_result()
}
