//! Case search: filter, sort, paginate

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use kycflow_core::{
    CaseId, CaseStatus, Document, DocumentType, KycError, KycResult, PageRequest, Paginated,
    RiskLevel, VerificationRecord,
};

/// Inclusive time window; an open bound matches everything on that side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    fn validate(&self, field: &str) -> KycResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(KycError::validation(format!(
                "{field}: range start is after its end"
            ))),
            _ => Ok(()),
        }
    }
}

/// Conjunction of optional filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub status: Option<CaseStatus>,
    pub risk_level: Option<RiskLevel>,
    /// Case-insensitive substring over names, email, document numbers and case id
    pub search_query: Option<String>,
    pub submitted: Option<DateRange>,
    pub reviewed: Option<DateRange>,
    /// Case has at least one document of this type
    pub document_type: Option<DocumentType>,
    /// Case-insensitive equality
    pub nationality: Option<String>,
    /// Matches the deciding or the assigned reviewer
    pub reviewer: Option<String>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortBy {
    #[default]
    SubmittedAt,
    ReviewedAt,
    FirstName,
    RiskLevel,
    Status,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Newest submissions first unless told otherwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub by: SortBy,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(by: SortBy, order: SortOrder) -> Self {
        Self { by, order }
    }
}

/// Unset values go last in either direction
fn cmp_optional<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => order.apply(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &VerificationRecord, b: &VerificationRecord, sort: SortSpec) -> Ordering {
    let primary = match sort.by {
        SortBy::SubmittedAt => sort.order.apply(a.submitted_at.cmp(&b.submitted_at)),
        SortBy::ReviewedAt => cmp_optional(a.reviewed_at, b.reviewed_at, sort.order),
        SortBy::FirstName => sort.order.apply(
            a.personal_info
                .first_name
                .to_lowercase()
                .cmp(&b.personal_info.first_name.to_lowercase()),
        ),
        SortBy::RiskLevel => cmp_optional(a.risk_level, b.risk_level, sort.order),
        SortBy::Status => sort.order.apply(a.status.cmp(&b.status)),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

struct DocumentIndex<'a> {
    types: HashMap<&'a CaseId, HashSet<DocumentType>>,
    numbers: HashMap<&'a CaseId, Vec<String>>,
}

impl<'a> DocumentIndex<'a> {
    fn build(documents: &'a [Document]) -> Self {
        let mut types: HashMap<&CaseId, HashSet<DocumentType>> = HashMap::new();
        let mut numbers: HashMap<&CaseId, Vec<String>> = HashMap::new();
        for doc in documents {
            types.entry(&doc.case_id).or_default().insert(doc.document_type);
            if let Some(number) = &doc.document_number {
                numbers
                    .entry(&doc.case_id)
                    .or_default()
                    .push(number.to_lowercase());
            }
        }
        Self { types, numbers }
    }

    fn has_type(&self, case_id: &CaseId, document_type: DocumentType) -> bool {
        self.types
            .get(case_id)
            .is_some_and(|t| t.contains(&document_type))
    }

    fn number_matches(&self, case_id: &CaseId, needle: &str) -> bool {
        self.numbers
            .get(case_id)
            .is_some_and(|n| n.iter().any(|number| number.contains(needle)))
    }
}

fn text_matches(record: &VerificationRecord, index: &DocumentIndex<'_>, needle: &str) -> bool {
    let info = &record.personal_info;
    let haystacks = [
        info.first_name.to_lowercase(),
        info.last_name.to_lowercase(),
        info.full_name().to_lowercase(),
        info.email.as_deref().unwrap_or_default().to_lowercase(),
        record.id.as_str().to_lowercase(),
    ];
    haystacks.iter().any(|h| h.contains(needle)) || index.number_matches(&record.id, needle)
}

fn matches(record: &VerificationRecord, filters: &SearchFilters, index: &DocumentIndex<'_>) -> bool {
    if filters.status.is_some_and(|s| record.status != s) {
        return false;
    }
    if filters.risk_level.is_some() && record.risk_level != filters.risk_level {
        return false;
    }
    if let Some(range) = &filters.submitted {
        if !range.contains(record.submitted_at) {
            return false;
        }
    }
    if let Some(range) = &filters.reviewed {
        if !record.reviewed_at.is_some_and(|at| range.contains(at)) {
            return false;
        }
    }
    if let Some(nationality) = &filters.nationality {
        if !record
            .personal_info
            .nationality
            .trim()
            .eq_ignore_ascii_case(nationality.trim())
        {
            return false;
        }
    }
    if let Some(reviewer) = &filters.reviewer {
        let assigned = record.assigned_reviewer.as_deref() == Some(reviewer.as_str());
        let decided = record.reviewed_by.as_deref() == Some(reviewer.as_str());
        if !assigned && !decided {
            return false;
        }
    }
    if let Some(document_type) = filters.document_type {
        if !index.has_type(&record.id, document_type) {
            return false;
        }
    }
    if let Some(query) = &filters.search_query {
        let needle = query.trim().to_lowercase();
        if !needle.is_empty() && !text_matches(record, index, &needle) {
            return false;
        }
    }
    true
}

/// Filter, sort and page `records`. `documents` backs the document-type and
/// document-number filters.
pub fn search(
    records: Vec<VerificationRecord>,
    documents: &[Document],
    filters: &SearchFilters,
    sort: SortSpec,
    page: &PageRequest,
) -> KycResult<Paginated<VerificationRecord>> {
    page.validate()?;
    if let Some(range) = &filters.submitted {
        range.validate("submitted")?;
    }
    if let Some(range) = &filters.reviewed {
        range.validate("reviewed")?;
    }

    let index = DocumentIndex::build(documents);
    let mut hits: Vec<VerificationRecord> = records
        .into_iter()
        .filter(|r| matches(r, filters, &index))
        .collect();
    hits.sort_by(|a, b| compare(a, b, sort));

    Ok(Paginated::from_sorted(hits, page))
}
