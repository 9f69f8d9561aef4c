//! 1-indexed pagination shared by search and audit queries

use serde::{Deserialize, Serialize};

use crate::error::{KycError, KycResult};

/// Requested page (1-indexed) and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    pub fn first(limit: u32) -> Self {
        Self::new(1, limit)
    }

    pub fn validate(&self) -> KycResult<()> {
        if self.page == 0 {
            return Err(KycError::validation("page is 1-indexed"));
        }
        if self.limit == 0 {
            return Err(KycError::validation("limit must be at least 1"));
        }
        Ok(())
    }

    /// Number of records skipped before this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// Page metadata returned with every paged response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub total_records: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: &PageRequest, total_records: usize) -> Self {
        let limit = request.limit.max(1) as usize;
        let total_pages = total_records.div_ceil(limit) as u32;
        Self {
            current_page: request.page,
            limit: request.limit,
            total_pages,
            total_records: total_records as u64,
            has_next_page: request.page < total_pages,
            has_prev_page: request.page > 1,
        }
    }
}

/// A page of records plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    /// Slice an already-filtered, already-sorted list
    pub fn from_sorted(items: Vec<T>, request: &PageRequest) -> Self {
        let pagination = Pagination::new(request, items.len());
        let records = items
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();
        Self {
            records,
            pagination,
        }
    }
}
