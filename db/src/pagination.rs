use serde::Serialize;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 1;
const FALLBACK_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// A normalized page request.
///
/// A missing or zero `page`/`limit` takes the default. A negative page is reset to the first
/// page, a negative limit or one above 100 falls back to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = match page.unwrap_or(0) {
            0 => DEFAULT_PAGE,
            p if p < 0 => DEFAULT_PAGE,
            p => p,
        };

        let limit = match limit.unwrap_or(0) {
            0 => DEFAULT_LIMIT,
            l if !(1..=MAX_LIMIT).contains(&l) => FALLBACK_LIMIT,
            l => l,
        };

        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn metadata(&self, total: i64) -> PageMetadata {
        PageMetadata {
            total_pages: (total + self.limit - 1) / self.limit,
            current_page: self.page,
            current_limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub total_pages: i64,
    pub current_page: i64,
    pub current_limit: i64,
}
