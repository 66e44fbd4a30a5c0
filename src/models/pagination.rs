//! Pagination primitives shared by every listing

use serde::{Deserialize, Serialize};

/// Page size of every post listing
pub const POSTS_PER_PAGE: u32 = 10;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: POSTS_PER_PAGE,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Number of pages needed for `total` items; zero items still make one (empty) page
pub fn page_count(total: i64, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as i64;
    let pages = (total.max(0) + per_page - 1) / per_page;
    pages.max(1) as u32
}

/// A requested page, as given in `?page=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(u32),
    Last,
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::Number(1)
    }
}

impl PageNumber {
    /// Parse the raw query value. A missing or blank value means page 1;
    /// anything that is not a positive integer or `last` is `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") => Some(Self::Number(1)),
            Some("last") => Some(Self::Last),
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .map(Self::Number),
        }
    }

    /// Resolve against a result size; pages past the end do not exist
    pub fn resolve_strict(self, total: i64, per_page: u32) -> Option<u32> {
        let pages = page_count(total, per_page);
        match self {
            Self::Number(n) if n <= pages => Some(n),
            Self::Number(_) => None,
            Self::Last => Some(pages),
        }
    }

    /// Resolve against a result size, snapping to the nearest existing page
    pub fn resolve_clamped(self, total: i64, per_page: u32) -> u32 {
        let pages = page_count(total, per_page);
        match self {
            Self::Number(n) => n.clamp(1, pages),
            Self::Last => pages,
        }
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        page_count(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Navigation block for templates, which cannot call methods
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            total_pages: self.total_pages(),
            total: self.total,
            has_next: self.has_next(),
            has_prev: self.has_prev(),
            next_page: self.has_next().then(|| self.page + 1),
            prev_page: self.has_prev().then(|| self.page - 1),
        }
    }
}

/// Serializable pagination summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}
