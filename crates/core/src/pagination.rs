//! Page-based pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Build a page request. Missing or zero values fall back to page 1 and
    /// [`DEFAULT_PAGE_SIZE`]; sizes above [`MAX_PAGE_SIZE`] are clamped.
    #[must_use]
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals a client needs to render a pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paged<T> {
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let size = u64::from(request.page_size);
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages: total.div_ceil(size),
        }
    }

    /// Transform the items while keeping the paging metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Paged<U>
    where
        F: FnMut(T) -> U,
    {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let req = PageRequest::new(None, None);
        assert_eq!((req.page(), req.page_size()), (1, DEFAULT_PAGE_SIZE));

        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!((req.page(), req.page_size()), (1, DEFAULT_PAGE_SIZE));

        let req = PageRequest::new(Some(3), Some(1000));
        assert_eq!(req.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_limit_offset() {
        let req = PageRequest::new(Some(3), Some(25));
        assert_eq!(req.limit(), 25);
        assert_eq!(req.offset(), 50);
    }

    #[test]
    fn test_total_pages() {
        let req = PageRequest::new(Some(1), Some(10));
        assert_eq!(Paged::new(Vec::<u8>::new(), req, 0).total_pages, 0);
        assert_eq!(Paged::new(Vec::<u8>::new(), req, 10).total_pages, 1);
        assert_eq!(Paged::new(Vec::<u8>::new(), req, 11).total_pages, 2);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let req = PageRequest::new(Some(2), Some(2));
        let paged = Paged::new(vec![1, 2], req, 5).map(|n| n * 10);
        assert_eq!(paged.items, vec![10, 20]);
        assert_eq!(paged.page, 2);
        assert_eq!(paged.total_pages, 3);
    }
}
