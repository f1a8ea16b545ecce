use serde::Serialize;
use thiserror::Error;

/// Requested page lies outside `1..=num_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page {page} is out of range (1..={num_pages})")]
pub struct PageOutOfRange {
    pub page: u32,
    pub num_pages: u32,
}

/// Resolved slice of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
    pub count: u64,
}

impl PageWindow {
    /// Page numbers start at 1. An empty result still has one (empty) page;
    /// anything past the last page is an error rather than clamped.
    pub fn resolve(count: u64, page: u32, page_size: u32) -> Result<Self, PageOutOfRange> {
        let page_size = page_size.max(1);
        let num_pages = count.div_ceil(u64::from(page_size)).max(1);
        let num_pages = u32::try_from(num_pages).unwrap_or(u32::MAX);
        if page == 0 || page > num_pages {
            return Err(PageOutOfRange { page, num_pages });
        }
        Ok(Self {
            page,
            page_size,
            num_pages,
            count,
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// One page of results plus navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, results: Vec<T>) -> Self {
        let has_next = window.page < window.num_pages;
        let has_previous = window.page > 1;
        Self {
            count: window.count,
            page: window.page,
            page_size: window.page_size,
            num_pages: window.num_pages,
            has_next,
            has_previous,
            next: has_next.then(|| window.page + 1),
            previous: has_previous.then(|| window.page - 1),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            num_pages: self.num_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
