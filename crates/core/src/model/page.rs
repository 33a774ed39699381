use thiserror::Error;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PageError {
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidSize,
}

/// A 1-indexed page request as callers think of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// # Errors
    ///
    /// Returns `PageError` when `page` is 0 or `size` is outside `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Result<Self, PageError> {
        if page == 0 {
            return Err(PageError::InvalidPage);
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(PageError::InvalidSize);
        }
        Ok(Self { page, size })
    }

    #[must_use]
    pub fn first(size: u32) -> Self {
        Self {
            page: 1,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Page number the backend expects (0-indexed).
    #[must_use]
    pub fn zero_based(&self) -> u32 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(10)
    }
}

/// One page of results, renumbered to 1-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Builds a page from the backend's zero-based page number.
    #[must_use]
    pub fn from_zero_based(items: Vec<T>, zero_page: u32, size: u32, total_items: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            u32::try_from(total_items.div_ceil(u64::from(size))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            page: zero_page.saturating_add(1),
            size,
            total_items,
            total_pages,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}
