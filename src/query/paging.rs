use super::QueryParams;
use thiserror::Error;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PagingError {
    #[error("{name} is not an integer: '{value}'")]
    NotAnInteger { name: &'static str, value: String },
    #[error("page must be >= 1, got {0}")]
    Page(i64),
    #[error("pagesize must be > 0, got {0}")]
    PageSize(i64),
    #[error("page {page} of size {page_size} is past the last addressable row")]
    Overflow { page: i64, page_size: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
    offset: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Paging {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Paging {
    /// Read `page` and `pagesize`; absent or empty values take the defaults, bad ones fail.
    pub fn from_params(params: &QueryParams) -> Result<Self, PagingError> {
        let page = read_int(params, "page", DEFAULT_PAGE)?;
        let page_size = read_int(params, "pagesize", DEFAULT_PAGE_SIZE)?;
        Self::new(page, page_size)
    }

    /// Validate the range and fix the row offset; the offset must fit in an `i64`.
    pub fn new(page: i64, page_size: i64) -> Result<Self, PagingError> {
        if page < 1 {
            return Err(PagingError::Page(page));
        }
        if page_size <= 0 {
            return Err(PagingError::PageSize(page_size));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or(PagingError::Overflow { page, page_size })?;
        Ok(Paging {
            page,
            page_size,
            offset,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Page number echoed in list responses, recomputed from the offset.
    pub fn current_page(&self) -> i64 {
        self.offset() / self.page_size + 1
    }
}

fn read_int(params: &QueryParams, name: &'static str, default: i64) -> Result<i64, PagingError> {
    match params.first(name) {
        None | Some("") => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| PagingError::NotAnInteger {
            name,
            value: raw.to_string(),
        }),
    }
}
