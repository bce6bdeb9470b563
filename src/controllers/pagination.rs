use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Параметры страницы из query-строки: `?page=2&page_size=10`.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

/// Страница результатов.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl PageParams {
    pub fn resolve(&self, default_page_size: u32) -> Pagination {
        Pagination {
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    fn last_page(&self, count: i64) -> i64 {
        let size = i64::from(self.page_size);
        ((count + size - 1) / size).max(1)
    }

    /// Страница за пределами результатов - 404, кроме первой страницы пустого списка.
    pub fn check(&self, count: i64) -> AppResult<()> {
        if i64::from(self.page) > self.last_page(count) {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }
        Ok(())
    }

    pub fn into_page<T>(self, count: i64, results: Vec<T>) -> Page<T> {
        let has_next = i64::from(self.page) < self.last_page(count);
        Page {
            count,
            page: self.page,
            page_size: self.page_size,
            next: has_next.then_some(self.page + 1),
            previous: (self.page > 1).then(|| self.page - 1),
            results,
        }
    }
}
