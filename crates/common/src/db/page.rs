//! Page-based listing parameters shared by the listing endpoints

use serde::{Deserialize, Serialize};

/// `?page=&size=` query parameters; pages start at 0
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl PageQuery {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
        }
    }

    /// Resolve against the configured default and upper bound
    pub fn resolve(&self, default_size: u64, max_size: u64) -> (u64, u64) {
        let size = self.size.unwrap_or(default_size).clamp(1, max_size.max(1));
        (self.page.unwrap_or(0), size)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, size: u64, total: u64) -> Self {
        Self { items, page, size, total }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}
