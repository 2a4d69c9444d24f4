//! Offset pagination shared by the list operations.

use serde::Serialize;

use crate::DomainError;

/// A validated page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Validates `page >= 1` and `1 <= limit <= max_limit`.
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::Validation(
                "Page must be a positive integer".to_string(),
            ));
        }
        if limit == 0 || limit > max_limit {
            return Err(DomainError::Validation(format!(
                "Limit must be between 1 and {max_limit}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Cuts one page out of an already filtered and sorted result set.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let limit = u64::from(self.limit);
        let pages = total.div_ceil(limit);
        let skip = (u64::from(self.page) - 1) * limit;

        let items = items
            .into_iter()
            .skip(skip as usize)
            .take(self.limit as usize)
            .collect();

        Page {
            items,
            page: self.page,
            limit: self.limit,
            total,
            pages,
        }
    }
}

/// One page of results with the counts needed to render pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Maps the items, keeping the counts.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(PageRequest::new(0, 10, 100).is_err());
        assert!(PageRequest::new(1, 0, 100).is_err());
        assert!(PageRequest::new(1, 101, 100).is_err());
        assert!(PageRequest::new(1, 100, 100).is_ok());
    }

    #[test]
    fn test_paginate_middle_page() {
        let req = PageRequest::new(2, 3, 100).unwrap();
        let page = req.paginate((1..=8).collect::<Vec<_>>());

        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 8);
        assert_eq!(page.pages, 3);
        assert!(page.has_next());
        assert!(page.has_prev());
    }

    #[test]
    fn test_paginate_past_the_end_is_empty() {
        let req = PageRequest::new(5, 10, 100).unwrap();
        let page = req.paginate(vec![1, 2, 3]);

        assert!(page.items.is_empty());
        assert_eq!(page.pages, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_empty_result_has_zero_pages() {
        let req = PageRequest::new(1, 10, 100).unwrap();
        let page = req.paginate(Vec::<u8>::new());
        assert_eq!(page.pages, 0);
        assert!(!page.has_prev());
    }
}
