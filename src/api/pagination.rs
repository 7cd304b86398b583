use serde::Serialize;

use super::ApiError;
use super::validation::invalid_page;
use crate::domain::Page;

/// Page envelope returned by list endpoints.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Builds the envelope, with `next`/`previous` relative to `path`.
    ///
    /// A page past the end is an error; the first page is always valid,
    /// even when empty.
    pub fn from_page<U>(page: Page<U>, path: &str) -> Result<Self, ApiError>
    where
        T: From<U>,
    {
        let request = page.request;
        if request.page > 1 && page.items.is_empty() {
            return Err(invalid_page());
        }

        let link = |n: u64| format!("{path}?page={n}&page_size={}", request.page_size);
        let next = page.has_next().then(|| link(request.page + 1));
        let previous = page.has_previous().then(|| link(request.page - 1));

        Ok(Self {
            count: page.total,
            next,
            previous,
            results: page.items.into_iter().map(T::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PageRequest;

    fn page(items: Vec<i32>, total: u64, page: u64, page_size: u64) -> Page<i32> {
        Page {
            items,
            total,
            request: PageRequest { page, page_size },
        }
    }

    #[test]
    fn test_links() {
        let p: Paginated<i64> = Paginated::from_page(page(vec![3, 4], 5, 2, 2), "/courses/").unwrap();
        assert_eq!(p.count, 5);
        assert_eq!(p.next.as_deref(), Some("/courses/?page=3&page_size=2"));
        assert_eq!(p.previous.as_deref(), Some("/courses/?page=1&page_size=2"));
        assert_eq!(p.results, vec![3, 4]);
    }

    #[test]
    fn test_first_page_may_be_empty() {
        let p: Paginated<i64> = Paginated::from_page(page(vec![], 0, 1, 10), "/lessons/").unwrap();
        assert_eq!(p.count, 0);
        assert!(p.next.is_none());
        assert!(p.previous.is_none());
    }

    #[test]
    fn test_page_past_end_is_invalid() {
        let result: Result<Paginated<i64>, _> =
            Paginated::from_page(page(vec![], 3, 5, 10), "/lessons/");
        assert!(matches!(result, Err(ApiError::NotFound(msg)) if msg == "Invalid page."));
    }
}
