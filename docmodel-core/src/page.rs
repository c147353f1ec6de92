//! Pagination over any countable, sliceable source.
//!
//! [`paginate`] combines a [`PaginationSource`] with caller-supplied limit and
//! page numbers and produces a [`Pagination`] result. The clamping rules are:
//!
//! - a limit outside `1..=MAX_LIMIT` becomes [`DEFAULT_LIMIT`];
//! - the page is clamped into `1..=all_pages`;
//! - an empty source yields no result at all.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::page::paginate;
//!
//! let source = model.pagination_source::<User>(Query::filtered(Filter::eq("active", true)));
//! let page = paginate(&source, 20, 2, |user: User| Some(user.email)).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// Largest page size a caller may request.
pub const MAX_LIMIT: i64 = 300;

/// Page size used when the requested one is out of range.
pub const DEFAULT_LIMIT: u64 = 100;

/// One page of mapped rows plus the numbers needed to navigate the rest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<R> {
    /// The rows on this page that the mapper accepted.
    pub rows: Vec<R>,
    /// Total number of items in the source.
    pub total: u64,
    /// Number of pages at this page size.
    pub all_pages: u64,
    /// The page returned, after clamping.
    pub page: u64,
    /// The page size used, after clamping.
    pub limit: u64,
}

/// A source that can be counted and read one page at a time.
#[async_trait]
pub trait PaginationSource: Send + Sync {
    type Item: Send;

    /// Total number of items.
    async fn count(&self) -> DocumentStoreResult<u64>;

    /// Reads page `page` (1-based) of size `limit` and maps each item.
    ///
    /// Items for which `mapper` returns `None` are dropped.
    async fn data<R: Send>(
        &self,
        limit: u64,
        page: u64,
        mapper: &(dyn Fn(Self::Item) -> Option<R> + Send + Sync),
    ) -> DocumentStoreResult<Vec<R>>;
}

/// Reads one clamped page from `source`.
///
/// Returns `Ok(None)` when the source is empty.
///
/// # Arguments
///
/// * `source` - Where items are counted and read from
/// * `limit` - Requested page size
/// * `page` - Requested page number (1-based)
/// * `mapper` - Converts each item into a row; `None` drops the item
pub async fn paginate<S, R, M>(
    source: &S,
    limit: i64,
    page: i64,
    mapper: M,
) -> DocumentStoreResult<Option<Pagination<R>>>
where
    S: PaginationSource,
    R: Send,
    M: Fn(S::Item) -> Option<R> + Send + Sync,
{
    let total = source.count().await?;
    if total == 0 {
        return Ok(None);
    }

    let limit = if (1..=MAX_LIMIT).contains(&limit) {
        limit as u64
    } else {
        DEFAULT_LIMIT
    };
    let all_pages = total.div_ceil(limit);
    let page = (page.max(1) as u64).min(all_pages);

    let rows = source.data(limit, page, &mapper).await?;

    Ok(Some(Pagination {
        rows,
        total,
        all_pages,
        page,
        limit,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Numbers(u64);

    #[async_trait]
    impl PaginationSource for Numbers {
        type Item = u64;

        async fn count(&self) -> DocumentStoreResult<u64> {
            Ok(self.0)
        }

        async fn data<R: Send>(
            &self,
            limit: u64,
            page: u64,
            mapper: &(dyn Fn(u64) -> Option<R> + Send + Sync),
        ) -> DocumentStoreResult<Vec<R>> {
            let start = limit * (page - 1);
            let end = (start + limit).min(self.0);
            Ok((start..end).filter_map(mapper).collect())
        }
    }

    #[tokio::test]
    async fn pages_are_counted_by_ceiling() {
        let result = paginate(&Numbers(250), 100, 1, Some).await.unwrap().unwrap();

        assert_eq!(result.total, 250);
        assert_eq!(result.all_pages, 3);
        assert_eq!(result.rows.len(), 100);
    }

    #[tokio::test]
    async fn page_past_the_end_is_clamped() {
        let result = paginate(&Numbers(250), 100, 10, Some).await.unwrap().unwrap();

        assert_eq!(result.page, 3);
        assert_eq!(result.rows, (200..250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn limit_out_of_range_falls_back_to_default() {
        for limit in [0, -1, MAX_LIMIT + 1] {
            let result = paginate(&Numbers(10), limit, 0, Some).await.unwrap().unwrap();
            assert_eq!(result.limit, DEFAULT_LIMIT);
            assert_eq!(result.page, 1);
        }

        let result = paginate(&Numbers(1000), MAX_LIMIT, 1, Some).await.unwrap().unwrap();
        assert_eq!(result.limit, 300);
    }

    #[tokio::test]
    async fn empty_source_has_no_pagination() {
        assert_eq!(paginate(&Numbers(0), 10, 1, Some).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_rows_are_dropped() {
        let result = paginate(&Numbers(10), 10, 1, |n| (n % 2 == 0).then(|| n * 10))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.rows, vec![0, 20, 40, 60, 80]);
        assert_eq!(result.total, 10);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let page = Pagination { rows: vec![1], total: 1, all_pages: 1, page: 1, limit: 100 };
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"rows": [1], "total": 1, "allPages": 1, "page": 1, "limit": 100})
        );
    }
}
