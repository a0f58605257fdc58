use std::future::Future;

use tracing::trace;

use super::{Page, Result};

/// Fetch every page of a list endpoint, in order
///
/// Pages are fetched sequentially, starting at page 1, until the page counter
/// reaches the number of pages reported by the server.
pub async fn fetch_all<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let result = fetch(page).await?;
        let total_pages = result.pagination.total_pages;
        trace!(page, total_pages, count = result.items.len(), "fetched page");

        items.extend(result.items);

        if page >= total_pages {
            break;
        }
        page += 1;
    }

    Ok(items)
}

/// Fetch pages until an item matches `predicate`
pub async fn find_first<T, F, Fut, P>(mut fetch: F, mut predicate: P) -> Result<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    P: FnMut(&T) -> bool,
{
    let mut page = 1;

    loop {
        let result = fetch(page).await?;
        let total_pages = result.pagination.total_pages;

        if let Some(item) = result.items.into_iter().find(|item| predicate(item)) {
            return Ok(Some(item));
        }

        if page >= total_pages {
            return Ok(None);
        }
        page += 1;
    }
}
