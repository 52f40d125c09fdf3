//! Lazy pagination over continuation-token APIs.
//!
//! Every remote listing in this system (accounts, parameters, workloads,
//! shares) follows the same shape: fetch a page, follow the continuation
//! token while one is present. [`paginate`] turns a page-fetching closure
//! into a stream of item batches so callers iterate without
//! pagination-specific code.

use futures::{Stream, TryStreamExt};
use std::future::Future;

/// One page of a remote listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    /// A final page with no continuation token.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Stream of item batches driven by continuation tokens.
///
/// `fetch` is called with `None` first, then with each returned token
/// until a page carries no token. Pages are fetched on demand, so
/// consumers that stop early never request the remaining pages.
pub fn paginate<T, E, F, Fut>(fetch: F) -> impl Stream<Item = std::result::Result<Vec<T>, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<Page<T>, E>>,
{
    // The token state is Some(token-to-send) while pages remain, None once
    // a page came back without a continuation token.
    futures::stream::try_unfold(
        (Some(None::<String>), fetch),
        |(state, mut fetch)| async move {
            let Some(token) = state else {
                return Ok(None);
            };
            let page = fetch(token).await?;
            let next_state = page.next_token.map(Some);
            Ok(Some((page.items, (next_state, fetch))))
        },
    )
}

/// Drain every page into one vector.
pub async fn collect_all<T, E, F, Fut>(fetch: F) -> std::result::Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<Page<T>, E>>,
{
    paginate(fetch).try_concat().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_all_spans_page_boundaries() {
        let fetch = |token: Option<String>| async move {
            Ok::<_, CoreError>(match token.as_deref() {
                None => Page::new(vec![1, 2], Some("t1".to_string())),
                Some("t1") => Page::new(vec![3], Some("t2".to_string())),
                Some("t2") => Page::last(vec![4, 5]),
                Some(other) => panic!("unexpected token {other}"),
            })
        };

        let all = collect_all(fetch).await.unwrap();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_single_page_listing() {
        let all: Vec<&str> =
            collect_all(|_| async { Ok::<_, CoreError>(Page::last(vec!["only"])) })
                .await
                .unwrap();
        assert_eq!(all, vec!["only"]);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let stream = paginate(move |token: Option<String>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = token;
                Ok::<_, CoreError>(Page::new(vec![0u8], Some("more".to_string())))
            }
        });
        futures::pin_mut!(stream);

        // Take one page and stop; no further fetches happen.
        let first = stream.try_next().await.unwrap();
        assert_eq!(first, Some(vec![0u8]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_surfaces() {
        let result: Result<Vec<u8>, CoreError> = collect_all(|_| async {
            Err(CoreError::ListAccounts("listing failed".to_string()))
        })
        .await;
        assert!(result.is_err());
    }
}
