//! Cursor-following page streams.
//!
//! A traversal is a lazy [`PageStream`]: nothing is requested until the stream
//! is polled, each poll issues at most one request, and the cursor from page
//! `n` is passed verbatim to the request for page `n + 1`. The stream ends when
//! the server omits the cursor, sends an empty one, or the page limit is hit.
//! It cannot be restarted; build a new one to re-issue the first request.
use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use skywire_common::output::ItemSink;

use crate::bluesky::error::Result;
use crate::bluesky::types::PagedResult;

pub type PageStream<'a> = Pin<Box<dyn Stream<Item = Result<PagedResult>> + 'a>>;

/// Follow cursors from `fetch` until the server runs out of pages.
///
/// `max_pages` of `None` means no limit.
pub fn paginate<'a, F, Fut>(fetch: F, max_pages: Option<usize>) -> PageStream<'a>
where
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<PagedResult>> + 'a,
{
    Box::pin(page_stream(fetch, max_pages))
}

fn page_stream<'a, F, Fut>(
    mut fetch: F,
    max_pages: Option<usize>,
) -> impl Stream<Item = Result<PagedResult>> + 'a
where
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<PagedResult>> + 'a,
{
    async_stream::try_stream! {
        let mut cursor: Option<String> = None;
        let mut fetched = 0usize;
        loop {
            if max_pages.is_some_and(|max| fetched >= max) {
                tracing::debug!(pages = fetched, "bluesky.pager.page_limit");
                break;
            }
            let page: PagedResult = fetch(cursor.take()).await?;
            fetched += 1;
            let next = page.next_cursor().map(str::to_owned);
            tracing::debug!(
                page = fetched,
                items = page.items.len(),
                has_more = next.is_some(),
                "bluesky.pager.page"
            );
            yield page;
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub pages: usize,
    pub items: usize,
}

/// Emit every item of every page into `sink`, one page at a time.
///
/// Items of a page are written before the next page is requested, so output
/// produced before an error stays intact.
pub async fn drain_items<S>(mut pages: PageStream<'_>, sink: &mut S) -> Result<PageStats>
where
    S: ItemSink + ?Sized,
{
    let mut stats = PageStats::default();
    while let Some(page) = pages.next().await {
        let page = page?;
        stats.pages += 1;
        for item in &page.items {
            sink.emit(item)?;
            stats.items += 1;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluesky::error::BlueskyError;
    use serde_json::{Value, json};
    use std::cell::RefCell;

    /// Serves `total` numbered items in pages of `size`, recording every cursor it sees.
    fn numbered(
        total: usize,
        size: usize,
        seen: &RefCell<Vec<Option<String>>>,
    ) -> impl FnMut(Option<String>) -> std::future::Ready<Result<PagedResult>> + '_ {
        move |cursor| {
            seen.borrow_mut().push(cursor.clone());
            let start: usize = cursor.as_deref().map_or(0, |c| c.parse().unwrap());
            let end = (start + size).min(total);
            let items = (start..end).map(|i| json!(i)).collect();
            let cursor = (end < total).then(|| end.to_string());
            std::future::ready(Ok(PagedResult { items, cursor }))
        }
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let seen = RefCell::new(Vec::new());
        let mut out: Vec<Value> = Vec::new();
        let stats = drain_items(paginate(numbered(250, 100, &seen), None), &mut out)
            .await
            .unwrap();

        assert_eq!(stats, PageStats { pages: 3, items: 250 });
        assert_eq!(out.first(), Some(&json!(0)));
        assert_eq!(out.last(), Some(&json!(249)));
        assert_eq!(
            *seen.borrow(),
            vec![None, Some("100".to_string()), Some("200".to_string())]
        );
    }

    #[tokio::test]
    async fn exact_multiple_needs_no_extra_request() {
        let seen = RefCell::new(Vec::new());
        let mut out: Vec<Value> = Vec::new();
        let stats = drain_items(paginate(numbered(200, 100, &seen), None), &mut out)
            .await
            .unwrap();
        assert_eq!(stats.pages, 2);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let seen = RefCell::new(Vec::new());
        let mut out: Vec<Value> = Vec::new();
        let stats = drain_items(paginate(numbered(1000, 10, &seen), Some(2)), &mut out)
            .await
            .unwrap();
        assert_eq!(stats, PageStats { pages: 2, items: 20 });
        assert_eq!(seen.borrow().len(), 2);
    }

    #[tokio::test]
    async fn empty_cursor_terminates() {
        let calls = RefCell::new(0usize);
        let fetch = |_cursor: Option<String>| {
            *calls.borrow_mut() += 1;
            std::future::ready(Ok(PagedResult {
                items: vec![json!("only")],
                cursor: Some(String::new()),
            }))
        };
        let mut out: Vec<Value> = Vec::new();
        drain_items(paginate(fetch, None), &mut out).await.unwrap();
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(out, vec![json!("only")]);
    }

    #[tokio::test]
    async fn error_keeps_earlier_items_and_stops() {
        let calls = RefCell::new(0usize);
        let fetch = |_cursor: Option<String>| {
            let n = {
                let mut c = calls.borrow_mut();
                *c += 1;
                *c
            };
            std::future::ready(if n == 1 {
                Ok(PagedResult {
                    items: vec![json!(1)],
                    cursor: Some("next".into()),
                })
            } else {
                Err(BlueskyError::Transport("boom".into()))
            })
        };
        let mut out: Vec<Value> = Vec::new();
        let err = drain_items(paginate(fetch, None), &mut out).await.unwrap_err();
        assert!(matches!(err, BlueskyError::Transport(_)));
        assert_eq!(out, vec![json!(1)]);
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn stream_is_lazy() {
        let calls = RefCell::new(0usize);
        let fetch = |_cursor: Option<String>| {
            *calls.borrow_mut() += 1;
            std::future::ready(Ok(PagedResult::default()))
        };
        let stream = paginate(fetch, None);
        assert_eq!(*calls.borrow(), 0);
        drop(stream);
    }
}
