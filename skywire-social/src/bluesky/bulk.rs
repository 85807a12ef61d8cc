//! Replays single operations over identifiers read from a line source.
//!
//! Lines are consumed until EOF. A read error on the source aborts the run
//! with [`BlueskyError::Input`]; what was already emitted stays emitted.
use serde_json::Value;
use skywire_common::output::ItemSink;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::bluesky::aturi::AtUri;
use crate::bluesky::client::BlueskyApi;
use crate::bluesky::error::{BlueskyError, Result};
use crate::bluesky::pager::drain_items;
use crate::bluesky::types::FeedParams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub requests: usize,
    pub items: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipReport {
    pub added: usize,
    pub failed: usize,
}

/// `"a, b,,c"` → `["a", "b", "c"]`
pub fn split_identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(str::trim).filter(|s| !s.is_empty())
}

async fn next_line<R>(lines: &mut tokio::io::Lines<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    lines
        .next_line()
        .await
        .map_err(|e| BlueskyError::Input(format!("reading input: {e}")))
}

/// Look up profiles in `batch_size` chunks as identifiers arrive.
///
/// A batch is sent as soon as it is full, so a long input never sits in
/// memory; the remainder goes out at EOF.
pub async fn profiles_bulk<R, S>(
    api: &BlueskyApi,
    reader: R,
    batch_size: usize,
    sink: &mut S,
) -> Result<BulkStats>
where
    R: AsyncBufRead + Unpin,
    S: ItemSink + ?Sized,
{
    if batch_size == 0 {
        return Err(BlueskyError::Input("batch size must be at least 1".into()));
    }
    let mut stats = BulkStats::default();
    let mut pending: Vec<String> = Vec::with_capacity(batch_size);
    let mut lines = reader.lines();

    while let Some(line) = next_line(&mut lines).await? {
        for id in split_identifiers(&line) {
            pending.push(id.to_owned());
            if pending.len() == batch_size {
                flush_profiles(api, &mut pending, sink, &mut stats).await?;
            }
        }
    }
    if !pending.is_empty() {
        flush_profiles(api, &mut pending, sink, &mut stats).await?;
    }
    tracing::info!(
        requests = stats.requests,
        items = stats.items,
        "bluesky.bulk.profiles.done"
    );
    Ok(stats)
}

async fn flush_profiles<S>(
    api: &BlueskyApi,
    pending: &mut Vec<String>,
    sink: &mut S,
    stats: &mut BulkStats,
) -> Result<()>
where
    S: ItemSink + ?Sized,
{
    let profiles = api.get_profiles(pending).await?;
    tracing::debug!(
        requested = pending.len(),
        returned = profiles.len(),
        "bluesky.bulk.profiles.batch"
    );
    pending.clear();
    stats.requests += 1;
    for p in &profiles {
        sink.emit(p)?;
        stats.items += 1;
    }
    Ok(())
}

/// One full feed traversal per non-blank line, strictly in input order.
pub async fn author_feeds_bulk<R, S>(
    api: &BlueskyApi,
    reader: R,
    params: &FeedParams,
    max_pages: Option<usize>,
    sink: &mut S,
) -> Result<BulkStats>
where
    R: AsyncBufRead + Unpin,
    S: ItemSink + ?Sized,
{
    let mut stats = BulkStats::default();
    let mut lines = reader.lines();
    while let Some(line) = next_line(&mut lines).await? {
        let actor = line.trim();
        if actor.is_empty() {
            continue;
        }
        let pages = api.author_feed_pages(actor, params, max_pages);
        let got = drain_items(pages, &mut *sink).await?;
        tracing::debug!(actor, pages = got.pages, items = got.items, "bluesky.bulk.feed");
        stats.requests += got.pages;
        stats.items += got.items;
    }
    Ok(stats)
}

/// A bare `did:...` or a JSON object carrying a string `did`, as printed by
/// `get-followers`.
pub fn parse_member_line(line: &str) -> Result<String> {
    let line = line.trim();
    if line.starts_with("did:") {
        return Ok(line.to_owned());
    }
    if line.starts_with('{') {
        let v: Value = serde_json::from_str(line)
            .map_err(|e| BlueskyError::Input(format!("member line is not JSON: {e}")))?;
        return match v.get("did").and_then(Value::as_str) {
            Some(did) if !did.is_empty() => Ok(did.to_owned()),
            _ => Err(BlueskyError::Input(
                "member object has no string `did`".into(),
            )),
        };
    }
    Err(BlueskyError::Input(format!(
        "expected a DID or a JSON object, got {line:?}"
    )))
}

/// Add every DID from `reader` to `list`. Bad lines and failed calls are
/// logged and counted; only a failure to read the source ends the run early.
pub async fn add_list_members_bulk<R, S>(
    api: &BlueskyApi,
    reader: R,
    list: &AtUri,
    sink: &mut S,
) -> Result<MembershipReport>
where
    R: AsyncBufRead + Unpin,
    S: ItemSink + ?Sized,
{
    let mut report = MembershipReport::default();
    let mut lines = reader.lines();
    let mut lineno = 0usize;

    while let Some(line) = next_line(&mut lines).await? {
        lineno += 1;
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match parse_member_line(&line) {
            Ok(did) => api.add_list_member(list, &did).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(resp) => {
                let v = serde_json::to_value(&resp)
                    .map_err(|e| BlueskyError::Shape(e.to_string()))?;
                sink.emit(&v)?;
                report.added += 1;
            }
            Err(e) => {
                tracing::warn!(line = lineno, error = %e, "bluesky.bulk.member_skipped");
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        list = %list,
        added = report.added,
        failed = report.failed,
        "bluesky.bulk.members.done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_split_on_commas() {
        let ids: Vec<&str> = split_identifiers(" alice.test, bob.test,, ,carol.test ").collect();
        assert_eq!(ids, ["alice.test", "bob.test", "carol.test"]);
        assert_eq!(split_identifiers("   ").count(), 0);
    }

    #[tokio::test]
    async fn unreadable_input_is_an_input_error() {
        let input: &[u8] = b"alice.test\n\xff\xfe\n";
        let mut lines = input.lines();
        assert_eq!(next_line(&mut lines).await.unwrap().as_deref(), Some("alice.test"));
        assert!(matches!(next_line(&mut lines).await, Err(BlueskyError::Input(_))));
    }

    #[test]
    fn member_lines() {
        assert_eq!(parse_member_line("did:plc:abc\n").unwrap(), "did:plc:abc");
        assert_eq!(
            parse_member_line(r#"{"did":"did:plc:xyz","handle":"x.test"}"#).unwrap(),
            "did:plc:xyz"
        );
        assert!(matches!(
            parse_member_line(r#"{"did": 7}"#),
            Err(BlueskyError::Input(_))
        ));
        assert!(matches!(
            parse_member_line("alice.test"),
            Err(BlueskyError::Input(_))
        ));
        assert!(parse_member_line("{not json").is_err());
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let api = BlueskyApi::new("http://127.0.0.1:9").unwrap();
        let mut out: Vec<Value> = Vec::new();
        let err = profiles_bulk(&api, &b"a\n"[..], 0, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, BlueskyError::Input(_)));
    }
}
