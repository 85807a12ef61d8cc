//! AT-URI handling and list URL parsing.
//!
//! The web app addresses a list as `https://<host>/profile/<actor>/lists/<rkey>`;
//! the repo API wants `at://<did>/app.bsky.graph.list/<rkey>`. Turning the first
//! into the second needs the actor's DID, which only a profile lookup can give
//! (see [`BlueskyApi::resolve_list_url`](crate::bluesky::BlueskyApi::resolve_list_url)).
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::bluesky::error::{BlueskyError, Result};
use crate::bluesky::types::GRAPH_LIST;

const SCHEME: &str = "at://";

/// `at://<authority>/<collection>/<rkey>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtUri {
    authority: String,
    collection: String,
    rkey: String,
}

impl AtUri {
    pub fn new(
        authority: impl Into<String>,
        collection: impl Into<String>,
        rkey: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }

    pub fn list(did: impl Into<String>, rkey: impl Into<String>) -> Self {
        Self::new(did, GRAPH_LIST, rkey)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn rkey(&self) -> &str {
        &self.rkey
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = BlueskyError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .trim()
            .strip_prefix(SCHEME)
            .ok_or_else(|| BlueskyError::Input(format!("not an at:// URI: {s}")))?;
        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        match parts.as_slice() {
            [authority, collection, rkey]
                if !authority.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(AtUri::new(*authority, *collection, *rkey))
            }
            _ => Err(BlueskyError::Input(format!(
                "expected at://<authority>/<collection>/<rkey>, got {s}"
            ))),
        }
    }
}

/// The two pieces of a web list URL that matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUrl {
    /// Handle or DID as it appears in the URL.
    pub actor: String,
    pub rkey: String,
}

pub fn parse_list_url(raw: &str) -> Result<ListUrl> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BlueskyError::Input(format!("invalid list URL {raw}: {e}")))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["profile", actor, "lists", rkey] => Ok(ListUrl {
            actor: (*actor).to_string(),
            rkey: (*rkey).to_string(),
        }),
        _ => Err(BlueskyError::Input(format!(
            "expected /profile/<actor>/lists/<rkey>, got {}",
            url.path()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_url_parts() {
        let l = parse_list_url("https://example.test/profile/alice.test/lists/3k2j").unwrap();
        assert_eq!(l.actor, "alice.test");
        assert_eq!(l.rkey, "3k2j");

        let l = parse_list_url("https://bsky.app/profile/did:plc:abc123/lists/3k2j/").unwrap();
        assert_eq!(l.actor, "did:plc:abc123");
    }

    #[test]
    fn list_url_rejects_other_paths() {
        assert!(parse_list_url("https://bsky.app/profile/alice.test").is_err());
        assert!(parse_list_url("https://bsky.app/profile/alice.test/post/3k2j").is_err());
        assert!(parse_list_url("not a url").is_err());
    }

    #[test]
    fn at_uri_display_and_parse_agree() {
        let uri = AtUri::list("did:plc:abc123", "3k2j");
        let text = uri.to_string();
        assert_eq!(text, "at://did:plc:abc123/app.bsky.graph.list/3k2j");
        assert_eq!(text.parse::<AtUri>().unwrap(), uri);
    }

    #[test]
    fn at_uri_rejects_partial_paths() {
        assert!("at://did:plc:abc123".parse::<AtUri>().is_err());
        assert!("at://did:plc:abc123/app.bsky.graph.list/".parse::<AtUri>().is_err());
        assert!("https://x/y/z".parse::<AtUri>().is_err());
    }
}
