use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::bluesky::error::BlueskyError;

pub const FEED_POST: &str = "app.bsky.feed.post";
pub const GRAPH_LIST: &str = "app.bsky.graph.list";
pub const GRAPH_LISTITEM: &str = "app.bsky.graph.listitem";

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Authenticated account context returned by `createSession` / `refreshSession`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed: Option<bool>,
    #[serde(default)]
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_doc: Option<Value>,
}

fn default_active() -> bool {
    true
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("active", &self.active)
            .field("access_jwt", &"<redacted>")
            .field("refresh_jwt", &"<redacted>")
            .finish()
    }
}

/// One page of a cursor-paged endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagedResult {
    pub items: Vec<Value>,
    pub cursor: Option<String>,
}

impl PagedResult {
    /// The cursor to send next, if the server signalled more data.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorFeedPage {
    #[serde(default)]
    pub feed: Vec<Value>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowersPage {
    #[serde(default)]
    pub followers: Vec<Value>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowsPage {
    #[serde(default)]
    pub follows: Vec<Value>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPostsPage {
    #[serde(default)]
    pub posts: Vec<Value>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub hits_total: Option<u64>,
}

macro_rules! impl_paged {
    ($ty:ty, $field:ident) => {
        impl From<$ty> for PagedResult {
            fn from(page: $ty) -> Self {
                PagedResult {
                    items: page.$field,
                    cursor: page.cursor,
                }
            }
        }
    };
}

impl_paged!(AuthorFeedPage, feed);
impl_paged!(FollowersPage, followers);
impl_paged!(FollowsPage, follows);
impl_paged!(SearchPostsPage, posts);

/// `getProfiles` is not paged and the list is required.
#[derive(Debug, Deserialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<Value>,
}

/// Profile document; only `did` is required, everything else passes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub repo: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<bool>,
    pub record: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_commit: Option<String>,
}

impl CreateRecordRequest {
    pub fn new(repo: impl Into<String>, collection: impl Into<String>, record: Value) -> Self {
        Self {
            repo: repo.into(),
            collection: collection.into(),
            rkey: None,
            validate: None,
            record,
            swap_commit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordResponse {
    pub uri: String,
    pub cid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub purpose: &'static str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemRecord<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub subject: &'a str,
    pub list: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPurpose {
    #[default]
    Curate,
    Moderation,
    Reference,
}

impl ListPurpose {
    pub fn as_token(self) -> &'static str {
        match self {
            ListPurpose::Curate => "app.bsky.graph.defs#curatelist",
            ListPurpose::Moderation => "app.bsky.graph.defs#modlist",
            ListPurpose::Reference => "app.bsky.graph.defs#referencelist",
        }
    }
}

impl FromStr for ListPurpose {
    type Err = BlueskyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "curate" | "curatelist" => Ok(ListPurpose::Curate),
            "mod" | "moderation" | "modlist" => Ok(ListPurpose::Moderation),
            "reference" | "referencelist" => Ok(ListPurpose::Reference),
            other => Err(BlueskyError::Input(format!("unknown list purpose: {other}"))),
        }
    }
}

/// Fixed parameters for one author-feed traversal.
#[derive(Debug, Clone)]
pub struct FeedParams {
    pub limit: u32,
    pub filter: Option<String>,
    pub include_pins: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    Top,
    Latest,
}

impl SearchSort {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchSort::Top => "top",
            SearchSort::Latest => "latest",
        }
    }
}

/// Fixed parameters for one `searchPosts` traversal.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub q: String,
    pub limit: u32,
    pub sort: Option<SearchSort>,
    pub author: Option<String>,
    pub lang: Option<String>,
}

impl SearchParams {
    pub fn new(q: impl Into<String>, limit: u32) -> Self {
        Self {
            q: q.into(),
            limit,
            sort: None,
            author: None,
            lang: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_debug_hides_tokens() {
        let s: Session = serde_json::from_value(json!({
            "did": "did:plc:abc123",
            "handle": "alice.test",
            "accessJwt": "aaa.bbb.ccc",
            "refreshJwt": "ddd.eee.fff"
        }))
        .unwrap();
        assert!(s.active);
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("aaa.bbb.ccc"));
        assert!(!dbg.contains("ddd.eee.fff"));
    }

    #[test]
    fn create_record_omits_unset_optionals() {
        let req = CreateRecordRequest::new("did:plc:abc123", FEED_POST, json!({"text": "hi"}));
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "repo": "did:plc:abc123",
                "collection": "app.bsky.feed.post",
                "record": {"text": "hi"}
            })
        );

        let req = CreateRecordRequest {
            rkey: Some("3k2j".into()),
            validate: Some(true),
            swap_commit: Some("bafy".into()),
            ..req
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["swapCommit"], json!("bafy"));
        assert_eq!(v["rkey"], json!("3k2j"));
        assert_eq!(v["validate"], json!(true));
    }

    #[test]
    fn missing_list_field_is_an_empty_page() {
        let page: FollowersPage = serde_json::from_value(json!({"cursor": "c1"})).unwrap();
        let page = PagedResult::from(page);
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor(), Some("c1"));
    }

    #[test]
    fn mistyped_list_field_is_rejected() {
        let res = serde_json::from_value::<AuthorFeedPage>(json!({"feed": "nope"}));
        assert!(res.is_err());
    }

    #[test]
    fn empty_cursor_means_no_next_page() {
        let page = PagedResult {
            items: vec![],
            cursor: Some(String::new()),
        };
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn profile_requires_string_did() {
        assert!(serde_json::from_value::<Profile>(json!({"did": 42})).is_err());
        let p: Profile =
            serde_json::from_value(json!({"did": "did:plc:x", "displayName": "X"})).unwrap();
        assert_eq!(p.extra["displayName"], json!("X"));
    }

    #[test]
    fn list_purpose_parsing() {
        assert_eq!("modlist".parse::<ListPurpose>().unwrap(), ListPurpose::Moderation);
        assert_eq!(
            ListPurpose::Curate.as_token(),
            "app.bsky.graph.defs#curatelist"
        );
        assert!("bogus".parse::<ListPurpose>().is_err());
    }
}
