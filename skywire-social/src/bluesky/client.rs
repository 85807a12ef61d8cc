//! Authenticated Bluesky XRPC operations.
//!
//! Every operation is one request, decoded into the endpoint's response type.
//! Nothing is retried or cached. Operations that need a session fail with
//! [`BlueskyError::Authentication`] before touching the network when none is held.
use std::borrow::Cow;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use skywire_config::SkywireConfig;
use skywire_http::{Auth, HttpClient, HttpMethod, RequestOpts};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::bluesky::aturi::{AtUri, parse_list_url};
use crate::bluesky::error::{BlueskyError, Result};
use crate::bluesky::pager::{PageStream, paginate};
use crate::bluesky::types::{
    AuthorFeedPage, CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, FEED_POST,
    FeedParams, FollowersPage, FollowsPage, GRAPH_LIST, GRAPH_LISTITEM, ListItemRecord,
    ListPurpose, ListRecord, PagedResult, PostRecord, Profile, ProfilesResponse, SearchParams,
    SearchPostsPage, Session,
};

const CREATE_SESSION: &str = "xrpc/com.atproto.server.createSession";
const REFRESH_SESSION: &str = "xrpc/com.atproto.server.refreshSession";
const CREATE_RECORD: &str = "xrpc/com.atproto.repo.createRecord";
const GET_AUTHOR_FEED: &str = "xrpc/app.bsky.feed.getAuthorFeed";
const GET_PROFILE: &str = "xrpc/app.bsky.actor.getProfile";
const GET_PROFILES: &str = "xrpc/app.bsky.actor.getProfiles";
const GET_FOLLOWERS: &str = "xrpc/app.bsky.graph.getFollowers";
const GET_FOLLOWS: &str = "xrpc/app.bsky.graph.getFollows";
const SEARCH_POSTS: &str = "xrpc/app.bsky.feed.searchPosts";

type Query<'a> = Vec<(&'a str, Cow<'a, str>)>;

#[derive(Clone)]
pub struct BlueskyApi {
    http: HttpClient,
    session: Option<Session>,
}

impl BlueskyApi {
    pub fn new(host: &str) -> Result<Self> {
        let http = HttpClient::new(host)?;
        Ok(Self {
            http,
            session: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Unauthenticated client pointed at `cfg.pds_host`.
    pub fn from_config(cfg: &SkywireConfig) -> Result<Self> {
        Ok(Self::new(&cfg.pds_host)?.with_timeout(cfg.timeout()))
    }

    /// Client with a fresh session for the configured credentials.
    pub async fn connect(cfg: &SkywireConfig) -> Result<Self> {
        let (identifier, password) = cfg
            .credentials()
            .map_err(|e| BlueskyError::Authentication(e.to_string()))?;
        let mut api = Self::from_config(cfg)?;
        api.create_session(identifier, password).await?;
        Ok(api)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub async fn create_session(&mut self, identifier: &str, password: &str) -> Result<&Session> {
        let body = CreateSessionRequest {
            identifier,
            password,
        };
        let session: Session = self
            .http
            .post_json(CREATE_SESSION, None, &body)
            .await
            .map_err(|e| {
                tracing::warn!(identifier, error = %e, "bluesky.session.failed");
                BlueskyError::Authentication(e.to_string())
            })?;
        self.store_session(session, "bluesky.session.created")
    }

    /// Swap the held session for one minted from its refresh token.
    pub async fn refresh_session(&mut self) -> Result<&Session> {
        let refresh = self
            .session
            .as_ref()
            .map(|s| s.refresh_jwt.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BlueskyError::Authentication("no refresh token".into()))?;
        let opts = RequestOpts {
            auth: Some(Auth::Bearer(&refresh)),
            ..Default::default()
        };
        let bytes = self
            .http
            .request_bytes::<()>(HttpMethod::POST, REFRESH_SESSION, None, opts)
            .await
            .map_err(|e| BlueskyError::Authentication(e.to_string()))?;
        let session: Session = serde_json::from_slice(&bytes)
            .map_err(|e| BlueskyError::Authentication(format!("refresh response: {e}")))?;
        self.store_session(session, "bluesky.session.refreshed")
    }

    fn store_session(&mut self, session: Session, event: &'static str) -> Result<&Session> {
        if session.access_jwt.trim().is_empty() {
            return Err(BlueskyError::Authentication(
                "server returned an empty access token".into(),
            ));
        }
        tracing::info!(did = %session.did, handle = %session.handle, event);
        Ok(&*self.session.insert(session))
    }

    fn access_token(&self) -> Result<&str> {
        self.session
            .as_ref()
            .map(|s| s.access_jwt.as_str())
            .ok_or_else(|| BlueskyError::Authentication("no active session".into()))
    }

    fn session_did(&self) -> Result<&str> {
        self.session
            .as_ref()
            .map(|s| s.did.as_str())
            .ok_or_else(|| BlueskyError::Authentication("no active session".into()))
    }

    async fn get<'q, T: DeserializeOwned>(&self, path: &str, query: Query<'q>) -> Result<T> {
        let opts = RequestOpts {
            auth: Some(Auth::Bearer(self.access_token()?)),
            query: Some(query),
            ..Default::default()
        };
        Ok(self.http.get_json(path, opts).await?)
    }

    pub async fn get_author_feed(
        &self,
        actor: &str,
        params: &FeedParams,
        cursor: Option<&str>,
    ) -> Result<PagedResult> {
        let mut query: Query<'_> = vec![
            ("actor", Cow::Borrowed(actor)),
            ("limit", Cow::Owned(params.limit.to_string())),
            ("includePins", Cow::Borrowed(bool_str(params.include_pins))),
        ];
        if let Some(filter) = params.filter.as_deref() {
            query.push(("filter", Cow::Borrowed(filter)));
        }
        push_cursor(&mut query, cursor);
        let page: AuthorFeedPage = self.get(GET_AUTHOR_FEED, query).await?;
        Ok(page.into())
    }

    pub async fn get_profile(&self, actor: &str) -> Result<Profile> {
        self.get(GET_PROFILE, vec![("actor", Cow::Borrowed(actor))])
            .await
    }

    /// One `getProfiles` call; the server caps `actors` at 25.
    pub async fn get_profiles(&self, actors: &[String]) -> Result<Vec<Value>> {
        if actors.is_empty() {
            return Ok(Vec::new());
        }
        let query: Query<'_> = actors
            .iter()
            .map(|a| ("actors", Cow::Borrowed(a.as_str())))
            .collect();
        let resp: ProfilesResponse = self.get(GET_PROFILES, query).await?;
        Ok(resp.profiles)
    }

    /// `limit` of 0 leaves the page size to the server.
    pub async fn get_followers(
        &self,
        actor: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<PagedResult> {
        let query = graph_query(actor, limit, cursor);
        let page: FollowersPage = self.get(GET_FOLLOWERS, query).await?;
        Ok(page.into())
    }

    pub async fn get_follows(
        &self,
        actor: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<PagedResult> {
        let query = graph_query(actor, limit, cursor);
        let page: FollowsPage = self.get(GET_FOLLOWS, query).await?;
        Ok(page.into())
    }

    pub async fn search_posts(
        &self,
        params: &SearchParams,
        cursor: Option<&str>,
    ) -> Result<PagedResult> {
        let mut query: Query<'_> = vec![
            ("q", Cow::Borrowed(params.q.as_str())),
            ("limit", Cow::Owned(params.limit.to_string())),
        ];
        if let Some(sort) = params.sort {
            query.push(("sort", Cow::Borrowed(sort.as_str())));
        }
        if let Some(author) = params.author.as_deref() {
            query.push(("author", Cow::Borrowed(author)));
        }
        if let Some(lang) = params.lang.as_deref() {
            query.push(("lang", Cow::Borrowed(lang)));
        }
        push_cursor(&mut query, cursor);
        let page: SearchPostsPage = self.get(SEARCH_POSTS, query).await?;
        if let Some(total) = page.hits_total {
            tracing::debug!(hits_total = total, "bluesky.search.hits");
        }
        Ok(page.into())
    }

    /// Sent once; a failure here may still have created the record server-side.
    pub async fn create_record(&self, req: &CreateRecordRequest) -> Result<CreateRecordResponse> {
        let opts = RequestOpts {
            auth: Some(Auth::Bearer(self.access_token()?)),
            ..Default::default()
        };
        let resp: CreateRecordResponse = self.http.post_json_opts(CREATE_RECORD, req, opts).await?;
        tracing::info!(collection = %req.collection, uri = %resp.uri, "bluesky.record.created");
        Ok(resp)
    }

    pub async fn create_post(&self, text: &str) -> Result<CreateRecordResponse> {
        let record = PostRecord {
            kind: FEED_POST,
            text,
            created_at: now_rfc3339()?,
        };
        self.create_owned_record(FEED_POST, to_value(&record)?)
            .await
    }

    pub async fn create_list(
        &self,
        name: &str,
        purpose: ListPurpose,
        description: Option<&str>,
    ) -> Result<CreateRecordResponse> {
        let record = ListRecord {
            kind: GRAPH_LIST,
            purpose: purpose.as_token(),
            name,
            description,
            created_at: now_rfc3339()?,
        };
        self.create_owned_record(GRAPH_LIST, to_value(&record)?)
            .await
    }

    pub async fn add_list_member(&self, list: &AtUri, subject: &str) -> Result<CreateRecordResponse> {
        let record = ListItemRecord {
            kind: GRAPH_LISTITEM,
            subject,
            list: list.to_string(),
            created_at: now_rfc3339()?,
        };
        self.create_owned_record(GRAPH_LISTITEM, to_value(&record)?)
            .await
    }

    async fn create_owned_record(
        &self,
        collection: &str,
        record: Value,
    ) -> Result<CreateRecordResponse> {
        let req = CreateRecordRequest::new(self.session_did()?, collection, record);
        self.create_record(&req).await
    }

    /// Turn a web list URL into its AT-URI. An `at://` input must name a list
    /// record and is returned as-is; anything else costs one profile lookup.
    pub async fn resolve_list_url(&self, raw: &str) -> Result<AtUri> {
        if raw.trim_start().starts_with("at://") {
            let uri: AtUri = raw.parse()?;
            if uri.collection() != GRAPH_LIST {
                return Err(BlueskyError::Input(format!(
                    "{uri} is not a list (collection {})",
                    uri.collection()
                )));
            }
            return Ok(uri);
        }
        let parts = parse_list_url(raw)?;
        let did = if parts.actor.starts_with("did:") {
            parts.actor.clone()
        } else {
            self.get_profile(&parts.actor).await?.did
        };
        let uri = AtUri::list(did, parts.rkey);
        tracing::debug!(url = raw, uri = %uri, "bluesky.list.resolved");
        Ok(uri)
    }

    pub fn author_feed_pages<'a>(
        &'a self,
        actor: &'a str,
        params: &'a FeedParams,
        max_pages: Option<usize>,
    ) -> PageStream<'a> {
        paginate(
            move |cursor: Option<String>| async move {
                self.get_author_feed(actor, params, cursor.as_deref()).await
            },
            max_pages,
        )
    }

    pub fn follower_pages<'a>(
        &'a self,
        actor: &'a str,
        limit: u32,
        max_pages: Option<usize>,
    ) -> PageStream<'a> {
        paginate(
            move |cursor: Option<String>| async move {
                self.get_followers(actor, limit, cursor.as_deref()).await
            },
            max_pages,
        )
    }

    pub fn follow_pages<'a>(
        &'a self,
        actor: &'a str,
        limit: u32,
        max_pages: Option<usize>,
    ) -> PageStream<'a> {
        paginate(
            move |cursor: Option<String>| async move {
                self.get_follows(actor, limit, cursor.as_deref()).await
            },
            max_pages,
        )
    }

    pub fn search_pages<'a>(
        &'a self,
        params: &'a SearchParams,
        max_pages: Option<usize>,
    ) -> PageStream<'a> {
        paginate(
            move |cursor: Option<String>| async move {
                self.search_posts(params, cursor.as_deref()).await
            },
            max_pages,
        )
    }
}

fn graph_query<'a>(actor: &'a str, limit: u32, cursor: Option<&'a str>) -> Query<'a> {
    let mut query: Query<'a> = vec![("actor", Cow::Borrowed(actor))];
    if limit > 0 {
        query.push(("limit", Cow::Owned(limit.to_string())));
    }
    push_cursor(&mut query, cursor);
    query
}

fn push_cursor<'a>(query: &mut Query<'a>, cursor: Option<&'a str>) {
    if let Some(c) = cursor.filter(|c| !c.is_empty()) {
        query.push(("cursor", Cow::Borrowed(c)));
    }
}

fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| BlueskyError::Input(format!("timestamp: {e}")))
}

fn to_value<T: serde::Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| BlueskyError::Input(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_query_omits_zero_limit_and_empty_cursor() {
        let q = graph_query("alice.test", 0, Some(""));
        assert_eq!(q, vec![("actor", Cow::Borrowed("alice.test"))]);

        let q = graph_query("alice.test", 50, Some("c1"));
        let keys: Vec<&str> = q.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["actor", "limit", "cursor"]);
        assert_eq!(q[1].1, "50");
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let ts = now_rfc3339().unwrap();
        assert!(OffsetDateTime::parse(&ts, &Rfc3339).is_ok());
    }

    #[tokio::test]
    async fn data_calls_need_a_session() {
        let api = BlueskyApi::new("http://127.0.0.1:9").unwrap();
        let err = api.get_profile("alice.test").await.unwrap_err();
        assert!(matches!(err, BlueskyError::Authentication(_)));
        let err = api.create_post("hi").await.unwrap_err();
        assert!(matches!(err, BlueskyError::Authentication(_)));
    }
}
