use std::io::{self, Write};

use anyhow::{Context, Result};
use serde_json::Value;
use skywire_common::output::{JsonLines, OutputStyle};
use skywire_config::SkywireConfig;
use skywire_social::bluesky::bulk::{
    add_list_members_bulk, author_feeds_bulk, profiles_bulk, split_identifiers,
};
use skywire_social::bluesky::types::{FeedParams, ListPurpose, SearchParams, SearchSort};
use skywire_social::bluesky::{BlueskyApi, PagedResult, Session, drain_items};
use skywire_store::Store;
use tokio::io::BufReader;

use crate::cli::{BsCommand, DbArgs, DbCommand, FeedArgs, PurposeArg, SortArg};

fn stdout_lines() -> JsonLines<io::StdoutLock<'static>> {
    JsonLines::new(io::stdout().lock())
}

fn stdout_pretty() -> JsonLines<io::StdoutLock<'static>> {
    JsonLines::with_style(io::stdout().lock(), OutputStyle::Pretty)
}

fn feed_params(cfg: &SkywireConfig, args: &FeedArgs) -> FeedParams {
    FeedParams {
        limit: cfg.page_size,
        filter: Some(args.filter.clone().unwrap_or_else(|| cfg.feed_filter.clone()))
            .filter(|f| !f.is_empty()),
        include_pins: cfg.include_pins,
    }
}

fn session_json(session: &Session, show_tokens: bool) -> Result<Value> {
    let mut v = serde_json::to_value(session)?;
    if !show_tokens {
        if let Some(obj) = v.as_object_mut() {
            obj.remove("accessJwt");
            obj.remove("refreshJwt");
        }
    }
    Ok(v)
}

fn page_json(page: &PagedResult) -> Value {
    serde_json::json!({ "items": page.items, "cursor": page.cursor })
}

pub async fn run_bs(cfg: &SkywireConfig, cmd: BsCommand) -> Result<()> {
    let mut api = BlueskyApi::connect(cfg).await?;
    let stdin = || BufReader::new(tokio::io::stdin());

    match cmd {
        BsCommand::CreateSession { show_tokens } => {
            let session = api.session().context("no session after login")?;
            stdout_pretty().write(&session_json(session, show_tokens)?)?;
        }
        BsCommand::RefreshSession { show_tokens } => {
            let session = api.refresh_session().await?;
            stdout_pretty().write(&session_json(session, show_tokens)?)?;
        }
        BsCommand::GetAuthorFeed { author, feed } => {
            let params = feed_params(cfg, &feed);
            let page = api.get_author_feed(&author, &params, None).await?;
            stdout_pretty().write(&page_json(&page))?;
        }
        BsCommand::GetAuthorFeeds {
            author,
            feed,
            pages,
        } => {
            let params = feed_params(cfg, &feed);
            let stream = api.author_feed_pages(&author, &params, pages.limit());
            let stats = drain_items(stream, &mut stdout_lines()).await?;
            tracing::info!(author = %author, pages = stats.pages, items = stats.items, "cli.author_feed");
        }
        BsCommand::GetAuthorFeedsBulk { feed, pages } => {
            let params = feed_params(cfg, &feed);
            let stats =
                author_feeds_bulk(&api, stdin(), &params, pages.limit(), &mut stdout_lines())
                    .await?;
            tracing::info!(pages = stats.requests, items = stats.items, "cli.author_feeds_bulk");
        }
        BsCommand::GetProfiles { actors } => {
            let ids: Vec<String> = split_identifiers(&actors).map(str::to_owned).collect();
            let mut out = stdout_lines();
            for chunk in ids.chunks(cfg.batch_size) {
                for profile in api.get_profiles(chunk).await? {
                    out.write(&profile)?;
                }
            }
        }
        BsCommand::GetProfilesBulk => {
            profiles_bulk(&api, stdin(), cfg.batch_size, &mut stdout_lines()).await?;
        }
        BsCommand::GetFollowers { actor, pages } => {
            let stream = api.follower_pages(&actor, cfg.page_size, pages.limit());
            drain_items(stream, &mut stdout_lines()).await?;
        }
        BsCommand::GetFollows { actor, pages } => {
            let stream = api.follow_pages(&actor, cfg.page_size, pages.limit());
            drain_items(stream, &mut stdout_lines()).await?;
        }
        BsCommand::SearchPosts {
            query,
            sort,
            author,
            lang,
            pages,
        } => {
            let mut params = SearchParams::new(query, cfg.page_size);
            params.sort = sort.map(|s| match s {
                SortArg::Top => SearchSort::Top,
                SortArg::Latest => SearchSort::Latest,
            });
            params.author = author;
            params.lang = lang;
            let stream = api.search_pages(&params, pages.limit());
            drain_items(stream, &mut stdout_lines()).await?;
        }
        BsCommand::CreateRecord { text } => {
            let resp = api.create_post(&text).await?;
            stdout_pretty().write(&resp)?;
        }
        BsCommand::CreateList {
            name,
            purpose,
            description,
        } => {
            let purpose = match purpose {
                PurposeArg::Curate => ListPurpose::Curate,
                PurposeArg::Moderation => ListPurpose::Moderation,
                PurposeArg::Reference => ListPurpose::Reference,
            };
            let resp = api
                .create_list(&name, purpose, description.as_deref())
                .await?;
            stdout_pretty().write(&resp)?;
        }
        BsCommand::ResolveListUrl { url } => {
            let uri = api.resolve_list_url(&url).await?;
            let mut out = io::stdout().lock();
            writeln!(out, "{uri}")?;
        }
        BsCommand::AddListMembers { list } => {
            let uri = api.resolve_list_url(&list).await?;
            let report = add_list_members_bulk(&api, stdin(), &uri, &mut stdout_lines()).await?;
            eprintln!("added {}, failed {}", report.added, report.failed);
        }
    }
    Ok(())
}

pub async fn run_db(cfg: &SkywireConfig, args: DbArgs) -> Result<()> {
    let url = args.database_url.as_deref().unwrap_or(&cfg.database_url);
    let store = Store::connect(url).await?;

    match args.command {
        DbCommand::ListTables => {
            let mut out = io::stdout().lock();
            for table in store.list_tables().await? {
                writeln!(out, "{table}")?;
            }
        }
        DbCommand::CreateTable => {
            store.create_table().await?;
            eprintln!("table 'bluesky' ready");
        }
        DbCommand::DropTable => {
            store.drop_table().await?;
            eprintln!("table 'bluesky' dropped");
        }
        DbCommand::Import { file, name } => {
            let rows = store.import_json_lines(&file, &name).await?;
            eprintln!("imported {rows} rows from {} as '{name}'", file.display());
        }
        DbCommand::QueryHandles { name } => {
            let mut out = io::stdout().lock();
            for handle in store.query_handles(&name).await? {
                writeln!(out, "{handle}")?;
            }
        }
        DbCommand::Query { sql, data } => {
            let rows = if data {
                store.query_data(&sql).await?
            } else {
                store.query_rows(&sql).await?
            };
            let mut out = stdout_lines();
            for row in &rows {
                out.write(row)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_output_hides_tokens_by_default() {
        let session: Session = serde_json::from_value(serde_json::json!({
            "did": "did:plc:abc123",
            "handle": "alice.test",
            "accessJwt": "a",
            "refreshJwt": "r"
        }))
        .unwrap();
        let v = session_json(&session, false).unwrap();
        assert!(v.get("accessJwt").is_none());
        assert_eq!(v["did"], "did:plc:abc123");
        let v = session_json(&session, true).unwrap();
        assert_eq!(v["accessJwt"], "a");
    }

    #[test]
    fn feed_filter_falls_back_to_config() {
        let cfg = SkywireConfig::default();
        let p = feed_params(&cfg, &FeedArgs { filter: None });
        assert_eq!(p.filter.as_deref(), Some("posts_with_replies"));
        assert_eq!(p.limit, 100);
        let p = feed_params(
            &cfg,
            &FeedArgs {
                filter: Some("posts_with_media".into()),
            },
        );
        assert_eq!(p.filter.as_deref(), Some("posts_with_media"));
    }
}
