use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skywire")]
#[command(about = "Bluesky XRPC client with a SQLite sink for the JSON it fetches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// YAML config file. Defaults to ./skywire.yaml and the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Mirror logs to stderr (stdout is reserved for JSON).
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Write logs as JSON instead of text.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bluesky API operations.
    #[command(subcommand)]
    Bs(BsCommand),
    /// Local SQLite sink.
    Db(DbArgs),
}

#[derive(Subcommand)]
pub enum BsCommand {
    /// Log in and print the session.
    CreateSession {
        /// Include the access and refresh tokens in the output.
        #[arg(long)]
        show_tokens: bool,
    },
    /// Log in, exchange the refresh token and print the new session.
    RefreshSession {
        #[arg(long)]
        show_tokens: bool,
    },
    /// First page of an author's feed, pretty-printed.
    GetAuthorFeed {
        author: String,
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Every page of an author's feed as JSON Lines.
    GetAuthorFeeds {
        author: String,
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        pages: PageArgs,
    },
    /// Feeds for each author read from stdin, one per line.
    GetAuthorFeedsBulk {
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        pages: PageArgs,
    },
    /// Profiles for a comma-separated list of handles or DIDs.
    GetProfiles { actors: String },
    /// Profiles for identifiers read from stdin (comma or newline separated).
    GetProfilesBulk,
    GetFollowers {
        actor: String,
        #[command(flatten)]
        pages: PageArgs,
    },
    GetFollows {
        actor: String,
        #[command(flatten)]
        pages: PageArgs,
    },
    SearchPosts {
        query: String,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Only posts by this handle or DID.
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        lang: Option<String>,
        #[command(flatten)]
        pages: PageArgs,
    },
    /// Publish a text post.
    CreateRecord { text: String },
    CreateList {
        name: String,
        #[arg(long, value_enum, default_value_t = PurposeArg::Curate)]
        purpose: PurposeArg,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the at:// URI for a list's web URL.
    ResolveListUrl { url: String },
    /// Add DIDs from stdin (bare or as JSON objects) to a list.
    AddListMembers {
        /// Web URL or at:// URI of the list.
        list: String,
    },
}

#[derive(clap::Args, Clone)]
pub struct FeedArgs {
    /// Overrides `feed_filter` from the config.
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(clap::Args, Clone, Copy)]
pub struct PageArgs {
    /// Stop after this many pages; 0 follows the cursor to the end.
    #[arg(long, default_value_t = 0)]
    pub pages: usize,
}

impl PageArgs {
    pub fn limit(self) -> Option<usize> {
        (self.pages > 0).then_some(self.pages)
    }
}

#[derive(ValueEnum, Clone, Copy)]
pub enum SortArg {
    Top,
    Latest,
}

#[derive(ValueEnum, Clone, Copy)]
pub enum PurposeArg {
    Curate,
    Moderation,
    Reference,
}

#[derive(clap::Args)]
pub struct DbArgs {
    /// Overrides `database_url` from the config.
    #[arg(long)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand)]
pub enum DbCommand {
    ListTables,
    CreateTable,
    DropTable,
    /// Load a JSON Lines file, tagging every row with `name`.
    Import { file: PathBuf, name: String },
    /// Print `handle` of each document imported under `name`.
    QueryHandles { name: String },
    /// Run SQL and print each row as JSON.
    Query {
        sql: String,
        /// Print the `data` document instead of the row.
        #[arg(long)]
        data: bool,
    },
}
