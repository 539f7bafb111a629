use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the knowledge base into a flat text corpus.
    Sync(SyncArgs),
    /// Ask one question against a saved corpus.
    Ask(AskArgs),
    /// Interactive support-desk chat.
    Chat(ChatArgs),
    /// Latest headlines from the news feed.
    News,
    /// USD/JPY and CAD/JPY exchange rates.
    Rates,
    /// Parse a saved model response and print the extracted fields.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Root page id (default: `NOTION_PAGE_ID`).
    #[arg(long)]
    pub root: Option<String>,

    /// Output file for the corpus (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Delay between node fetches (default: `KBDESK_CRAWL_DELAY_MS` or 100).
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Corpus file written by `sync --out`.
    #[arg(long)]
    pub corpus: String,

    /// Question text.
    #[arg(required = true, trailing_var_arg = true)]
    pub question: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Start with a corpus file instead of an empty knowledge base.
    #[arg(long)]
    pub corpus: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// File holding the raw model response (default: stdin).
    pub input: Option<String>,
}
