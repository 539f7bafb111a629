use async_trait::async_trait;

/// Page metadata returned by a node retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    /// "Untitled" when the page has no title property.
    pub title: String,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Paginated<T> {
    pub fn last(results: Vec<T>) -> Self {
        Self {
            results,
            has_more: false,
            next_cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
}

/// The closed set of block kinds the loader knows how to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph(String),
    Heading(String),
    ListItem(String),
    Callout(String),
    Image { caption: String },
    /// Rows are listed separately, keyed by the table block id.
    Table,
    TableRow { cells: Vec<String> },
    ChildPage { title: String },
    /// Rows are queried separately, keyed by the database block id.
    ChildDatabase,
    Unsupported(String),
}

/// The three calls the tree loader needs from a document-tree API.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn retrieve_page(&self, id: &str) -> anyhow::Result<PageMeta>;

    async fn list_blocks(&self, id: &str, cursor: Option<&str>)
    -> anyhow::Result<Paginated<Block>>;

    /// Returns the identifiers of the database's rows.
    async fn query_database(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> anyhow::Result<Paginated<String>>;
}
