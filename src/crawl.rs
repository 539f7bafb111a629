use std::collections::{HashSet, VecDeque};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::SyncArgs;
use crate::config::Config;
use crate::formats::{Corpus, DocumentNode, Fragment, NodeKind};
use crate::notion::NotionClient;
use crate::source::{Block, BlockKind, DocumentSource, Paginated};

/// Delay between node fetches. The document API allows roughly three
/// requests per second per integration.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub corpus: Corpus,
    /// Nodes that produced non-empty rendered text.
    pub rendered: usize,
    /// Distinct identifiers dequeued and fetched, rendered or not.
    pub fetched: usize,
}

/// Breadth-first loader that flattens a document tree into a [`Corpus`].
pub struct TreeLoader<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    delay: Duration,
}

impl<'a, S: DocumentSource + ?Sized> TreeLoader<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            delay: DEFAULT_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Crawls everything reachable from `root_id`. Fetch failures degrade
    /// the affected node; they never abort the crawl.
    pub async fn load(&self, root_id: &str, mut progress: impl FnMut(&str)) -> CrawlOutcome {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, NodeKind)> = VecDeque::new();
        let mut corpus = Corpus::default();
        let mut rendered = 0usize;

        queue.push_back((root_id.to_owned(), NodeKind::Page));

        while let Some((node_id, kind)) = queue.pop_front() {
            if !visited.insert(node_id.clone()) {
                tracing::debug!(node_id = %node_id, "already visited; skipping");
                continue;
            }

            let node = self.read_node(&node_id, kind).await;
            let text = node.render();
            if !text.is_empty() {
                corpus.push(&text);
                rendered += 1;
                let message = format!("Syncing... {rendered} pages");
                tracing::info!(node_id = %node_id, rendered, queued = queue.len(), "{message}");
                progress(&message);
            }

            queue.extend(
                node.children
                    .into_iter()
                    .filter(|(child, _)| !visited.contains(child)),
            );

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        CrawlOutcome {
            corpus,
            rendered,
            fetched: visited.len(),
        }
    }

    /// Reads one node. The returned children carry the kind they were
    /// discovered as.
    pub async fn read_node(&self, node_id: &str, kind: NodeKind) -> ReadNode {
        let title = match self.source.retrieve_page(node_id).await {
            Ok(meta) => Some(meta.title),
            Err(err) => {
                tracing::warn!(node_id, ?kind, err = %format!("{err:#}"), "retrieve page failed");
                None
            }
        };

        let mut fragments = Vec::new();
        let mut children = Vec::new();

        let blocks = match drain(|cursor| async move {
            self.source.list_blocks(node_id, cursor.as_deref()).await
        })
        .await
        {
            Ok(blocks) => blocks,
            Err((partial, err)) => {
                tracing::warn!(
                    node_id,
                    err = %format!("{err:#}"),
                    kept = partial.len(),
                    "list blocks failed; keeping blocks read so far"
                );
                partial
            }
        };

        for block in blocks {
            self.render_block(block, &mut fragments, &mut children).await;
        }

        ReadNode {
            node: DocumentNode {
                id: node_id.to_owned(),
                kind,
                title,
                fragments,
                children: children.iter().map(|(id, _)| id.clone()).collect(),
            },
            children,
        }
    }

    async fn render_block(
        &self,
        block: Block,
        fragments: &mut Vec<Fragment>,
        children: &mut Vec<(String, NodeKind)>,
    ) {
        match block.kind {
            BlockKind::Paragraph(text) => fragments.push(Fragment::Text(text)),
            BlockKind::Heading(text) => fragments.push(Fragment::Heading(text)),
            BlockKind::ListItem(text) => fragments.push(Fragment::ListItem(text)),
            BlockKind::Callout(text) => fragments.push(Fragment::Callout(text)),
            BlockKind::Image { caption } => fragments.push(Fragment::ImageCaption(caption)),
            BlockKind::Table => {
                let table_id = block.id.as_str();
                let rows = match drain(|cursor| async move {
                    self.source.list_blocks(table_id, cursor.as_deref()).await
                })
                .await
                {
                    Ok(rows) => Some(
                        rows.into_iter()
                            .filter_map(|row| match row.kind {
                                BlockKind::TableRow { cells } => Some(cells),
                                _ => None,
                            })
                            .collect(),
                    ),
                    Err((_, err)) => {
                        tracing::warn!(table_id = %block.id, err = %format!("{err:#}"), "list table rows failed");
                        None
                    }
                };
                fragments.push(Fragment::Table(rows));
            }
            BlockKind::ChildPage { title } => {
                children.push((block.id, NodeKind::Page));
                fragments.push(Fragment::ChildLink(title));
            }
            BlockKind::ChildDatabase => {
                let database_id = block.id.as_str();
                let rows = match drain(|cursor| async move {
                    self.source.query_database(database_id, cursor.as_deref()).await
                })
                .await
                {
                    Ok(rows) => rows,
                    Err((partial, err)) => {
                        tracing::warn!(
                            database_id = %block.id,
                            err = %format!("{err:#}"),
                            kept = partial.len(),
                            "query database failed"
                        );
                        partial
                    }
                };
                children.extend(rows.into_iter().map(|row| (row, NodeKind::DatabaseRow)));
            }
            BlockKind::TableRow { .. } => {}
            BlockKind::Unsupported(block_type) => {
                tracing::debug!(block_id = %block.id, block_type = %block_type, "skipping unsupported block");
            }
        }
    }
}

/// A node plus the kinds its children were discovered as.
#[derive(Debug, Clone)]
pub struct ReadNode {
    pub node: DocumentNode,
    pub children: Vec<(String, NodeKind)>,
}

impl ReadNode {
    fn render(&self) -> String {
        self.node.render()
    }
}

/// Follows the cursor until the listing reports no more pages. On failure
/// the results collected so far are returned alongside the error.
async fn drain<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, (Vec<T>, anyhow::Error)>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Paginated<T>>>,
{
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = match fetch(cursor.take()).await {
            Ok(page) => page,
            Err(err) => return Err((out, err)),
        };
        out.extend(page.results);
        match page.next_cursor {
            Some(next) if page.has_more => cursor = Some(next),
            _ => return Ok(out),
        }
    }
}

pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let root_override = args.root.clone();
    let settings = config
        .require_sync(root_override.as_deref())
        .context("sync is unavailable")?;

    let client = NotionClient::new(&config.notion_base_url, settings.api_key)
        .context("build notion client")?;
    let delay = args
        .delay_ms
        .map(Duration::from_millis)
        .unwrap_or(config.crawl_delay);

    let outcome = TreeLoader::new(&client)
        .with_delay(delay)
        .load(settings.root_id, |message| eprintln!("{message}"))
        .await;

    tracing::info!(
        rendered = outcome.rendered,
        fetched = outcome.fetched,
        bytes = outcome.corpus.len(),
        "sync complete"
    );

    match args.out.as_deref() {
        Some(out) => {
            let out_path = PathBuf::from(out);
            if let Some(parent) = out_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create corpus dir: {}", parent.display()))?;
            }
            std::fs::write(&out_path, outcome.corpus.as_str())
                .with_context(|| format!("write corpus: {}", out_path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(outcome.corpus.as_str().as_bytes())
                .context("write corpus to stdout")?;
            stdout.flush().context("flush stdout")?;
        }
    }

    Ok(())
}
