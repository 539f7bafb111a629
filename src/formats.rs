use serde::{Deserialize, Serialize};

/// Where a node was discovered. Roots and child-page references are pages;
/// identifiers returned by a database query are rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Page,
    /// A content block addressed directly through the blocks endpoint.
    Block,
    DatabaseRow,
}

/// One rendered unit of a node's content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fragment {
    Text(String),
    Heading(String),
    ListItem(String),
    Callout(String),
    ImageCaption(String),
    /// `None` when the row listing failed.
    Table(Option<Vec<Vec<String>>>),
    ChildLink(String),
}

impl Fragment {
    pub fn render_into(&self, out: &mut String) {
        match self {
            Fragment::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Fragment::Heading(text) => {
                out.push_str("\n■");
                out.push_str(text);
                out.push('\n');
            }
            Fragment::ListItem(text) => {
                out.push('・');
                out.push_str(text);
                out.push('\n');
            }
            Fragment::Callout(text) => {
                out.push('💡');
                out.push_str(text);
                out.push('\n');
            }
            Fragment::ImageCaption(caption) => {
                out.push_str(&format!("\n[Image: {caption}]\n"));
            }
            Fragment::Table(rows) => {
                out.push_str("\n【Table data】\n");
                match rows {
                    Some(rows) => {
                        for cells in rows {
                            out.push_str(&cells.join(" | "));
                            out.push('\n');
                        }
                    }
                    None => out.push_str("(failed to load table)\n"),
                }
            }
            Fragment::ChildLink(title) => {
                out.push_str(&format!("[Link: {title}]\n"));
            }
        }
    }
}

/// A node as read during one crawl. Never mutated after it is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub kind: NodeKind,
    /// `None` when the page metadata could not be retrieved; no banner is
    /// rendered in that case.
    pub title: Option<String>,
    pub fragments: Vec<Fragment>,
    pub children: Vec<String>,
}

impl DocumentNode {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = self.title.as_deref() {
            out.push_str(&format!("\n\n{}\n【Page: {title}】\n", "=".repeat(20)));
        }
        for fragment in &self.fragments {
            fragment.render_into(&mut out);
        }
        out
    }
}

/// Flattened text of every node reached by one crawl, in visitation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus(String);

impl Corpus {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub(crate) fn push(&mut self, rendered: &str) {
        self.0.push_str(rendered);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum EntryContent {
    Text(String),
    Chart(String),
    Suggestions(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    #[serde(flatten)]
    pub content: EntryContent,
}

impl ChatEntry {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: EntryContent::Text(text.into()),
        }
    }

    pub fn assistant(content: EntryContent) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

}

/// Which extraction stage produced an [`ExtractedResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A ```json fenced block parsed as an object.
    FencedJson,
    /// The span from the first `{` to the last `}` parsed as an object.
    WholeJson,
    /// Per-field pattern scraping of a payload that does not parse.
    FieldPatterns,
    /// Prose with no structured payload.
    Plain,
    /// Structured-looking text nothing could parse; punctuation stripped.
    Stripped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedResponse {
    pub text: String,
    pub chart: Option<String>,
    pub suggestions: Vec<String>,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    /// `MM/DD`, or empty when the feed date did not parse.
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub base: String,
    pub quote: String,
    pub value: f64,
    pub source: RateSource,
}
