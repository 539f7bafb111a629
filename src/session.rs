use std::time::Duration;

use crate::chart;
use crate::crawl::TreeLoader;
use crate::extract;
use crate::formats::{ChatEntry, Corpus, EntryContent, Role};
use crate::llm::LanguageModel;
use crate::prompt;
use crate::source::DocumentSource;

/// Preset questions offered next to the chat. The label doubles as the
/// question text.
pub const SHORTCUTS: [(&str, &str); 5] = [
    ("✈️", "Travel insurance"),
    ("💴", "Expense reimbursement flow"),
    ("📞", "Emergency contact list"),
    ("🥁", "Taiko drum arrangement"),
    ("🛂", "Visa application"),
];

const HISTORY_LABEL_CHARS: usize = 9;

/// State of one chat session: the synced corpus, the transcript and a
/// queued question from a shortcut or suggestion.
#[derive(Debug, Default)]
pub struct Session {
    corpus: Option<Corpus>,
    transcript: Vec<ChatEntry>,
    pending: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_corpus(corpus: Corpus) -> Self {
        Self {
            corpus: Some(corpus),
            ..Self::default()
        }
    }

    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    /// Crawls the tree under `root_id` and replaces the corpus. Returns the
    /// number of rendered nodes.
    pub async fn sync<S: DocumentSource + ?Sized>(
        &mut self,
        source: &S,
        root_id: &str,
        delay: Duration,
        progress: impl FnMut(&str),
    ) -> usize {
        let outcome = TreeLoader::new(source)
            .with_delay(delay)
            .load(root_id, progress)
            .await;
        if outcome.corpus.is_empty() {
            tracing::warn!(root_id, "sync produced an empty corpus");
        }
        tracing::info!(
            rendered = outcome.rendered,
            bytes = outcome.corpus.len(),
            "corpus replaced"
        );
        self.corpus = Some(outcome.corpus);
        outcome.rendered
    }

    /// Asks one question against the corpus and returns the entries it
    /// appended. A model failure is recorded as an `Error: ..` entry and
    /// then returned.
    pub async fn ask(
        &mut self,
        model: &dyn LanguageModel,
        question: &str,
    ) -> anyhow::Result<&[ChatEntry]> {
        let question = question.trim();
        if question.is_empty() {
            anyhow::bail!("question is empty");
        }
        let Some(corpus) = self.corpus.as_ref() else {
            anyhow::bail!("knowledge base is not synced yet");
        };

        let full_prompt = prompt::build(question, corpus.as_str());
        let start = self.transcript.len();
        self.transcript.push(ChatEntry::user_text(question));

        let raw = match model.generate(&full_prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(err = %format!("{err:#}"), "model call failed");
                self.transcript
                    .push(ChatEntry::assistant(EntryContent::Text(format!(
                        "Error: {err:#}"
                    ))));
                return Err(err);
            }
        };

        let response = extract::extract(&raw);

        self.transcript
            .push(ChatEntry::assistant(EntryContent::Text(response.text)));
        if let Some(source) = response.chart.filter(|c| extract::is_diagram(c)) {
            self.transcript
                .push(ChatEntry::assistant(EntryContent::Chart(chart::apply_style(
                    &source,
                ))));
        }
        if !response.suggestions.is_empty() {
            self.transcript
                .push(ChatEntry::assistant(EntryContent::Suggestions(
                    response.suggestions,
                )));
        }

        Ok(&self.transcript[start..])
    }

    /// Labels of past user questions, truncated for a sidebar.
    pub fn history(&self) -> Vec<String> {
        self.transcript
            .iter()
            .filter(|entry| entry.role == Role::User)
            .filter_map(|entry| match &entry.content {
                EntryContent::Text(text) => Some(history_label(text)),
                _ => None,
            })
            .collect()
    }

    /// Queues shortcut `n` (1-based). Returns the queued question.
    pub fn select_shortcut(&mut self, n: usize) -> Option<&str> {
        let (_, label) = SHORTCUTS.get(n.checked_sub(1)?)?;
        self.pending = Some((*label).to_owned());
        self.pending.as_deref()
    }

    /// Queues suggestion `n` (1-based) from the latest suggestions entry.
    pub fn select_suggestion(&mut self, n: usize) -> Option<&str> {
        let suggestions = self
            .transcript
            .iter()
            .rev()
            .find_map(|entry| match &entry.content {
                EntryContent::Suggestions(items) => Some(items),
                _ => None,
            })?;
        let choice = suggestions.get(n.checked_sub(1)?)?.clone();
        self.pending = Some(choice);
        self.pending.as_deref()
    }

    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }
}

fn history_label(text: &str) -> String {
    if text.chars().count() > HISTORY_LABEL_CHARS {
        let head: String = text.chars().take(HISTORY_LABEL_CHARS).collect();
        format!("{head}..")
    } else {
        text.to_owned()
    }
}
