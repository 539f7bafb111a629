use anyhow::Context as _;
use async_trait::async_trait;

use crate::chat;
use crate::cli::AskArgs;
use crate::config::Config;
use crate::formats::Corpus;
use crate::gemini::GeminiClient;
use crate::session::Session;

/// A text-in, text-out model endpoint. One prompt, one answer; no streaming.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn client_from_config(config: &Config) -> anyhow::Result<GeminiClient> {
    let api_key = config.require_ask().context("ask is unavailable")?;
    GeminiClient::new(&config.model_base_url, &config.model, api_key)
}

pub async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let model = client_from_config(&config)?;

    let corpus = std::fs::read_to_string(&args.corpus)
        .with_context(|| format!("read corpus: {}", &args.corpus))?;
    tracing::info!(corpus = %args.corpus, bytes = corpus.len(), "loaded corpus");

    let mut session = Session::with_corpus(Corpus::new(corpus));
    let question = args.question.join(" ");
    let answered = session.ask(&model, &question).await.map(|_| ());

    let mut out = String::new();
    for entry in session.transcript().iter().skip(1) {
        chat::render_entry(entry, &mut out);
    }
    print!("{out}");

    answered
}
