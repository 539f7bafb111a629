use std::io::Write as _;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::cli::ChatArgs;
use crate::config::Config;
use crate::formats::{ChatEntry, Corpus, EntryContent, Role};
use crate::llm::{self, LanguageModel};
use crate::notion::NotionClient;
use crate::session::{SHORTCUTS, Session};
use crate::{news, rates};

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Sync,
    History,
    News,
    Rates,
    Shortcuts,
    Shortcut(usize),
    Suggestion(usize),
    Question(String),
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if let Ok(n) = line.parse::<usize>() {
        return Input::Suggestion(n);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line.to_owned());
    };
    let mut words = command.split_whitespace();
    match (words.next(), words.next()) {
        (Some("quit" | "exit" | "q"), None) => Input::Quit,
        (Some("sync"), None) => Input::Sync,
        (Some("history"), None) => Input::History,
        (Some("news"), None) => Input::News,
        (Some("rates"), None) => Input::Rates,
        (Some("shortcuts"), None) => Input::Shortcuts,
        (Some("s"), Some(n)) => match n.parse() {
            Ok(n) => Input::Shortcut(n),
            Err(_) => Input::Unknown(line.to_owned()),
        },
        _ => Input::Unknown(line.to_owned()),
    }
}

/// Appends the terminal rendering of one transcript entry.
pub fn render_entry(entry: &ChatEntry, out: &mut String) {
    match (&entry.role, &entry.content) {
        (Role::User, EntryContent::Text(text)) => {
            out.push_str("> ");
            out.push_str(text);
            out.push('\n');
        }
        (_, EntryContent::Text(text)) => {
            out.push_str(text);
            out.push('\n');
        }
        (_, EntryContent::Chart(source)) => {
            out.push_str("\n--- Flowchart (DOT) ---\n");
            out.push_str(source);
            out.push_str("\n-----------------------\n");
        }
        (_, EntryContent::Suggestions(items)) => {
            out.push_str("\nNext actions:\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("  [{}] {item}\n", i + 1));
            }
        }
    }
}

pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    tracing::debug!(?config, "chat config");

    let mut session = match args.corpus.as_deref() {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read corpus: {path}"))?;
            Session::with_corpus(Corpus::new(text))
        }
        None => Session::new(),
    };

    let model = match llm::client_from_config(&config) {
        Ok(model) => Some(model),
        Err(err) => {
            println!("{err:#}");
            None
        }
    };
    if session.corpus().is_none() {
        println!("Knowledge base not loaded. Type /sync to start.");
    }
    print_shortcuts();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = match session.take_pending() {
            Some(question) => {
                println!("> {question}");
                Input::Question(question)
            }
            None => {
                print!("> ");
                std::io::stdout().flush().context("flush stdout")?;
                match lines.next_line().await.context("read stdin")? {
                    Some(line) => parse_input(&line),
                    None => break,
                }
            }
        };

        match input {
            Input::Empty => {}
            Input::Quit => break,
            Input::Sync => sync(&config, &mut session).await,
            Input::History => {
                let labels = session.history();
                if labels.is_empty() {
                    println!("No history");
                }
                for label in labels {
                    println!("  {label}");
                }
            }
            Input::News => {
                let items = news::fetch(&config.news_url()).await;
                if items.is_empty() {
                    println!("No updates");
                }
                for item in items {
                    println!("  {:>5}  {}", item.date, item.title);
                }
            }
            Input::Rates => {
                for rate in rates::fetch(&config.rates_base_url).await {
                    println!("  {}/{}  {:.2}", rate.base, rate.quote, rate.value);
                }
            }
            Input::Shortcuts => print_shortcuts(),
            Input::Shortcut(n) => {
                if session.select_shortcut(n).is_none() {
                    println!("No shortcut {n}");
                }
            }
            Input::Suggestion(n) => {
                if session.select_suggestion(n).is_none() {
                    println!("No suggestion {n}");
                }
            }
            Input::Question(question) => match &model {
                Some(model) => ask(&mut session, model, &question).await,
                None => println!("GOOGLE_API_KEY is not set; questions are disabled."),
            },
            Input::Unknown(line) => println!("Unknown command: {line}"),
        }
    }

    Ok(())
}

async fn ask(session: &mut Session, model: &dyn LanguageModel, question: &str) {
    let before = session.transcript().len();
    let result = session.ask(model, question).await.map(|_| ());
    let transcript = session.transcript();
    if transcript.len() > before {
        let mut out = String::new();
        // The user line is already on screen.
        for entry in &transcript[before + 1..] {
            render_entry(entry, &mut out);
        }
        print!("{out}");
    } else if let Err(err) = result {
        println!("{err:#}");
    }
}

async fn sync(config: &Config, session: &mut Session) {
    let settings = match config.require_sync(None) {
        Ok(settings) => settings,
        Err(err) => {
            println!("Sync unavailable: {err}");
            return;
        }
    };
    let client = match NotionClient::new(&config.notion_base_url, settings.api_key) {
        Ok(client) => client,
        Err(err) => {
            println!("Sync unavailable: {err:#}");
            return;
        }
    };
    let rendered = session
        .sync(&client, settings.root_id, config.crawl_delay, |message| {
            eprintln!("{message}")
        })
        .await;
    println!("Synced {rendered} pages");
}

fn print_shortcuts() {
    println!("Shortcuts:");
    for (i, (icon, label)) in SHORTCUTS.iter().enumerate() {
        println!("  /s {}  {icon} {label}", i + 1);
    }
}
