use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    kbdesk::logging::init().context("init logging")?;

    let cli = kbdesk::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        kbdesk::cli::Command::Sync(args) => {
            kbdesk::crawl::run(args).await.context("sync")?;
        }
        kbdesk::cli::Command::Ask(args) => {
            kbdesk::llm::ask(args).await.context("ask")?;
        }
        kbdesk::cli::Command::Chat(args) => {
            kbdesk::chat::run(args).await.context("chat")?;
        }
        kbdesk::cli::Command::News => {
            kbdesk::news::run().await.context("news")?;
        }
        kbdesk::cli::Command::Rates => {
            kbdesk::rates::run().await.context("rates")?;
        }
        kbdesk::cli::Command::Extract(args) => {
            kbdesk::extract::run(args).context("extract")?;
        }
    }

    Ok(())
}
