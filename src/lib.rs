#![forbid(unsafe_code)]

pub mod chart;
pub mod chat;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod extract;
pub mod formats;
pub mod gemini;
pub mod llm;
pub mod logging;
pub mod news;
pub mod notion;
pub mod prompt;
pub mod rates;
pub mod session;
pub mod source;
