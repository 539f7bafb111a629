use std::time::Duration;

use anyhow::Context as _;
use quick_xml::events::Event;
use reqwest::header::USER_AGENT;

use crate::config::Config;
use crate::formats::NewsItem;

pub const MAX_ITEMS: usize = 10;
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

const DEFAULT_FEED_BASE: &str = "https://news.google.com/rss/search";
const DEFAULT_QUERY: &str = "立命館 大学 学園 附属";

pub fn default_feed_url() -> String {
    url::Url::parse_with_params(
        DEFAULT_FEED_BASE,
        &[
            ("q", DEFAULT_QUERY),
            ("hl", "ja"),
            ("gl", "JP"),
            ("ceid", "JP:ja"),
        ],
    )
    .map(|url| url.to_string())
    .unwrap_or_else(|_| DEFAULT_FEED_BASE.to_owned())
}

/// Latest feed items. Any fetch or parse failure yields an empty list.
pub async fn fetch(url: &str) -> Vec<NewsItem> {
    match try_fetch(url).await {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(url, err = %format!("{err:#}"), "news feed unavailable");
            Vec::new()
        }
    }
}

async fn try_fetch(url: &str) -> anyhow::Result<Vec<NewsItem>> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("build news http client")?;
    let response = client
        .get(url)
        .header(USER_AGENT, "kbdesk/0.1")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("news feed returned {}", response.status());
    }
    let body = response.text().await.context("read news feed body")?;
    parse_feed(&body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    PubDate,
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: String,
    link: String,
    pub_date: String,
}

/// Parses up to [`MAX_ITEMS`] `<item>` entries from an RSS document.
pub fn parse_feed(xml: &str) -> anyhow::Result<Vec<NewsItem>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().context("parse news feed xml")? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"item" => current = Some(ItemBuilder::default()),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" if current.is_some() => field = Some(Field::Link),
                b"pubDate" if current.is_some() => field = Some(Field::PubDate),
                _ => field = None,
            },
            Event::Text(text) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let value = text.unescape().context("unescape feed text")?;
                    item.push(field, &value);
                }
            }
            Event::CData(data) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    item.push(field, &value);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"item" => {
                    if let Some(item) = current.take() {
                        items.push(item.build());
                        if items.len() >= MAX_ITEMS {
                            break;
                        }
                    }
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

impl ItemBuilder {
    fn push(&mut self, field: Field, value: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
        };
        target.push_str(value);
    }

    fn build(self) -> NewsItem {
        NewsItem {
            title: strip_publisher(&self.title).to_owned(),
            link: self.link.trim().to_owned(),
            date: short_date(&self.pub_date),
        }
    }
}

/// Feed titles end with " - Publisher".
fn strip_publisher(title: &str) -> &str {
    title.split(" - ").next().unwrap_or(title).trim()
}

fn short_date(pub_date: &str) -> String {
    chrono::DateTime::parse_from_rfc2822(pub_date.trim())
        .map(|dt| dt.format("%m/%d").to_string())
        .unwrap_or_default()
}

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    let items = fetch(&config.news_url()).await;
    if items.is_empty() {
        println!("No updates");
        return Ok(());
    }
    for item in items {
        let date = if item.date.is_empty() {
            "     ".to_owned()
        } else {
            item.date
        };
        println!("{date}  {}\n       {}", item.title, item.link);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(items: usize) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Feed</title>"#);
        for i in 0..items {
            xml.push_str(&format!(
                "<item><title>Story {i} - Kyoto Times</title><link>https://example.com/{i}</link><pubDate>0{d} Apr 2025 10:00:00 GMT</pubDate></item>",
                d = (i % 9) + 1
            ));
        }
        xml.push_str("</channel></rss>");
        xml
    }

    #[test]
    fn parses_items_and_strips_publisher_suffix() -> anyhow::Result<()> {
        let items = parse_feed(&feed(2))?;
        assert_eq!(
            items,
            vec![
                NewsItem {
                    title: "Story 0".to_owned(),
                    link: "https://example.com/0".to_owned(),
                    date: "04/01".to_owned(),
                },
                NewsItem {
                    title: "Story 1".to_owned(),
                    link: "https://example.com/1".to_owned(),
                    date: "04/02".to_owned(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn caps_items_at_ten() -> anyhow::Result<()> {
        assert_eq!(parse_feed(&feed(15))?.len(), MAX_ITEMS);
        Ok(())
    }

    #[test]
    fn malformed_dates_become_empty() -> anyhow::Result<()> {
        let xml = "<rss><channel><item><title><![CDATA[Open campus & tours]]></title><link>https://example.com/a</link><pubDate>yesterday</pubDate></item></channel></rss>";
        let items = parse_feed(xml)?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Open campus & tours");
        assert_eq!(items[0].date, "");
        Ok(())
    }

    #[test]
    fn channel_title_is_not_mistaken_for_an_item() -> anyhow::Result<()> {
        let items = parse_feed(&feed(1))?;
        assert_eq!(items[0].title, "Story 0");
        Ok(())
    }

    #[test]
    fn default_feed_url_encodes_query() {
        let url = default_feed_url();
        assert!(url.starts_with("https://news.google.com/rss/search?q="));
        assert!(url.contains("ceid=JP%3Aja"));
    }
}
