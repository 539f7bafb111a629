mod http_stub;

use http_stub::{HttpStub, Reply, Seen};
use predicates::prelude::*;
use serde_json::json;

fn page(id: &str, title: &str) -> Reply {
    Reply::json(
        200,
        json!({
            "object": "page",
            "id": id,
            "properties": {
                "Name": { "type": "title", "title": [ { "plain_text": title } ] }
            }
        }),
    )
}

fn rich(kind: &str, id: &str, text: &str) -> serde_json::Value {
    json!({ "id": id, "type": kind, kind: { "rich_text": [ { "plain_text": text } ] } })
}

fn listing(results: Vec<serde_json::Value>, next_cursor: Option<&str>) -> Reply {
    Reply::json(
        200,
        json!({
            "object": "list",
            "results": results,
            "has_more": next_cursor.is_some(),
            "next_cursor": next_cursor,
        }),
    )
}

/// root -> child page "Visa" (which links back to root), a table, and a
/// database with one row.
fn notion(seen: &Seen) -> Reply {
    let url = seen.url.as_str();
    let path = url.split('?').next().unwrap_or(url);
    match (seen.method.as_str(), path) {
        ("GET", "/v1/pages/root") => page("root", "Support Manual"),
        ("GET", "/v1/pages/child") => page("child", "Visa"),
        ("GET", "/v1/pages/row1") => page("row1", "Insurance"),
        ("GET", "/v1/blocks/root/children") if url.contains("start_cursor=c2") => listing(
            vec![
                rich("heading_2", "h1", "Contacts"),
                json!({ "id": "tbl", "type": "table", "table": { "table_width": 2 } }),
            ],
            None,
        ),
        ("GET", "/v1/blocks/root/children") => listing(
            vec![
                rich("paragraph", "p1", "Welcome to the desk."),
                json!({ "id": "child", "type": "child_page", "child_page": { "title": "Visa" } }),
                json!({ "id": "db", "type": "child_database", "child_database": { "title": "Forms" } }),
            ],
            Some("c2"),
        ),
        ("GET", "/v1/blocks/tbl/children") => listing(
            vec![
                json!({ "id": "r1", "type": "table_row", "table_row": { "cells": [ [ { "plain_text": "Name" } ], [ { "plain_text": "Phone" } ] ] } }),
                json!({ "id": "r2", "type": "table_row", "table_row": { "cells": [ [ { "plain_text": "Desk" } ], [ { "plain_text": "075" } ] ] } }),
            ],
            None,
        ),
        ("GET", "/v1/blocks/child/children") => listing(
            vec![
                rich("bulleted_list_item", "l1", "Bring a photo"),
                json!({ "id": "root", "type": "child_page", "child_page": { "title": "Support Manual" } }),
            ],
            None,
        ),
        ("GET", "/v1/blocks/row1/children") => {
            listing(vec![rich("callout", "c1", "Enroll before departure")], None)
        }
        ("POST", "/v1/databases/db/query") => listing(vec![json!({ "id": "row1" })], None),
        _ => Reply::not_found(),
    }
}

#[test]
fn sync_writes_each_reachable_page_once() {
    let stub = HttpStub::spawn(notion);
    let out_dir = tempfile::tempdir().expect("tempdir");
    let out = out_dir.path().join("kb").join("corpus.txt");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kbdesk");
    cmd.env_clear()
        .env("NOTION_API_KEY", "secret-token")
        .env("KBDESK_NOTION_BASE_URL", format!("{}/v1", stub.base_url))
        .args(["sync", "--root", "root", "--delay-ms", "0", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Syncing... 3 pages"));

    let corpus = std::fs::read_to_string(&out).expect("read corpus");
    assert_eq!(corpus.matches("【Page: Support Manual】").count(), 1);
    assert!(corpus.starts_with("\n\n====================\n【Page: Support Manual】\nWelcome to the desk.\n[Link: Visa]\n"));
    assert!(corpus.contains("\n■Contacts\n\n【Table data】\nName | Phone\nDesk | 075\n"));

    let visa = corpus.find("【Page: Visa】").expect("child page rendered");
    let insurance = corpus.find("【Page: Insurance】").expect("database row rendered");
    assert!(visa < insurance);
    assert!(corpus.contains("・Bring a photo\n"));
    assert!(corpus.contains("💡Enroll before departure\n"));

    let seen = stub.seen();
    assert!(seen.iter().all(|s| s.header("Notion-Version") == Some("2022-06-28")));
    assert!(seen.iter().all(|s| s.header("Authorization") == Some("Bearer secret-token")));
    let root_fetches = seen.iter().filter(|s| s.url == "/v1/pages/root").count();
    assert_eq!(root_fetches, 1);
}

#[test]
fn sync_to_stdout_degrades_when_pages_are_missing() {
    let stub = HttpStub::spawn(|_| Reply::not_found());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kbdesk");
    cmd.env_clear()
        .env("NOTION_API_KEY", "secret-token")
        .env("NOTION_PAGE_ID", "gone")
        .env("KBDESK_NOTION_BASE_URL", format!("{}/v1", stub.base_url))
        .env("KBDESK_CRAWL_DELAY_MS", "0")
        .arg("sync")
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("Could not find object"));
}

#[test]
fn sync_without_credentials_names_the_missing_variables() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kbdesk");
    cmd.env_clear()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "NOTION_API_KEY and NOTION_PAGE_ID are not set",
        ));
}
