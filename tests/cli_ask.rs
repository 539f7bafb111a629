mod http_stub;

use http_stub::{HttpStub, Reply, Seen};
use predicates::prelude::*;
use serde_json::json;

const ANSWER: &str = "Here is the visa flow.\n```json\n{\n  \"text_explanation\": \"Book an appointment first.\",\n  \"chart_code\": \"digraph G { rankdir=\\\"TB\\\"; apply -> interview; }\",\n  \"related_questions\": [\"Which photo size?\", \"How long does it take?\", \"What does it cost?\"]\n}\n```";

fn gemini(answer: &'static str) -> impl Fn(&Seen) -> Reply + Send + 'static {
    move |seen: &Seen| {
        if seen.method != "POST" || seen.url != "/v1beta/models/test-model:generateContent" {
            return Reply::not_found();
        }
        if seen.header("x-goog-api-key") != Some("model-key") {
            return Reply::json(
                403,
                json!({ "error": { "code": 403, "message": "API key not valid" } }),
            );
        }
        Reply::json(
            200,
            json!({
                "candidates": [ { "content": { "role": "model", "parts": [ { "text": answer } ] } } ]
            }),
        )
    }
}

fn corpus_file() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().expect("temp corpus");
    std::fs::write(
        file.path(),
        "\n\n====================\n【Page: Visa】\n・Bring a passport photo\n",
    )
    .expect("write corpus");
    file
}

fn kbdesk(stub: &HttpStub) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kbdesk");
    cmd.env_clear()
        .env("GOOGLE_API_KEY", "model-key")
        .env("KBDESK_MODEL", "test-model")
        .env("KBDESK_MODEL_BASE_URL", format!("{}/v1beta", stub.base_url));
    cmd
}

#[test]
fn ask_prints_text_styled_chart_and_suggestions() {
    let stub = HttpStub::spawn(gemini(ANSWER));
    let corpus = corpus_file();

    kbdesk(&stub)
        .arg("ask")
        .arg("--corpus")
        .arg(corpus.path())
        .args(["How", "do", "I", "apply", "for", "a", "visa?"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "Here is the visa flow.\n\nBook an appointment first.\n",
        ))
        .stdout(predicate::str::contains("digraph G { graph [bgcolor=\"transparent\""))
        .stdout(predicate::str::contains("  [3] What does it cost?\n"))
        .stdout(predicate::str::contains("```").not());

    let seen = stub.seen();
    assert_eq!(seen.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).expect("json body");
    let prompt = body
        .pointer("/contents/0/parts/0/text")
        .and_then(|v| v.as_str())
        .expect("prompt text");
    assert!(prompt.contains("Question: How do I apply for a visa?"));
    assert!(prompt.contains("・Bring a passport photo"));
}

#[test]
fn model_errors_are_shown_in_place_of_the_answer() {
    let stub = HttpStub::spawn(gemini(ANSWER));
    let corpus = corpus_file();

    kbdesk(&stub)
        .env("GOOGLE_API_KEY", "wrong-key")
        .arg("ask")
        .arg("--corpus")
        .arg(corpus.path())
        .arg("Visa?")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error: model API error (403 Forbidden): API key not valid"));
}

#[test]
fn ask_without_model_key_is_refused() {
    let corpus = corpus_file();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kbdesk");
    cmd.env_clear()
        .arg("ask")
        .arg("--corpus")
        .arg(corpus.path())
        .arg("Visa?")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY is not set"));
}

#[test]
fn chat_answers_then_follows_a_suggestion() {
    let stub = HttpStub::spawn(gemini(ANSWER));
    let corpus = corpus_file();

    kbdesk(&stub)
        .arg("chat")
        .arg("--corpus")
        .arg(corpus.path())
        .write_stdin("Visa application steps\n2\n/history\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("> How long does it take?\n"))
        .stdout(predicate::str::contains("  Visa appl..\n"))
        .stdout(predicate::str::contains("  How long ..\n"));

    assert_eq!(stub.seen().len(), 2);
}

#[test]
fn chat_without_corpus_refuses_questions_until_synced() {
    let stub = HttpStub::spawn(gemini(ANSWER));

    kbdesk(&stub)
        .arg("chat")
        .write_stdin("Visa?\n/sync\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Type /sync to start."))
        .stdout(predicate::str::contains("knowledge base is not synced yet"))
        .stdout(predicate::str::contains(
            "Sync unavailable: NOTION_API_KEY and NOTION_PAGE_ID are not set",
        ));

    assert!(stub.seen().is_empty());
}
