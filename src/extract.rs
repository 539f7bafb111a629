use std::io::Read as _;
use std::ops::Range;
use std::sync::OnceLock;

use anyhow::Context as _;
use regex::Regex;
use serde_json::{Map, Value};

use crate::cli::ExtractArgs;
use crate::formats::{ExtractedResponse, Strategy};

pub const FIELD_TEXT: &str = "text_explanation";
pub const FIELD_CHART: &str = "chart_code";
pub const FIELD_QUESTIONS: &str = "related_questions";

const TEXT_FOR_CHART_ONLY: &str = "See the flowchart below.";
const TEXT_FOR_NOTHING: &str = "No explanation was provided.";

/// What a strategy recovered before the shared cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub chart: Option<String>,
    pub suggestions: Vec<String>,
}

type StrategyFn = fn(&str) -> Option<Draft>;

/// Tried in order; the first strategy that returns a draft wins. The last
/// one always succeeds.
pub const STRATEGIES: [(Strategy, StrategyFn); 5] = [
    (Strategy::FencedJson, fenced_json),
    (Strategy::WholeJson, whole_json),
    (Strategy::FieldPatterns, field_patterns),
    (Strategy::Stripped, stripped),
    (Strategy::Plain, plain),
];

/// Splits a raw model answer into display text, an optional diagram and
/// follow-up questions. Never fails; malformed payloads fall through to
/// weaker strategies.
pub fn extract(raw: &str) -> ExtractedResponse {
    let raw = raw.trim();
    if raw.is_empty() {
        return ExtractedResponse {
            text: String::new(),
            chart: None,
            suggestions: Vec::new(),
            strategy: Strategy::Plain,
        };
    }

    let (strategy, draft) = STRATEGIES
        .iter()
        .find_map(|(strategy, run)| run(raw).map(|draft| (*strategy, draft)))
        .unwrap_or_else(|| (Strategy::Plain, Draft::plain(raw)));

    let (mut text, leaked) = strip_diagrams(&draft.text);
    let chart = draft
        .chart
        .filter(|chart| is_diagram(chart))
        .or(leaked)
        .or_else(|| strip_diagrams(raw).1);

    if text.is_empty() {
        text = if chart.is_some() {
            TEXT_FOR_CHART_ONLY
        } else {
            TEXT_FOR_NOTHING
        }
        .to_owned();
    }

    tracing::debug!(
        ?strategy,
        has_chart = chart.is_some(),
        suggestions = draft.suggestions.len(),
        "extracted model response"
    );

    ExtractedResponse {
        text,
        chart,
        suggestions: draft.suggestions,
        strategy,
    }
}

impl Draft {
    fn plain(raw: &str) -> Self {
        Self {
            text: raw.to_owned(),
            ..Self::default()
        }
    }
}

pub fn fenced_json(raw: &str) -> Option<Draft> {
    let caps = json_fence_captures(raw)?;
    let fence = caps.get(0)?;
    let object = parse_object(caps.get(1)?.as_str())?;
    let prose = remove_range(raw, fence.range());
    Some(draft_from_object(&object, &prose))
}

/// Older prompts asked for the whole answer as one bare JSON object.
pub fn whole_json(raw: &str) -> Option<Draft> {
    let range = object_range(raw)?;
    let object = parse_object(&raw[range.clone()])?;
    if ![FIELD_TEXT, FIELD_CHART, FIELD_QUESTIONS]
        .iter()
        .any(|field| object.contains_key(*field))
    {
        return None;
    }
    let prose = remove_range(raw, range);
    Some(draft_from_object(&object, &prose))
}

pub fn field_patterns(raw: &str) -> Option<Draft> {
    let text = text_field_re().captures(raw);
    let chart = chart_field_re().captures(raw);
    let questions = questions_field_re().captures(raw);
    if text.is_none() && chart.is_none() && questions.is_none() {
        return None;
    }

    let chart_value = chart
        .as_ref()
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()));
    let suggestions = questions
        .as_ref()
        .and_then(|caps| caps.get(1))
        .map(|m| split_questions(m.as_str()))
        .unwrap_or_default();

    let text = match text.as_ref().and_then(|caps| caps.get(1)) {
        Some(m) => {
            let prose = payload_range(raw)
                .map(|range| remove_range(raw, range))
                .unwrap_or_default();
            let prose = prose.replace("```json", "").replace("```", "");
            join_text(&prose, &unescape(m.as_str()))
        }
        None => {
            let mut spans = Vec::new();
            if let Some(caps) = chart.as_ref()
                && let (Some(whole), Some(value)) = (caps.get(0), caps.get(1))
            {
                // Through the closing quote of the value only; the match
                // itself also consumes the following key.
                spans.push(whole.start()..value.end() + 1);
            }
            if let Some(whole) = questions.as_ref().and_then(|caps| caps.get(0)) {
                spans.push(whole.range());
            }
            strip_structure(&remove_ranges(raw, spans))
        }
    };

    Some(Draft {
        text,
        chart: chart_value,
        suggestions,
    })
}

/// Structured-looking text that nothing could parse.
pub fn stripped(raw: &str) -> Option<Draft> {
    if !looks_structured(raw) {
        return None;
    }
    let (without_diagrams, _) = strip_diagrams(raw);
    Some(Draft {
        text: strip_structure(&without_diagrams),
        ..Draft::default()
    })
}

pub fn plain(raw: &str) -> Option<Draft> {
    Some(Draft::plain(raw))
}

/// Removes diagram fences and bare `digraph { ... }` spans from `text`.
/// Returns the cleaned text and the first diagram found. Text without any
/// diagram is returned unchanged.
pub fn strip_diagrams(text: &str) -> (String, Option<String>) {
    let mut found: Option<String> = None;
    let mut changed = false;

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for caps in any_fence_re().captures_iter(text) {
        let (Some(whole), Some(label), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let label = label.as_str().trim().to_ascii_lowercase();
        let is_diagram_fence = matches!(label.as_str(), "dot" | "graphviz" | "gv")
            || (label != "json" && is_diagram(body.as_str()));
        if !is_diagram_fence {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        last = whole.end();
        changed = true;
        if found.is_none() && is_diagram(body.as_str()) {
            found = Some(body.as_str().trim().to_owned());
        }
    }
    out.push_str(&text[last..]);

    while let Some(range) = find_digraph_span(&out) {
        if found.is_none() {
            found = Some(recover_escaped(out[range.clone()].trim()));
        }
        out = remove_range_raw(&out, range);
        changed = true;
    }

    if changed {
        (collapse_blank_lines(&out), found)
    } else {
        (text.to_owned(), found)
    }
}

pub fn is_diagram(source: &str) -> bool {
    source.to_ascii_lowercase().contains("digraph")
}

/// Span of the first `digraph ... { ... }`, matched to its closing brace.
/// An unbalanced body runs to the end of the text.
fn find_digraph_span(text: &str) -> Option<Range<usize>> {
    let head = digraph_head_re().find(text)?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = head.end() - 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(head.start()..i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Some(head.start()..text.len())
}

fn draft_from_object(object: &Map<String, Value>, prose: &str) -> Draft {
    let explanation = object
        .get(FIELD_TEXT)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let text = join_text(prose, explanation);

    let chart = object
        .get(FIELD_CHART)
        .and_then(Value::as_str)
        .map(|chart| chart.trim().to_owned())
        .filter(|chart| !chart.is_empty());

    let suggestions = object
        .get(FIELD_QUESTIONS)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Draft {
        text,
        chart,
        suggestions,
    }
}

/// Prose outside the payload, then the explanation, separated by a blank line.
fn join_text(prose: &str, explanation: &str) -> String {
    [prose.trim(), explanation.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Where the payload sits in `raw`: its `json` fence, else the outermost
/// braces. An unclosed object runs to the end.
fn payload_range(raw: &str) -> Option<Range<usize>> {
    json_fence_captures(raw)
        .and_then(|caps| caps.get(0))
        .map(|m| m.range())
        .or_else(|| object_range(raw))
        .or_else(|| raw.find('{').map(|start| start..raw.len()))
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    let range = object_range(body)?;
    match serde_json::from_str::<Value>(&body[range]) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(%err, "structured block is not valid json");
            None
        }
    }
}

fn object_range(text: &str) -> Option<Range<usize>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then_some(start..end + 1)
}

fn split_questions(list: &str) -> Vec<String> {
    let quoted = quoted_item_re()
        .captures_iter(list)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()).trim().to_owned())
        .filter(|q| !q.is_empty())
        .collect::<Vec<_>>();
    if !quoted.is_empty() {
        return quoted;
    }
    list.split(',')
        .map(|q| q.trim().replace('"', ""))
        .filter(|q| !q.is_empty())
        .collect()
}

fn unescape(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
}

fn recover_escaped(span: &str) -> String {
    if span.contains("\\n") || span.contains("\\\"") {
        unescape(span)
    } else {
        span.to_owned()
    }
}

/// A quoted payload key, or an object opening with a quoted key.
fn looks_structured(raw: &str) -> bool {
    if payload_key_re().is_match(raw) {
        return true;
    }
    raw.trim_start()
        .strip_prefix('{')
        .is_some_and(|rest| rest.trim_start().starts_with('"'))
}

fn strip_structure(text: &str) -> String {
    let text = text.replace("```json", "").replace("```", "");
    let text = text.replace(['"', '{', '}'], "");
    let text = field_label_re().replace_all(&text, "");
    let kept = text
        .lines()
        .filter(|line| {
            line.trim().is_empty()
                || !line
                    .trim()
                    .chars()
                    .all(|c| matches!(c, '[' | ']' | ',' | ':' | ' '))
        })
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    collapse_blank_lines(&kept)
}

fn remove_range(text: &str, range: Range<usize>) -> String {
    collapse_blank_lines(&remove_range_raw(text, range))
}

fn remove_range_raw(text: &str, range: Range<usize>) -> String {
    format!("{}{}", &text[..range.start], &text[range.end..])
}

fn remove_ranges(text: &str, mut ranges: Vec<Range<usize>>) -> String {
    ranges.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for range in ranges {
        if range.start < last {
            continue;
        }
        out.push_str(&text[last..range.start]);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

fn collapse_blank_lines(text: &str) -> String {
    blank_lines_re()
        .replace_all(text, "\n\n")
        .trim()
        .to_owned()
}

/// A `json` fence closed by backticks at the start of a line, else one
/// closed on the same line.
fn json_fence_captures(raw: &str) -> Option<regex::Captures<'_>> {
    json_fence_re()
        .captures(raw)
        .or_else(|| inline_json_fence_re().captures(raw))
}

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```[ \t]*json[^\n]*\n(.*?)\n[ \t]*```[ \t]*(?:\n|$)")
            .expect("json fence regex must compile")
    })
}

fn inline_json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```[ \t]*json[ \t]*(.*?)```").expect("inline json fence regex must compile")
    })
}

fn payload_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(?:text_explanation|chart_code|related_questions)"\s*:"#)
            .expect("payload key regex must compile")
    })
}

fn any_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").expect("fence regex must compile")
    })
}

fn digraph_head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:strict[ \t]+)?digraph\b[ \t]*(?:\\?"[^"\n]*"|[\w.]+)?\s*\{"#)
            .expect("digraph regex must compile")
    })
}

fn text_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)"text_explanation"\s*:\s*"(.*?)"\s*(?:,\s*"(?:chart_code|related_questions)"|\})"#,
        )
        .expect("text field regex must compile")
    })
}

fn chart_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)"chart_code"\s*:\s*"(.*?)"\s*(?:,\s*"(?:related_questions|text_explanation)"|\})"#,
        )
        .expect("chart field regex must compile")
    })
}

fn questions_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)"related_questions"\s*:\s*\[(.*?)\]"#)
            .expect("questions field regex must compile")
    })
}

fn quoted_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("quoted item regex must compile")
    })
}

fn field_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:text_explanation|chart_code|related_questions)\s*:\s*")
            .expect("field label regex must compile")
    })
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank line regex must compile"))
}

pub fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let raw = match args.input.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read model response: {path}"))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("read model response from stdin")?;
            raw
        }
    };

    let extracted = extract(&raw);
    let json = serde_json::to_string_pretty(&extracted).context("serialize extracted response")?;
    println!("{json}");
    Ok(())
}
