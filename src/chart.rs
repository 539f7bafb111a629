use std::sync::OnceLock;

use regex::Regex;

/// Default attributes injected into every rendered flowchart.
pub const GLASS_STYLE: &str = r##"graph [bgcolor="transparent", fontcolor="#0d47a1", ranksep=0.6]; node [color="#2196f3", fontcolor="#0d47a1", style="filled,rounded", fillcolor="#e3f2fd", fixedsize=false, width=0, height=0, margin="0.2,0.1"]; edge [color="#2196f3"];"##;

/// Inserts [`GLASS_STYLE`] right after the opening brace of the first
/// `digraph` header. Attributes the model sets later still win.
pub fn apply_style(source: &str) -> String {
    let Some(head) = header_re().find(source) else {
        return source.to_owned();
    };
    let mut out = String::with_capacity(source.len() + GLASS_STYLE.len() + 1);
    out.push_str(&source[..head.end()]);
    out.push(' ');
    out.push_str(GLASS_STYLE);
    out.push_str(&source[head.end()..]);
    out
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:strict[ \t]+)?digraph\b[ \t]*(?:"[^"\n]*"|[\w.]+)?\s*\{"#)
            .expect("digraph header regex must compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_is_injected_after_named_and_anonymous_headers() {
        assert_eq!(
            apply_style("digraph G { a -> b }"),
            format!("digraph G {{ {GLASS_STYLE} a -> b }}")
        );
        assert_eq!(
            apply_style("digraph {a -> b}"),
            format!("digraph {{ {GLASS_STYLE}a -> b}}")
        );
    }

    #[test]
    fn only_the_first_header_is_styled() {
        let styled = apply_style("digraph A { x }\ndigraph B { y }");
        assert_eq!(styled.matches("bgcolor=\"transparent\"").count(), 1);
    }

    #[test]
    fn non_diagram_source_is_unchanged() {
        assert_eq!(apply_style("graph { a -- b }"), "graph { a -- b }");
    }
}
