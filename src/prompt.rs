use crate::extract::{FIELD_CHART, FIELD_QUESTIONS, FIELD_TEXT};

/// Builds the single prompt sent to the model for one question.
pub fn build(question: &str, corpus: &str) -> String {
    format!(
        "You are the operations-manual assistant for an international student support desk.\n\
Answer in a bright, polite tone.\n\
\n\
Answer rules:\n\
1. Conclusion: state it briefly.\n\
2. Steps: explain them in detail.\n\
3. Advice: point out, kindly and in advance, the mistakes beginners tend to make.\n\
4. Graphviz flowchart:\n\
   - Layout: top to bottom (`rankdir=\"TB\"`).\n\
   - Style: transparent background (`bgcolor=\"transparent\"`).\n\
   - Important: when a node label is long, insert `\\n` line breaks.\n\
5. Related topics: suggest three follow-up questions.\n\
\n\
Use ONLY the facts in the manual below. If the manual does not cover the question, say so.\n\
\n\
Output format:\n\
```json\n\
{{\n\
    \"{FIELD_TEXT}\": \"Markdown text\",\n\
    \"{FIELD_CHART}\": \"DOT language source\",\n\
    \"{FIELD_QUESTIONS}\": [\"Q1\", \"Q2\", \"Q3\"]\n\
}}\n\
```\n\
\n\
Question: {question}\n\
\n\
BEGIN_MANUAL\n\
{corpus}\n\
END_MANUAL\n",
        question = question.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_question_corpus_and_schema() {
        let prompt = build("  How do I apply for a visa?  ", "【Page: Visa】\nBring a photo.");
        assert!(prompt.contains("Question: How do I apply for a visa?\n"));
        assert!(prompt.contains("BEGIN_MANUAL\n【Page: Visa】\nBring a photo.\nEND_MANUAL"));
        assert!(prompt.contains("\"text_explanation\": \"Markdown text\""));
        assert!(prompt.contains("\"related_questions\": [\"Q1\", \"Q2\", \"Q3\"]"));
        assert!(prompt.contains("`\\n` line breaks"));
    }
}
