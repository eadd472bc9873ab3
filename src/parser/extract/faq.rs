use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::{collapse_ws, flatten_block, strip_bold};
use crate::parser::sections::Section;

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Closes a bolded question: `**¿…?**`.
const QUESTION_END: &str = "?**";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaqPair {
    pub question: Option<String>,
    pub answer: String,
}

type Strategy = fn(&str) -> Option<Vec<FaqPair>>;

/// Most specific first; a strategy only runs when every earlier one found nothing.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("bold-question", by_bold_question),
    ("paragraph", by_paragraph),
    ("whole-body", whole_body),
];

pub fn extract(section: Option<&Section>) -> Vec<FaqPair> {
    let Some(section) = section else {
        return Vec::new();
    };

    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let pairs = strategy(&section.body)?;
            debug!(strategy = *name, pairs = pairs.len(), "faq extracted");
            Some(pairs)
        })
        .unwrap_or_default()
}

/// Split at `?**` boundaries. Inline bold inside answers is not a boundary:
/// only the last `**` before each `?**` opens a question.
fn by_bold_question(body: &str) -> Option<Vec<FaqPair>> {
    let ends: Vec<usize> = body.match_indices(QUESTION_END).map(|(i, _)| i).collect();
    if ends.is_empty() {
        return None;
    }

    // (question start, position of its opening `**`)
    let mut opens = Vec::with_capacity(ends.len());
    let mut floor = 0;
    for &end in &ends {
        let open = body[floor..end].rfind("**").map(|o| floor + o);
        let start = open.map(|o| o + 2).unwrap_or(floor);
        opens.push((start, open.unwrap_or(floor)));
        floor = end + QUESTION_END.len();
    }

    let mut pairs = Vec::new();
    for (i, &end) in ends.iter().enumerate() {
        let (q_start, _) = opens[i];
        let a_start = end + QUESTION_END.len();
        let a_end = opens.get(i + 1).map(|&(_, o)| o).unwrap_or(body.len());

        let question = collapse_ws(&strip_bold(&body[q_start..=end]));
        let answer = clean_answer(&body[a_start..a_end.max(a_start)]);
        if answer.is_empty() {
            continue;
        }
        pairs.push(FaqPair {
            question: (!question.is_empty()).then_some(question),
            answer,
        });
    }

    (!pairs.is_empty()).then_some(pairs)
}

/// Blank-line separated paragraphs: a paragraph ending in `?` is a question
/// for the next one; otherwise split a paragraph at its first `?`.
fn by_paragraph(body: &str) -> Option<Vec<FaqPair>> {
    let mut pairs = Vec::new();
    let mut pending: Option<String> = None;

    for para in PARAGRAPH_RE.split(body) {
        let text = flatten_block(para);
        if text.is_empty() {
            continue;
        }
        let plain = strip_bold(&text);

        if plain.trim_end().ends_with('?') {
            pending = Some(collapse_ws(&plain));
            continue;
        }
        if let Some(question) = pending.take() {
            pairs.push(FaqPair {
                question: Some(question),
                answer: text,
            });
            continue;
        }
        if let Some(pair) = split_at_question(&text) {
            pairs.push(pair);
        }
    }

    (!pairs.is_empty()).then_some(pairs)
}

fn whole_body(body: &str) -> Option<Vec<FaqPair>> {
    let answer = flatten_block(body);
    (!answer.is_empty()).then(|| {
        vec![FaqPair {
            question: None,
            answer,
        }]
    })
}

fn split_at_question(text: &str) -> Option<FaqPair> {
    let idx = text.find('?')?;
    let answer = clean_answer(&text[idx + 1..]);
    if answer.is_empty() {
        return None;
    }
    Some(FaqPair {
        question: Some(collapse_ws(&strip_bold(&text[..=idx]))),
        answer,
    })
}

fn clean_answer(raw: &str) -> String {
    let flat = flatten_block(raw);
    let trimmed = flat
        .trim_start_matches(|c: char| matches!(c, ':' | '-' | '–' | '—') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '-' | '*' | '+' | '•') || c.is_whitespace());
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::SectionKind;

    fn section(body: &str) -> Section {
        Section {
            kind: SectionKind::Faq,
            heading: "2. FAQ".into(),
            body: body.into(),
        }
    }

    #[test]
    fn inline_bold_not_a_boundary() {
        let body = "- **¿Cuáles son las funciones?**\n  El **motor** es potente.\n- **¿Qué incluye?** El set completo.";
        let pairs = extract(Some(&section(body)));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question.as_deref(), Some("¿Cuáles son las funciones?"));
        assert_eq!(pairs[0].answer, "El **motor** es potente.");
        assert_eq!(pairs[1].answer, "El set completo.");
    }

    #[test]
    fn colon_and_dash_separators() {
        let body = "- **¿Por qué es especial?**: Porque sí.\n- **¿Para quién?** – Para fans.";
        let pairs = extract(Some(&section(body)));
        assert_eq!(pairs[0].answer, "Porque sí.");
        assert_eq!(pairs[1].answer, "Para fans.");
    }

    #[test]
    fn paragraph_fallback() {
        let body = "¿Qué incluye el precio?\n\nEl set completo con 756 piezas.\n\n¿Es buen regalo? Sí, para coleccionistas.";
        let pairs = extract(Some(&section(body)));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question.as_deref(), Some("¿Qué incluye el precio?"));
        assert_eq!(pairs[0].answer, "El set completo con 756 piezas.");
        assert_eq!(pairs[1].answer, "Sí, para coleccionistas.");
    }

    #[test]
    fn whole_body_fallback() {
        let body = "Incluye todas las piezas y un manual impreso.";
        let pairs = extract(Some(&section(body)));
        assert_eq!(
            pairs,
            vec![FaqPair {
                question: None,
                answer: "Incluye todas las piezas y un manual impreso.".into()
            }]
        );
    }

    #[test]
    fn bold_questions_without_answers_fall_through() {
        // Level 1 finds boundaries but no answers; level 2 pairs nothing; level 3 keeps the text.
        let body = "**¿Uno?**";
        let pairs = extract(Some(&section(body)));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, None);
        assert_eq!(pairs[0].answer, "**¿Uno?**");
    }

    #[test]
    fn empty_section() {
        assert!(extract(Some(&section("  \n"))).is_empty());
        assert!(extract(None).is_empty());
    }
}
