use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{collapse_ws, strip_bold, strip_heading_marker, strip_list_marker};
use crate::parser::sections::Section;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\**\s*(title|t[ií]tulo|body|cuerpo|video)\s*\**\s*:\s*\**\s*").unwrap()
});
static BARE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\**\s*(body|cuerpo)\s*\**$").unwrap());
static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoSection {
    pub title: Option<String>,
    /// Two paragraphs when the body has enough text; fewer otherwise.
    pub paragraphs: Vec<String>,
}

enum Line {
    Title(String),
    Body(String),
    Blank,
    Skip,
}

pub fn extract(section: Option<&Section>) -> Option<VideoSection> {
    let section = section?;

    let mut title: Option<String> = None;
    let mut blocks: Vec<Vec<String>> = vec![Vec::new()];

    for raw in section.body.lines() {
        match classify(raw) {
            Line::Title(t) => {
                if title.is_none() {
                    title = Some(t);
                }
            }
            Line::Body(t) => {
                if title.is_none() {
                    title = Some(strip_bold(&t).trim().to_string());
                } else if let Some(block) = blocks.last_mut() {
                    block.push(t);
                }
            }
            Line::Blank => {
                if blocks.last().is_some_and(|b| !b.is_empty()) {
                    blocks.push(Vec::new());
                }
            }
            Line::Skip => {}
        }
    }

    let blocks: Vec<String> = blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|b| collapse_ws(&b.join(" ")))
        .collect();

    let video = VideoSection {
        title: title.filter(|t| !t.is_empty()),
        paragraphs: two_paragraphs(blocks),
    };
    (video.title.is_some() || !video.paragraphs.is_empty()).then_some(video)
}

fn classify(raw: &str) -> Line {
    // Stray heading markers inside the section are stripped, not section breaks.
    let line = strip_heading_marker(raw);
    if line.is_empty() {
        return Line::Blank;
    }
    let line = strip_list_marker(line);

    if BARE_LABEL_RE.is_match(line) {
        return Line::Skip;
    }
    if let Some(caps) = LABEL_RE.captures(line) {
        let rest = line[caps.get(0).map_or(0, |m| m.end())..].trim();
        let rest = rest.trim_end_matches('*').trim().to_string();
        return match caps[1].to_lowercase().as_str() {
            "video" => Line::Skip,
            "body" | "cuerpo" if rest.is_empty() => Line::Skip,
            "body" | "cuerpo" => Line::Body(rest),
            _ => Line::Title(strip_bold(&rest).trim().to_string()),
        };
    }
    Line::Body(line.to_string())
}

/// First block, then everything after it. A single block is split at the
/// sentence midpoint.
fn two_paragraphs(blocks: Vec<String>) -> Vec<String> {
    let mut iter = blocks.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let rest = iter.collect::<Vec<_>>().join(" ");
    if !rest.is_empty() {
        return vec![first, rest];
    }

    let sentences = split_sentences(&first);
    if sentences.len() < 2 {
        return vec![first];
    }
    let mid = sentences.len() / 2;
    vec![sentences[..mid].join(" "), sentences[mid..].join(" ")]
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_RE.find_iter(text) {
        out.push(text[start..m.start() + 1].trim().to_string());
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::SectionKind;

    fn section(body: &str) -> Section {
        Section {
            kind: SectionKind::Video,
            heading: "4. Video Section".into(),
            body: body.into(),
        }
    }

    #[test]
    fn labelled_title_and_body() {
        let body = "- **Title:** ¡Arma tu ramo eterno!\n- **Body:**\n  - Primer párrafo sobre el armado.\n\n  - Segundo párrafo sobre exhibición.\n- **Video:** ramo.mp4";
        let v = extract(Some(&section(body))).unwrap();
        assert_eq!(v.title.as_deref(), Some("¡Arma tu ramo eterno!"));
        assert_eq!(
            v.paragraphs,
            vec!["Primer párrafo sobre el armado.", "Segundo párrafo sobre exhibición."]
        );
    }

    #[test]
    fn stray_heading_markers_stripped() {
        let body = "##### ¡Construye y exhibe!\nUna línea.\nOtra línea.\n\n#### Final.";
        let v = extract(Some(&section(body))).unwrap();
        assert_eq!(v.title.as_deref(), Some("¡Construye y exhibe!"));
        assert_eq!(v.paragraphs, vec!["Una línea. Otra línea.", "Final."]);
        assert!(v.paragraphs.iter().all(|p| !p.contains('#')));
    }

    #[test]
    fn hash_prefixed_text_kept() {
        let body = "**¡Hola!**\n#1 en ventas este año.\n\nOtra línea.";
        let v = extract(Some(&section(body))).unwrap();
        assert_eq!(v.paragraphs, vec!["#1 en ventas este año.", "Otra línea."]);
    }

    #[test]
    fn single_block_split_by_sentences() {
        let body = "**¡Hola!**\nUno. Dos. Tres. Cuatro.";
        let v = extract(Some(&section(body))).unwrap();
        assert_eq!(v.title.as_deref(), Some("¡Hola!"));
        assert_eq!(v.paragraphs, vec!["Uno. Dos.", "Tres. Cuatro."]);
    }

    #[test]
    fn empty_section() {
        assert_eq!(extract(Some(&section("\n\n"))), None);
        assert_eq!(extract(None), None);
    }
}
