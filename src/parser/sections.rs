use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::extract::fold;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:\s+(.*?))?\s*#*$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s*[.):\-]?\s*").unwrap());

/// Unnumbered headings open a section only when the whole title is one of these.
const SECTION_NAMES: &[(&str, SectionKind)] = &[
    ("nombre del producto", SectionKind::ProductName),
    ("product name", SectionKind::ProductName),
    ("vinetas", SectionKind::Bullets),
    ("bullets", SectionKind::Bullets),
    ("bullet points", SectionKind::Bullets),
    ("faq", SectionKind::Faq),
    ("faqs", SectionKind::Faq),
    ("preguntas frecuentes", SectionKind::Faq),
    ("detalles tecnicos", SectionKind::TechnicalDetails),
    ("technical details", SectionKind::TechnicalDetails),
    ("video", SectionKind::Video),
    ("video section", SectionKind::Video),
    ("seccion de video", SectionKind::Video),
];

/// Heading depths that may open a section; `##`, `###` and `####` are equivalent.
const SECTION_DEPTHS: std::ops::RangeInclusive<usize> = 2..=4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ProductName,
    Bullets,
    Faq,
    TechnicalDetails,
    Video,
}

impl SectionKind {
    /// Position in the template, from `0. Nombre del Producto` to `4. Video Section`.
    pub fn position(self) -> u8 {
        match self {
            SectionKind::ProductName => 0,
            SectionKind::Bullets => 1,
            SectionKind::Faq => 2,
            SectionKind::TechnicalDetails => 3,
            SectionKind::Video => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: String,
    pub body: String,
}

/// Split a generated document into its template sections.
///
/// Text before the first recognised heading is dropped. A section heading
/// only opens a section that comes later in the template than the current
/// one; repeated or out-of-order section headings are dropped. Any other
/// heading inside a section stays in the body without its markers.
pub fn split_sections(markdown: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<(SectionKind, String)> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if let Some(caps) = HEADING_RE.captures(line.trim()) {
            let depth = caps[1].len();
            let title = caps.get(2).map_or("", |m| m.as_str()).trim();
            let named = classify_heading(title).filter(|_| SECTION_DEPTHS.contains(&depth));

            match named {
                Some(kind) if opens_after(current.as_ref().map(|(k, _)| *k), kind) => {
                    if let Some((kind, heading)) = current.take() {
                        sections.push(finish(kind, heading, &mut body));
                    }
                    current = Some((kind, title.to_string()));
                }
                Some(_) => {}
                None if current.is_some() && !title.is_empty() => body.push(title),
                None => {}
            }
            continue;
        }

        if current.is_some() {
            body.push(line);
        }
    }

    if let Some((kind, heading)) = current {
        sections.push(finish(kind, heading, &mut body));
    }

    sections
}

fn opens_after(current: Option<SectionKind>, next: SectionKind) -> bool {
    current.map_or(true, |k| next.position() > k.position())
}

fn finish(kind: SectionKind, heading: String, body: &mut Vec<&str>) -> Section {
    let text = body.join("\n").trim_matches(|c| c == '\n' || c == '\r').to_string();
    body.clear();
    Section {
        kind,
        heading,
        body: text,
    }
}

/// Map a heading title ("3. Detalles Técnicos", "**FAQ**") to its section.
/// Numbered titles match by keyword; unnumbered ones must be a section name.
pub fn classify_heading(title: &str) -> Option<SectionKind> {
    let stripped = title.replace('*', "");
    let stripped = stripped.trim();

    match NUMBER_RE.find(stripped) {
        Some(m) => classify_keyword(&fold(&stripped[m.end()..])),
        None => {
            let folded = fold(stripped);
            let folded = folded.trim_end_matches(':').trim();
            SECTION_NAMES
                .iter()
                .find(|(name, _)| *name == folded)
                .map(|(_, kind)| *kind)
        }
    }
}

fn classify_keyword(folded: &str) -> Option<SectionKind> {
    if folded.contains("nombre") || folded.contains("product name") {
        Some(SectionKind::ProductName)
    } else if folded.contains("vineta") || folded.contains("bullet") {
        Some(SectionKind::Bullets)
    } else if folded.contains("faq") || folded.contains("preguntas") {
        Some(SectionKind::Faq)
    } else if folded.contains("detalle") || folded.contains("tecnic") {
        Some(SectionKind::TechnicalDetails)
    } else if folded.contains("video") {
        Some(SectionKind::Video)
    } else {
        None
    }
}

pub fn find(sections: &[Section], kind: SectionKind) -> Option<&Section> {
    sections.iter().find(|s| s.kind == kind)
}

// ── Tests ──
