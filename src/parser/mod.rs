pub mod extract;
pub mod fields;
pub mod sections;

use serde::Serialize;

use extract::details::TechnicalDetails;
use extract::faq::FaqPair;
use extract::name::ProductName;
use extract::video::VideoSection;
use sections::{Section, SectionKind};

/// Everything recovered from one generated document. Each part is optional
/// on its own; a missing section leaves its part empty.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub sections: Vec<Section>,
    pub product_name: Option<ProductName>,
    pub bullets: Vec<String>,
    pub faqs: Vec<FaqPair>,
    pub details: TechnicalDetails,
    pub video: Option<VideoSection>,
}

/// Two-pass pipeline: markdown → sections → extracted parts. Never fails.
pub fn parse_document(markdown: &str) -> ParsedDocument {
    let sections = sections::split_sections(markdown);
    let get = |kind| sections::find(&sections, kind);

    let product_name = extract::name::extract(get(SectionKind::ProductName));
    let bullets = extract::bullets::extract(get(SectionKind::Bullets));
    let faqs = extract::faq::extract(get(SectionKind::Faq));
    let details = extract::details::extract(get(SectionKind::TechnicalDetails));
    let video = extract::video::extract(get(SectionKind::Video));

    ParsedDocument {
        sections,
        product_name,
        bullets,
        faqs,
        details,
        video,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract::details::DetailKey;

    fn parse(fixture: &str) -> ParsedDocument {
        let md = std::fs::read_to_string(format!("tests/fixtures/{}.md", fixture)).unwrap();
        parse_document(&md)
    }

    #[test]
    fn canonical_document() {
        let doc = parse("canonical");
        let name = doc.product_name.as_ref().unwrap();
        assert_eq!(name.text, "Ramo de Flores Eternas (756 piezas)");
        assert_eq!(name.piece_count, Some(756));
        assert_eq!(doc.bullets.len(), 5);
        assert_eq!(doc.faqs.len(), 3);
        assert!(doc.faqs[1].answer.contains("**tallos flexibles**"));
        assert_eq!(doc.details.len(), 5);
        assert_eq!(doc.details[&DetailKey::Height], "33,5 cm");
        let video = doc.video.as_ref().unwrap();
        assert_eq!(video.title.as_deref(), Some("¡Un ramo que nunca se marchita!"));
        assert_eq!(video.paragraphs.len(), 2);
    }

    #[test]
    fn variant_document() {
        let doc = parse("variant");
        assert!(doc.product_name.is_none());
        assert_eq!(doc.bullets.len(), 5, "bullets capped: {:?}", doc.bullets);
        assert_eq!(doc.faqs.len(), 2);
        assert_eq!(doc.faqs[0].answer, "Incluye un **motor** de retroceso y dirección funcional.");
        assert_eq!(doc.details[&DetailKey::Width], "abc");
        assert!(!doc.details.contains_key(&DetailKey::Scale));

        // The repeated video heading and the deeper heading must not open sections.
        assert_eq!(
            doc.sections.iter().filter(|s| s.kind == SectionKind::Video).count(),
            1
        );
        let video = doc.video.as_ref().unwrap();
        assert!(video.paragraphs.iter().all(|p| !p.contains('#')));
        assert_eq!(video.title.as_deref(), Some("¡Acelera tu colección!"));
    }

    #[test]
    fn emphasis_heading_stays_in_video_body() {
        let plain = parse("canonical");
        let raw = std::fs::read_to_string("tests/fixtures/canonical.md").unwrap();
        let md = format!("{}\n\n#### ¡Detalles que enamoran!\nSegundo párrafo extra.", raw.trim_end());

        let doc = parse_document(&md);
        assert_eq!(doc.sections.len(), plain.sections.len());
        assert_eq!(doc.details, plain.details);
        let video = doc.video.as_ref().unwrap();
        assert_eq!(video.title, plain.video.as_ref().unwrap().title);
        assert!(video.paragraphs.last().unwrap().ends_with("Segundo párrafo extra."));
    }

    #[test]
    fn refusal_document() {
        let doc = parse("refusal");
        assert!(doc.sections.is_empty());
        assert!(doc.bullets.is_empty());
        assert!(doc.faqs.is_empty());
        assert!(doc.details.is_empty());
        assert!(doc.video.is_none());
    }

    #[test]
    fn garbage_never_panics() {
        for md in ["", "###", "### 2. FAQ\n?**?**", "### 3. Detalles\n| | |\n:", "#### 4. Video\n#\n-"] {
            let _ = parse_document(md);
        }
    }
}
