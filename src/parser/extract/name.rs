use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{collapse_ws, strip_bold, strip_list_marker};
use crate::parser::sections::Section;

static PIECES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*(\d[\d.,]*)\s*(?:piezas|pzs|pcs|pieces|bloques)?\s*\)\s*$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductName {
    /// Full name, piece-count token included; used as the product title.
    pub text: String,
    pub piece_count: Option<u32>,
}

pub fn extract(section: Option<&Section>) -> Option<ProductName> {
    let line = section?
        .body
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())?;

    let text = collapse_ws(&strip_bold(strip_list_marker(line)));
    if text.is_empty() {
        return None;
    }

    let piece_count = PIECES_RE.captures(&text).and_then(|caps| {
        let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    });

    Some(ProductName { text, piece_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::SectionKind;

    fn section(body: &str) -> Section {
        Section {
            kind: SectionKind::ProductName,
            heading: "0. Nombre del Producto".into(),
            body: body.into(),
        }
    }

    #[test]
    fn trailing_piece_count() {
        let n = extract(Some(&section("**Ramo de Flores Eternas (1.200 piezas)**"))).unwrap();
        assert_eq!(n.text, "Ramo de Flores Eternas (1.200 piezas)");
        assert_eq!(n.piece_count, Some(1200));
    }

    #[test]
    fn no_piece_count() {
        let n = extract(Some(&section("\n- Auto Deportivo Rojo\n"))).unwrap();
        assert_eq!(n.text, "Auto Deportivo Rojo");
        assert_eq!(n.piece_count, None);
    }

    #[test]
    fn empty() {
        assert_eq!(extract(Some(&section("  "))), None);
        assert_eq!(extract(None), None);
    }
}
