use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{collapse_ws, fold, strip_bold, strip_list_marker};
use crate::parser::sections::Section;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+(?:[.,]\d+)*").unwrap());
static THOUSANDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:([.,])\d{3})(?:[.,]\d{3})*$").unwrap());

/// Values the copy generator writes when it could not see a measurement.
pub const ABSENCE_PHRASES: &[&str] = &[
    "no observado en imagenes",
    "no observado",
    "no disponible",
    "no disponible en imagenes",
    "sin dato",
    "n/a",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKey {
    Width,
    Length,
    Height,
    PieceCount,
    Scale,
}

const LABELS: &[(DetailKey, &[&str])] = &[
    (DetailKey::PieceCount, &["piezas", "pieces", "bloques", "pcs"]),
    (DetailKey::Width, &["ancho", "width"]),
    (DetailKey::Length, &["longitud", "largo", "length", "profundidad"]),
    (DetailKey::Height, &["altura", "alto", "height"]),
    (DetailKey::Scale, &["escala", "scale"]),
];

pub type TechnicalDetails = BTreeMap<DetailKey, String>;

/// Label/value pairs from `- **Ancho:** 12 cm`, `**Ancho**: 12 cm`,
/// `Ancho: 12 cm` or `| Ancho | 12 cm |` lines. First occurrence wins.
pub fn extract(section: Option<&Section>) -> TechnicalDetails {
    let mut details = TechnicalDetails::new();
    let Some(section) = section else {
        return details;
    };

    for line in section.body.lines() {
        let Some((label, value)) = split_label(line) else {
            continue;
        };
        let Some(key) = match_label(&label) else {
            continue;
        };
        if is_absent(&value) {
            continue;
        }
        details.entry(key).or_insert(value);
    }
    details
}

fn split_label(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('|') {
        let cells: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if cells.len() >= 2 && !cells[1].chars().all(|c| c == '-' || c == ':') {
            return Some((strip_bold(cells[0]), collapse_ws(&strip_bold(cells[1]))));
        }
        return None;
    }

    let plain = strip_bold(strip_list_marker(line));
    let (label, value) = plain.split_once(':')?;
    let value = collapse_ws(value);
    if value.is_empty() {
        return None;
    }
    Some((label.trim().to_string(), value))
}

pub fn match_label(label: &str) -> Option<DetailKey> {
    let folded = fold(label);
    LABELS
        .iter()
        .find(|(_, words)| words.iter().any(|w| folded.contains(w)))
        .map(|(key, _)| *key)
}

pub fn is_absent(value: &str) -> bool {
    let folded = fold(value);
    let folded = folded.trim().trim_end_matches('.');
    folded.is_empty() || ABSENCE_PHRASES.contains(&folded)
}

/// First numeric token, decimal comma normalised to a period; units dropped.
/// "33,5 cm" → "33.5", "aprox. 12 cm" → "12".
pub fn leading_number(value: &str) -> Option<String> {
    let token = NUMBER_RE.find(value)?.as_str();
    let digits = token.trim_start_matches('-');
    let sign = if token.starts_with('-') { "-" } else { "" };

    let normalized = match digits.rfind([',', '.']) {
        None => digits.to_string(),
        Some(pos) => {
            let (int_part, frac) = digits.split_at(pos);
            let int_part: String = int_part.chars().filter(char::is_ascii_digit).collect();
            format!("{}.{}", int_part, &frac[1..])
        }
    };
    Some(format!("{}{}", sign, normalized))
}

/// Integer token that tolerates thousands separators: "1.200 piezas" → 1200.
pub fn leading_integer(value: &str) -> Option<i64> {
    let token = NUMBER_RE.find(value)?.as_str();
    if THOUSANDS_RE.is_match(token.trim_start_matches('-')) {
        let digits: String = token.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
        return digits.parse().ok();
    }
    let decimal: f64 = leading_number(token)?.parse().ok()?;
    Some(decimal.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::SectionKind;

    fn section(body: &str) -> Section {
        Section {
            kind: SectionKind::TechnicalDetails,
            heading: "3. Detalles Técnicos".into(),
            body: body.into(),
        }
    }

    #[test]
    fn label_variants() {
        let body = "- **Ancho:** 12 cm\n- **Longitud**: 30,5 cm\nAltura: 33.5 cm\n| Escala | 1:12 |\n- **Número de piezas:** 756";
        let d = extract(Some(&section(body)));
        assert_eq!(d[&DetailKey::Width], "12 cm");
        assert_eq!(d[&DetailKey::Length], "30,5 cm");
        assert_eq!(d[&DetailKey::Height], "33.5 cm");
        assert_eq!(d[&DetailKey::Scale], "1:12");
        assert_eq!(d[&DetailKey::PieceCount], "756");
    }

    #[test]
    fn absence_phrases_dropped() {
        let body = "- **Ancho:** No observado en imágenes\n- **Escala:** No disponible.\n- **Piezas:** 500";
        let d = extract(Some(&section(body)));
        assert_eq!(d.len(), 1);
        assert!(d.contains_key(&DetailKey::PieceCount));
    }

    #[test]
    fn non_numeric_value_kept_raw() {
        let d = extract(Some(&section("- **Ancho:** abc")));
        assert_eq!(d[&DetailKey::Width], "abc");
    }

    #[test]
    fn first_occurrence_wins() {
        let d = extract(Some(&section("- Alto: 10 cm\n- Alto: 20 cm")));
        assert_eq!(d[&DetailKey::Height], "10 cm");
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(leading_number("33,5 cm").as_deref(), Some("33.5"));
        assert_eq!(leading_number("aprox. 12 cm").as_deref(), Some("12"));
        assert_eq!(leading_number("-4.25").as_deref(), Some("-4.25"));
        assert_eq!(leading_number("abc"), None);
    }

    #[test]
    fn lenient_integers() {
        assert_eq!(leading_integer("756 piezas"), Some(756));
        assert_eq!(leading_integer("1.200 piezas"), Some(1200));
        assert_eq!(leading_integer("1,200"), Some(1200));
        assert_eq!(leading_integer("12.5"), Some(12));
        assert_eq!(leading_integer("muchas"), None);
    }

    #[test]
    fn missing_section() {
        assert!(extract(None).is_empty());
    }
}
