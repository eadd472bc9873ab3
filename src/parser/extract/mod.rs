pub mod bullets;
pub mod details;
pub mod faq;
pub mod name;
pub mod video;

use std::sync::LazyLock;

use regex::Regex;

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+•]|\d{1,2}[.)])\s+").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HEADING_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}(?:\s+|$)").unwrap());

/// Lowercase and drop Spanish diacritics so labels compare loosely.
pub fn fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'Á' | 'À' | 'Ä' => 'a',
            'é' | 'è' | 'ë' | 'É' | 'È' | 'Ë' => 'e',
            'í' | 'ì' | 'ï' | 'Í' | 'Ì' | 'Ï' => 'i',
            'ó' | 'ò' | 'ö' | 'Ó' | 'Ò' | 'Ö' => 'o',
            'ú' | 'ù' | 'ü' | 'Ú' | 'Ù' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Return the line content after a list marker, or `None` if it has none.
pub fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    LIST_MARKER_RE
        .find(trimmed)
        .map(|m| trimmed[m.end()..].trim())
}

/// Drop a leading list marker if present.
pub fn strip_list_marker(line: &str) -> &str {
    list_item(line).unwrap_or_else(|| line.trim())
}

/// Drop leading heading markers (`## `). `#1` and `#tag` are text, not markers.
pub fn strip_heading_marker(line: &str) -> &str {
    let trimmed = line.trim();
    HEADING_MARKER_RE
        .find(trimmed)
        .map_or(trimmed, |m| trimmed[m.end()..].trim())
}

pub fn collapse_ws(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").to_string()
}

pub fn strip_bold(s: &str) -> String {
    s.replace("**", "")
}

/// Join the lines of a block into one line, dropping list markers.
pub fn flatten_block(block: &str) -> String {
    let joined = block
        .lines()
        .map(strip_list_marker)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_ws(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_accents() {
        assert_eq!(fold("Viñetas Técnicas"), "vinetas tecnicas");
        assert_eq!(fold("ALTURA"), "altura");
    }

    #[test]
    fn list_markers() {
        assert_eq!(list_item("- uno"), Some("uno"));
        assert_eq!(list_item("  * dos "), Some("dos"));
        assert_eq!(list_item("3. tres"), Some("tres"));
        assert_eq!(list_item("• cuatro"), Some("cuatro"));
        assert_eq!(list_item("**bold** text"), None);
        assert_eq!(list_item("-sin espacio"), None);
    }

    #[test]
    fn heading_markers() {
        assert_eq!(strip_heading_marker("#### Final."), "Final.");
        assert_eq!(strip_heading_marker("  ##"), "");
        assert_eq!(strip_heading_marker("#1 en ventas"), "#1 en ventas");
        assert_eq!(strip_heading_marker("#ramo"), "#ramo");
    }

    #[test]
    fn flatten() {
        assert_eq!(flatten_block("- uno\n  dos\n\n- tres"), "uno dos tres");
    }
}
