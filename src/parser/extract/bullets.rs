use super::{collapse_ws, list_item};
use crate::parser::sections::Section;
use crate::schema::BULLET_SLOTS;

/// One bullet per list-marked line, document order, capped at the schema's slots.
pub fn extract(section: Option<&Section>) -> Vec<String> {
    let Some(section) = section else {
        return Vec::new();
    };

    section
        .body
        .lines()
        .filter_map(list_item)
        .map(collapse_ws)
        .filter(|b| !b.is_empty())
        .take(BULLET_SLOTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::SectionKind;

    fn section(body: &str) -> Section {
        Section {
            kind: SectionKind::Bullets,
            heading: "1. Viñetas".into(),
            body: body.into(),
        }
    }

    #[test]
    fn keeps_order_and_trims() {
        let s = section("-   Primera  \nintro suelta\n* Segunda\n+ Tercera");
        assert_eq!(extract(Some(&s)), vec!["Primera", "Segunda", "Tercera"]);
    }

    #[test]
    fn capped_at_five() {
        let body = (1..=7).map(|i| format!("- b{}", i)).collect::<Vec<_>>().join("\n");
        let got = extract(Some(&section(&body)));
        assert_eq!(got.len(), 5);
        assert_eq!(got[4], "b5");
    }

    #[test]
    fn bold_kept_for_rich_text() {
        let got = extract(Some(&section("- Con **756 piezas** para armar")));
        assert_eq!(got, vec!["Con **756 piezas** para armar"]);
    }

    #[test]
    fn missing_section() {
        assert!(extract(None).is_empty());
    }
}
