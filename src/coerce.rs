use serde::Serialize;
use tracing::{debug, warn};

use crate::parser::extract::details::{leading_integer, leading_number};
use crate::parser::extract::{collapse_ws, strip_bold};
use crate::parser::fields::{RawFieldMap, RawValue};
use crate::rich_text::RichTextNode;
use crate::schema::{FieldSpec, ValueKind, FIELDS, VIDEO_BODY_KEY};

/// Body written to the video-section field on every run, whatever the
/// generated document says.
pub const VIDEO_BODY: [&str; 2] = [
    "Sumérgete en una experiencia de armado que combina creatividad y relajación. \
     Con una altura de 33.5 cm, este ramo se convierte en el centro de atención de cualquier habitación.",
    "Detalles como los pétalos realistas y el jarrón elegante elevan su valor de exhibición. \
     Ideal para coleccionistas y entusiastas de la decoración temática.",
];

const DECIMAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    ShortText(String),
    RichText(RichTextNode),
    Decimal(f64),
    Integer(i64),
}

impl FieldValue {
    /// String form sent as the metafield `value`.
    pub fn to_remote(&self) -> String {
        match self {
            FieldValue::ShortText(s) => s.clone(),
            FieldValue::RichText(node) => node.to_json(),
            FieldValue::Decimal(d) => d.to_string(),
            FieldValue::Integer(i) => i.to_string(),
        }
    }

    /// Whether a stored remote value already holds this value.
    pub fn matches_remote(&self, remote: &str) -> bool {
        let remote = remote.trim();
        match self {
            FieldValue::ShortText(s) => s.trim() == remote,
            FieldValue::RichText(node) => {
                serde_json::from_str::<RichTextNode>(remote).is_ok_and(|stored| stored == *node)
            }
            FieldValue::Decimal(d) => remote
                .parse::<f64>()
                .is_ok_and(|stored| (stored - d).abs() < DECIMAL_EPSILON),
            FieldValue::Integer(i) => match remote.parse::<i64>() {
                Ok(stored) => stored == *i,
                Err(_) => remote.parse::<f64>().is_ok_and(|f| f == *i as f64),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesiredStateEntry {
    pub key: &'static str,
    pub kind: ValueKind,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("no numeric value")]
    NotNumeric,
    #[error("empty after normalisation")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("field {key} skipped: {reason} (raw: {raw:?})")]
pub struct CoercionSkip {
    pub key: &'static str,
    pub raw: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default, Serialize)]
pub struct Coerced {
    pub entries: Vec<DesiredStateEntry>,
    pub skipped: Vec<CoercionSkip>,
}

/// Convert one raw value to the representation its field expects.
pub fn coerce(raw: &RawValue, spec: &FieldSpec) -> Result<DesiredStateEntry, CoercionSkip> {
    let text = match raw {
        RawValue::Text(s) => s.clone(),
        RawValue::Paragraphs(p) => p.join("\n\n"),
    };
    let skip = |reason| CoercionSkip {
        key: spec.key,
        raw: text.clone(),
        reason,
    };

    let value = match spec.kind {
        ValueKind::ShortText => {
            let s = collapse_ws(&strip_bold(&text));
            if s.is_empty() {
                return Err(skip(SkipReason::Empty));
            }
            FieldValue::ShortText(s)
        }
        ValueKind::RichText => {
            let node = match raw {
                RawValue::Text(s) => RichTextNode::from_markdown(s),
                RawValue::Paragraphs(p) => RichTextNode::from_paragraphs(p),
            };
            if node.plain_text().trim().is_empty() {
                return Err(skip(SkipReason::Empty));
            }
            FieldValue::RichText(node)
        }
        ValueKind::Decimal => leading_number(&text)
            .and_then(|n| n.parse::<f64>().ok())
            .filter(|d| d.is_finite())
            .map(FieldValue::Decimal)
            .ok_or_else(|| skip(SkipReason::NotNumeric))?,
        ValueKind::Integer => leading_integer(&text)
            .map(FieldValue::Integer)
            .ok_or_else(|| skip(SkipReason::NotNumeric))?,
    };

    Ok(DesiredStateEntry {
        key: spec.key,
        kind: spec.kind,
        value,
    })
}

/// Coerce every parsed field in schema order. The video body is replaced by
/// [`VIDEO_BODY`] before coercion; skips are logged and collected.
pub fn coerce_all(raw: &RawFieldMap) -> Coerced {
    let video_body = RawValue::Paragraphs(VIDEO_BODY.iter().map(|p| p.to_string()).collect());
    let mut out = Coerced::default();

    for spec in FIELDS {
        let value = if spec.key == VIDEO_BODY_KEY {
            if raw.contains_key(VIDEO_BODY_KEY) {
                debug!(key = spec.key, "parsed video body replaced by fixed text");
            }
            &video_body
        } else {
            match raw.get(spec.key) {
                Some(v) => v,
                None => continue,
            }
        };

        match coerce(value, spec) {
            Ok(entry) => out.entries.push(entry),
            Err(skip) => {
                warn!(key = skip.key, raw = %skip.raw, reason = %skip.reason, "coercion skipped");
                out.skipped.push(skip);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{fields::field_values, parse_document};
    use crate::schema::lookup;

    impl Coerced {
        fn get(&self, key: &str) -> Option<&DesiredStateEntry> {
            self.entries.iter().find(|e| e.key == key)
        }
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn non_numeric_decimal_skipped() {
        let mut raw = RawFieldMap::new();
        raw.insert("ancho", text("abc"));
        raw.insert("alto", text("33,5 cm"));
        raw.insert("vineta_1", text("Una **viñeta**."));

        let coerced = coerce_all(&raw);
        assert_eq!(coerced.skipped.len(), 1);
        assert_eq!(coerced.skipped[0].key, "ancho");
        assert_eq!(coerced.skipped[0].reason, SkipReason::NotNumeric);
        assert!(coerced.get("ancho").is_none());
        assert_eq!(coerced.get("alto").unwrap().value, FieldValue::Decimal(33.5));
        assert!(coerced.get("vineta_1").is_some());
    }

    #[test]
    fn video_body_always_constant() {
        let expected = FieldValue::RichText(RichTextNode::from_paragraphs(&VIDEO_BODY));

        let mut raw = RawFieldMap::new();
        raw.insert(VIDEO_BODY_KEY, RawValue::Paragraphs(vec!["Otro texto.".into()]));
        assert_eq!(coerce_all(&raw).get(VIDEO_BODY_KEY).unwrap().value, expected);

        // Present even when the document had no video section at all.
        let empty = coerce_all(&RawFieldMap::new());
        assert_eq!(empty.entries.len(), 1);
        assert_eq!(empty.get(VIDEO_BODY_KEY).unwrap().value, expected);
    }

    #[test]
    fn integer_thousands() {
        let entry = coerce(&text("1.200"), lookup("piezas").unwrap()).unwrap();
        assert_eq!(entry.value, FieldValue::Integer(1200));
        assert_eq!(entry.value.to_remote(), "1200");
    }

    #[test]
    fn short_text_normalised() {
        let entry = coerce(&text("  **¡Hola   mundo!** "), lookup("sec5_title").unwrap()).unwrap();
        assert_eq!(entry.value, FieldValue::ShortText("¡Hola mundo!".into()));
        let err = coerce(&text("****"), lookup("escala").unwrap()).unwrap_err();
        assert_eq!(err.reason, SkipReason::Empty);
    }

    #[test]
    fn remote_comparison_by_kind() {
        assert!(FieldValue::Decimal(18.0).matches_remote("18"));
        assert!(FieldValue::Decimal(33.5).matches_remote("33.50"));
        assert!(!FieldValue::Decimal(33.5).matches_remote("33.4"));
        assert!(FieldValue::Integer(756).matches_remote("756"));
        assert!(FieldValue::Integer(756).matches_remote("756.0"));
        assert!(FieldValue::ShortText("1:1".into()).matches_remote(" 1:1 "));

        let node = RichTextNode::from_markdown("El **motor**.");
        let pretty = serde_json::to_string_pretty(&node).unwrap();
        assert!(FieldValue::RichText(node.clone()).matches_remote(&pretty));
        assert!(!FieldValue::RichText(node).matches_remote("El motor."));
    }

    #[test]
    fn canonical_document_coerces_cleanly() {
        let md = std::fs::read_to_string("tests/fixtures/canonical.md").unwrap();
        let coerced = coerce_all(&field_values(&parse_document(&md)));
        assert!(coerced.skipped.is_empty(), "{:?}", coerced.skipped);
        assert_eq!(coerced.entries.len(), FIELDS.len());
        assert_eq!(coerced.get("piezas").unwrap().value, FieldValue::Integer(756));
        assert_eq!(coerced.get("escala").unwrap().value, FieldValue::ShortText("1:1".into()));
    }
}
