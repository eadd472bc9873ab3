use serde::{Deserialize, Serialize};

/// Namespace every managed metafield lives under.
pub const NAMESPACE: &str = "custom";

/// Max metafields per `metafieldsSet` call.
pub const MAX_BATCH: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    ShortText,
    RichText,
    Decimal,
    Integer,
}

impl ValueKind {
    /// Type name the commerce platform uses for this kind.
    pub fn remote_type(self) -> &'static str {
        match self {
            ValueKind::ShortText => "single_line_text_field",
            ValueKind::RichText => "rich_text_field",
            ValueKind::Decimal => "number_decimal",
            ValueKind::Integer => "number_integer",
        }
    }
}

/// Validation bucket a field counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredGroup {
    Bullets,
    Faq,
    TechnicalDetails,
}

impl RequiredGroup {
    pub const ALL: [RequiredGroup; 3] = [
        RequiredGroup::Bullets,
        RequiredGroup::Faq,
        RequiredGroup::TechnicalDetails,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RequiredGroup::Bullets => "bullets (1. Viñetas)",
            RequiredGroup::Faq => "faq (2. FAQ)",
            RequiredGroup::TechnicalDetails => "technical details (3. Detalles Técnicos)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: ValueKind,
    pub group: Option<RequiredGroup>,
}

const fn field(
    key: &'static str,
    name: &'static str,
    kind: ValueKind,
    group: Option<RequiredGroup>,
) -> FieldSpec {
    FieldSpec { key, name, kind, group }
}

use RequiredGroup::*;
use ValueKind::*;

pub static FIELDS: &[FieldSpec] = &[
    field("vineta_1", "Viñeta 1", RichText, Some(Bullets)),
    field("vineta_2", "Viñeta 2", RichText, Some(Bullets)),
    field("vineta_3", "Viñeta 3", RichText, Some(Bullets)),
    field("vineta_4", "Viñeta 4", RichText, Some(Bullets)),
    field("vineta_5", "Viñeta 5", RichText, Some(Bullets)),
    field("faq_2", "FAQ 2", RichText, Some(Faq)),
    field("faq_3", "FAQ 3", RichText, Some(Faq)),
    field("faq_4", "FAQ 4", RichText, Some(Faq)),
    field("ancho", "Ancho", Decimal, Some(TechnicalDetails)),
    field("longitud", "Longitud", Decimal, Some(TechnicalDetails)),
    field("alto", "Alto", Decimal, Some(TechnicalDetails)),
    field("piezas", "Piezas", Integer, Some(TechnicalDetails)),
    field("escala", "Escala", ShortText, Some(TechnicalDetails)),
    field("sec5_title", "Sec5 Title", ShortText, None),
    field("sec5_body", "Sec5 Body", RichText, None),
];

/// Key holding the video-section body, always written from [`crate::coerce::VIDEO_BODY`].
pub const VIDEO_BODY_KEY: &str = "sec5_body";
pub const VIDEO_TITLE_KEY: &str = "sec5_title";

pub fn lookup(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

pub fn bullet_key(idx: usize) -> &'static str {
    FIELDS[idx].key
}

pub fn faq_key(idx: usize) -> &'static str {
    FIELDS[5 + idx].key
}

pub const BULLET_SLOTS: usize = 5;
pub const FAQ_SLOTS: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_unique() {
        let keys: HashSet<_> = FIELDS.iter().map(|f| f.key).collect();
        assert_eq!(keys.len(), FIELDS.len());
    }

    #[test]
    fn slot_keys() {
        assert_eq!(bullet_key(0), "vineta_1");
        assert_eq!(bullet_key(BULLET_SLOTS - 1), "vineta_5");
        assert_eq!(faq_key(0), "faq_2");
        assert_eq!(faq_key(FAQ_SLOTS - 1), "faq_4");
    }

    #[test]
    fn video_fields_not_required() {
        assert!(lookup(VIDEO_BODY_KEY).unwrap().group.is_none());
        assert!(lookup(VIDEO_TITLE_KEY).unwrap().group.is_none());
        assert_eq!(lookup("piezas").unwrap().kind, ValueKind::Integer);
    }
}
