use std::collections::BTreeMap;

use serde::Serialize;

use super::extract::details::DetailKey;
use super::ParsedDocument;
use crate::schema::{self, BULLET_SLOTS, FAQ_SLOTS, VIDEO_BODY_KEY, VIDEO_TITLE_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Paragraphs(Vec<String>),
}

pub type RawFieldMap = BTreeMap<&'static str, RawValue>;

const DETAIL_FIELDS: &[(DetailKey, &str)] = &[
    (DetailKey::Width, "ancho"),
    (DetailKey::Length, "longitud"),
    (DetailKey::Height, "alto"),
    (DetailKey::PieceCount, "piezas"),
    (DetailKey::Scale, "escala"),
];

/// Map a parsed document onto schema keys. Absent parts produce no entry.
pub fn field_values(doc: &ParsedDocument) -> RawFieldMap {
    let mut map = RawFieldMap::new();

    for (idx, bullet) in doc.bullets.iter().take(BULLET_SLOTS).enumerate() {
        map.insert(schema::bullet_key(idx), RawValue::Text(bullet.clone()));
    }

    for (idx, pair) in doc.faqs.iter().take(FAQ_SLOTS).enumerate() {
        map.insert(schema::faq_key(idx), RawValue::Text(pair.answer.clone()));
    }

    for &(detail, key) in DETAIL_FIELDS {
        if let Some(value) = doc.details.get(&detail) {
            map.insert(key, RawValue::Text(value.clone()));
        }
    }

    if let Some(video) = &doc.video {
        if let Some(title) = &video.title {
            map.insert(VIDEO_TITLE_KEY, RawValue::Text(title.clone()));
        }
        if !video.paragraphs.is_empty() {
            map.insert(VIDEO_BODY_KEY, RawValue::Paragraphs(video.paragraphs.clone()));
        }
    }

    map
}
