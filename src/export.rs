use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shop::{product_gid, MetafieldStore, RemoteMetafield, ShopError};

/// Snapshot of a product's metafields as written by `export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetafieldExport {
    pub shop: String,
    pub product_id: String,
    pub count: usize,
    pub metafields: Vec<RemoteMetafield>,
    pub fetched_at: DateTime<Utc>,
}

pub fn export_metafields(
    store: &dyn MetafieldStore,
    shop: &str,
    product_id: &str,
) -> Result<MetafieldExport, ShopError> {
    let metafields = store.fetch_metafields(product_id)?;
    Ok(MetafieldExport {
        shop: shop.to_string(),
        product_id: product_gid(product_id),
        count: metafields.len(),
        metafields,
        fetched_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Namespace,
    Key,
    Type,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "namespace" | "" => Ok(SortKey::Namespace),
            "key" => Ok(SortKey::Key),
            "type" => Ok(SortKey::Type),
            other => Err(format!("unknown sort key {:?}", other)),
        }
    }
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Namespace => "namespace",
            SortKey::Key => "key",
            SortKey::Type => "type",
        }
    }

    fn compare(self, a: &RemoteMetafield, b: &RemoteMetafield) -> Ordering {
        let by_ns = || a.namespace.cmp(&b.namespace).then_with(|| a.key.cmp(&b.key));
        match self {
            SortKey::Namespace => by_ns(),
            SortKey::Key => a.key.cmp(&b.key).then_with(|| a.namespace.cmp(&b.namespace)),
            SortKey::Type => a.kind.cmp(&b.kind).then_with(by_ns),
        }
    }
}

/// Filter by a case-insensitive substring of namespace, key, type or value,
/// then sort.
pub fn select<'a>(
    metafields: &'a [RemoteMetafield],
    sort: SortKey,
    query: Option<&str>,
) -> Vec<&'a RemoteMetafield> {
    let needle = query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_lowercase);
    let mut rows: Vec<&RemoteMetafield> = metafields
        .iter()
        .filter(|m| match &needle {
            None => true,
            Some(q) => [&m.namespace, &m.key, &m.kind, &m.value]
                .iter()
                .any(|field| field.to_lowercase().contains(q.as_str())),
        })
        .collect();
    rows.sort_by(|a, b| sort.compare(a, b));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mf(namespace: &str, key: &str, kind: &str, value: &str) -> RemoteMetafield {
        RemoteMetafield {
            id: format!("gid://shopify/Metafield/{}", key),
            namespace: namespace.into(),
            key: key.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }

    fn sample() -> Vec<RemoteMetafield> {
        vec![
            mf("custom", "piezas", "number_integer", "756"),
            mf("custom", "alto", "number_decimal", "33.5"),
            mf("global", "title_tag", "single_line_text_field", "Ramo"),
        ]
    }

    #[test]
    fn sorting() {
        let data = sample();
        let keys = |sort| select(&data, sort, None).iter().map(|m| m.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(SortKey::Namespace), vec!["alto", "piezas", "title_tag"]);
        assert_eq!(keys(SortKey::Key), vec!["alto", "piezas", "title_tag"]);
        assert_eq!(keys(SortKey::Type), vec!["alto", "piezas", "title_tag"]);
        assert_eq!("TYPE".parse::<SortKey>(), Ok(SortKey::Type));
        assert!("value".parse::<SortKey>().is_err());
    }

    #[test]
    fn filtering() {
        let data = sample();
        let hits = select(&data, SortKey::Key, Some("RAMO"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].namespace, "global");
        assert_eq!(select(&data, SortKey::Key, Some("  ")).len(), 3);
        assert_eq!(select(&data, SortKey::Key, Some("decimal")).len(), 1);
    }
}
