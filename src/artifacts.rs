use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::reconcile::WriteOperation;
use crate::schema::{self, NAMESPACE};
use crate::shop::{metafield_gid, product_gid};

pub const MARKDOWN_FORMAT: &str = "markdown";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{0} has no content")]
    EmptyContent(PathBuf),
    #[error("{path} has format {format:?}, expected \"markdown\"")]
    UnsupportedFormat { path: PathBuf, format: String },
    #[error("{0} must be a JSON object of key to metafield id")]
    NotAnIdMap(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Generated copy as written by `generate` and read by `push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub content: String,
    #[serde(default = "markdown_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

fn markdown_format() -> String {
    MARKDOWN_FORMAT.to_string()
}

impl InputDocument {
    pub fn markdown(content: String, model: &str) -> Self {
        Self {
            content,
            format: markdown_format(),
            model: Some(model.to_string()),
            generated_at: Some(Utc::now()),
        }
    }
}

pub fn read_input(path: &Path) -> Result<InputDocument, ArtifactError> {
    let text = fs::read_to_string(path).map_err(io_err(path))?;
    let doc: InputDocument = serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if !doc.format.eq_ignore_ascii_case(MARKDOWN_FORMAT) {
        return Err(ArtifactError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: doc.format,
        });
    }
    if doc.content.trim().is_empty() {
        return Err(ArtifactError::EmptyContent(path.to_path_buf()));
    }
    Ok(doc)
}

/// `{key: id}` where id is a metafield gid or its numeric tail.
pub fn read_id_map(path: &Path) -> Result<BTreeMap<String, String>, ArtifactError> {
    let text = fs::read_to_string(path).map_err(io_err(path))?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Object(object) = value else {
        return Err(ArtifactError::NotAnIdMap(path.to_path_buf()));
    };

    let mut ids = BTreeMap::new();
    for (key, id) in object {
        let id = match id {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            other => {
                warn!(%key, value = %other, "ignoring id map entry");
                continue;
            }
        };
        if schema::lookup(&key).is_none() {
            warn!(%key, "id map entry is not a managed field");
        }
        ids.insert(key, metafield_gid(&id));
    }
    Ok(ids)
}

/// Numeric tail of a product id, used in artifact names.
fn id_tail(product_id: &str) -> &str {
    product_id.trim().rsplit('/').next().unwrap_or(product_id)
}

pub fn staged_path(product_id: &str) -> PathBuf {
    PathBuf::from(format!("put_updates_{}.json", id_tail(product_id)))
}

/// `put_updates_1.json` → `put_updates_1_results.json`.
pub fn results_path(staged: &Path) -> PathBuf {
    let stem = staged
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "put_updates".to_string());
    staged.with_file_name(format!("{}_results.json", stem))
}

pub fn export_path(product_id: &str) -> PathBuf {
    PathBuf::from(format!("metafields_{}.json", id_tail(product_id)))
}

#[derive(Debug, Serialize)]
struct StagedWrites<'a> {
    product_id: String,
    namespace: &'a str,
    staged_at: DateTime<Utc>,
    count: usize,
    operations: &'a [WriteOperation],
}

/// Record the write request before it is sent.
pub fn stage_writes(
    path: &Path,
    product_id: &str,
    ops: &[WriteOperation],
) -> Result<(), ArtifactError> {
    let staged = StagedWrites {
        product_id: product_gid(product_id),
        namespace: NAMESPACE,
        staged_at: Utc::now(),
        count: ops.len(),
        operations: ops,
    };
    write_json(path, &staged)?;
    info!(path = %path.display(), count = ops.len(), "staged writes");
    Ok(())
}

/// Remove an artifact left from an earlier run. Returns whether a file was
/// removed.
pub fn remove_stale(path: &Path) -> Result<bool, ArtifactError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale artifact");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path)(e)),
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    fs::write(path, text).map_err(io_err(path))
}
