use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifacts::{self, results_path};
use crate::coerce::{coerce_all, CoercionSkip};
use crate::parser::{fields::field_values, parse_document};
use crate::reconcile::{reconcile, Reconciliation, RemoteState, WriteOperation};
use crate::schema::FIELDS;
use crate::shop::{product_gid, MetafieldStore, SavedMetafield, ShopError};
use crate::validate::{validate, ValidationFailed};

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub product_id: String,
    pub input: PathBuf,
    /// Known `{key: metafield id}` mapping; skips the remote fetch.
    pub ids_json: Option<PathBuf>,
    pub staged_path: PathBuf,
    pub apply_title: bool,
    pub ensure_definitions: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Artifacts from an earlier run removed because nothing was written.
    NoOp { removed_stale: Vec<PathBuf> },
    Staged { operations: usize, path: PathBuf },
    Written { operations: usize, batches: usize, results: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "title", rename_all = "snake_case")]
pub enum TitleOutcome {
    NoName,
    Unchanged,
    Skipped { proposed: String },
    Declined { proposed: String },
    Updated { from: String, to: String },
}

#[derive(Debug, Serialize)]
pub struct PushReport {
    pub product_id: String,
    pub writes: WriteOutcome,
    pub skipped: Vec<CoercionSkip>,
    pub title: TitleOutcome,
}

/// A batch the shop rejected. Earlier batches stay written.
#[derive(Debug, thiserror::Error)]
#[error("batch {batch}/{total} failed for keys [{keys}] after {completed} written batch(es): {source}")]
pub struct WriteFailure {
    pub batch: usize,
    pub total: usize,
    pub keys: String,
    pub completed: usize,
    #[source]
    pub source: ShopError,
}

#[derive(Debug, Serialize)]
struct BatchResult {
    batch: usize,
    keys: Vec<String>,
    saved: Vec<SavedMetafield>,
}

#[derive(Debug, Serialize)]
struct PushResults {
    product_id: String,
    finished_at: DateTime<Utc>,
    batches: Vec<BatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `(current, proposed) -> apply?`
pub type ConfirmTitle<'a> = &'a mut dyn FnMut(&str, &str) -> bool;

/// Parse, validate and reconcile one generated document against the
/// product, then write whatever differs.
pub fn push(
    store: &dyn MetafieldStore,
    opts: &PushOptions,
    confirm: ConfirmTitle<'_>,
) -> Result<PushReport> {
    let input = artifacts::read_input(&opts.input)?;
    let doc = parse_document(&input.content);
    info!(
        sections = doc.sections.len(),
        bullets = doc.bullets.len(),
        faqs = doc.faqs.len(),
        details = doc.details.len(),
        "parsed document"
    );

    let verdict = validate(&doc, &input.content);
    if !verdict.passed {
        return Err(ValidationFailed { verdict }.into());
    }

    let coerced = coerce_all(&field_values(&doc));

    if opts.ensure_definitions {
        let report = store
            .ensure_definitions(FIELDS)
            .context("creating metafield definitions")?;
        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "metafield definitions"
        );
    }

    let remote = match &opts.ids_json {
        Some(path) => RemoteState::from_id_map(&artifacts::read_id_map(path)?),
        None => RemoteState::from_metafields(
            &store
                .fetch_metafields(&opts.product_id)
                .context("fetching current metafields")?,
        ),
    };

    info!(remote = remote.len(), desired = coerced.entries.len(), "reconciling");
    let writes = match reconcile(&coerced.entries, &remote) {
        Reconciliation::NoOp => {
            info!("remote already up to date");
            let mut removed_stale = Vec::new();
            for path in [opts.staged_path.clone(), results_path(&opts.staged_path)] {
                if artifacts::remove_stale(&path)? {
                    removed_stale.push(path);
                }
            }
            WriteOutcome::NoOp { removed_stale }
        }
        recon @ Reconciliation::Writes(_) => {
            let ops = recon.operations();
            artifacts::stage_writes(&opts.staged_path, &opts.product_id, ops)?;
            if opts.dry_run {
                WriteOutcome::Staged {
                    operations: ops.len(),
                    path: opts.staged_path.clone(),
                }
            } else {
                let results = results_path(&opts.staged_path);
                let batches = apply_batches(store, &opts.product_id, &recon, &results)?;
                WriteOutcome::Written {
                    operations: ops.len(),
                    batches,
                    results,
                }
            }
        }
    };

    let proposed = doc.product_name.as_ref().map(|n| n.text.as_str());
    let title = if opts.dry_run {
        match proposed {
            Some(p) => TitleOutcome::Skipped { proposed: p.to_string() },
            None => TitleOutcome::NoName,
        }
    } else {
        update_title(store, &opts.product_id, proposed, opts.apply_title, confirm)?
    };

    Ok(PushReport {
        product_id: opts.product_id.clone(),
        writes,
        skipped: coerced.skipped,
        title,
    })
}

/// Send every batch in order; stop at the first failure. The results file
/// is written in both cases.
fn apply_batches(
    store: &dyn MetafieldStore,
    product_id: &str,
    recon: &Reconciliation,
    results: &Path,
) -> Result<usize> {
    let batches: Vec<&[WriteOperation]> = recon.batches().collect();
    let total = batches.len();
    let mut log = PushResults {
        product_id: product_gid(product_id),
        finished_at: Utc::now(),
        batches: Vec::with_capacity(total),
        error: None,
    };

    for (idx, batch) in batches.iter().enumerate() {
        let keys: Vec<String> = batch.iter().map(|op| op.key().to_string()).collect();
        match store.set_metafields(product_id, batch) {
            Ok(saved) => {
                info!(batch = idx + 1, total, count = batch.len(), "batch written");
                log.batches.push(BatchResult {
                    batch: idx + 1,
                    keys,
                    saved,
                });
            }
            Err(source) => {
                let failure = WriteFailure {
                    batch: idx + 1,
                    total,
                    keys: keys.iter().join(", "),
                    completed: idx,
                    source,
                };
                log.error = Some(failure.to_string());
                log.finished_at = Utc::now();
                if let Err(e) = artifacts::write_json(results, &log) {
                    warn!(error = %e, "could not record partial results");
                }
                return Err(failure.into());
            }
        }
    }

    log.finished_at = Utc::now();
    artifacts::write_json(results, &log)?;
    Ok(total)
}

/// Propose the parsed product name as the product title.
pub fn update_title(
    store: &dyn MetafieldStore,
    product_id: &str,
    proposed: Option<&str>,
    apply: bool,
    confirm: ConfirmTitle<'_>,
) -> Result<TitleOutcome> {
    let Some(proposed) = proposed.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(TitleOutcome::NoName);
    };

    let current = store
        .product_title(product_id)
        .context("fetching product title")?;
    if current.trim() == proposed {
        return Ok(TitleOutcome::Unchanged);
    }

    if !apply && !confirm(&current, proposed) {
        return Ok(TitleOutcome::Declined {
            proposed: proposed.to_string(),
        });
    }

    store
        .update_title(product_id, proposed)
        .context("updating product title")?;
    info!(from = %current, to = %proposed, "title updated");
    Ok(TitleOutcome::Updated {
        from: current,
        to: proposed.to_string(),
    })
}
