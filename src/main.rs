mod artifacts;
mod coerce;
mod export;
mod generate;
mod parser;
mod pipeline;
mod reconcile;
mod rich_text;
mod schema;
mod serve;
mod settings;
mod shop;
mod validate;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;

use pipeline::{PushOptions, TitleOutcome, WriteOutcome};
use settings::{GeneratorSettings, ShopSettings};
use shop::ShopClient;

#[derive(Parser)]
#[command(name = "copysync", about = "Sync generated product copy into shop metafields")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a generated document and write its fields to a product
    Push {
        /// Product id (numeric or gid)
        #[arg(long)]
        product_id: String,
        /// Input document: {"content": "<markdown>", "format": "markdown"}
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        shop: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// {key: metafield id} mapping; skips fetching current metafields
        #[arg(long)]
        ids_json: Option<PathBuf>,
        /// Staged write request path (default: put_updates_<id>.json)
        #[arg(long)]
        out_json: Option<PathBuf>,
        /// Update the product title without asking
        #[arg(long)]
        apply_title: bool,
        /// Create the metafield definitions first
        #[arg(long)]
        ensure_definitions: bool,
        /// Stage the write request but send nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a product's current metafields to JSON
    Export {
        #[arg(long)]
        product_id: String,
        #[arg(long)]
        shop: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Output path (default: metafields_<id>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Browse product metafields over HTTP
    Serve {
        #[arg(short, long, default_value = "8000")]
        port: u16,
        #[arg(long)]
        shop: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Generate copy from product screenshots
    Generate {
        /// Directory of screenshots
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
    /// Parse and validate a document locally, printing the result as JSON
    Parse {
        #[arg(long)]
        input: PathBuf,
    },
}

fn shop_client(shop: Option<String>, token: Option<String>) -> anyhow::Result<ShopClient> {
    let settings = ShopSettings::load()?.with_overrides(shop, token);
    Ok(ShopClient::new(&settings)?)
}

fn ask_title(current: &str, proposed: &str) -> bool {
    println!("Current title:  {}", current);
    println!("Proposed title: {}", proposed);
    print!("Update product title? [y/N] ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "s" | "si" | "sí")
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Push {
            product_id,
            input,
            shop,
            token,
            ids_json,
            out_json,
            apply_title,
            ensure_definitions,
            dry_run,
        } => {
            let client = shop_client(shop, token)?;
            let opts = PushOptions {
                staged_path: out_json.unwrap_or_else(|| artifacts::staged_path(&product_id)),
                product_id,
                input,
                ids_json,
                apply_title,
                ensure_definitions,
                dry_run,
            };
            let report = pipeline::push(&client, &opts, &mut ask_title)?;

            for skip in &report.skipped {
                println!("Skipped {}: {} (raw: {:?})", skip.key, skip.reason, skip.raw);
            }
            match &report.writes {
                WriteOutcome::NoOp { removed_stale } => {
                    println!("No changes for product {}.", report.product_id);
                    for path in removed_stale {
                        println!("Removed stale {}", path.display());
                    }
                }
                WriteOutcome::Staged { operations, path } => {
                    println!("Dry run: {} operation(s) staged in {}", operations, path.display());
                }
                WriteOutcome::Written {
                    operations,
                    batches,
                    results,
                } => {
                    println!(
                        "Wrote {} metafield(s) in {} batch(es). Results: {}",
                        operations,
                        batches,
                        results.display()
                    );
                }
            }
            match &report.title {
                TitleOutcome::Updated { from, to } => println!("Title: {:?} -> {:?}", from, to),
                TitleOutcome::Declined { proposed } => println!("Title left as is (proposed {:?})", proposed),
                TitleOutcome::Skipped { proposed } => println!("Title not touched in dry run (proposed {:?})", proposed),
                TitleOutcome::Unchanged | TitleOutcome::NoName => {}
            }
            Ok(())
        }
        Commands::Export {
            product_id,
            shop,
            token,
            out,
        } => {
            let client = shop_client(shop, token)?;
            let export = export::export_metafields(&client, client.shop(), &product_id)
                .context("fetching metafields")?;
            let out = out.unwrap_or_else(|| artifacts::export_path(&product_id));
            artifacts::write_json(&out, &export)?;
            println!("Exported {} metafield(s) to {}", export.count, out.display());
            Ok(())
        }
        Commands::Serve { port, shop, token } => {
            let client = shop_client(shop, token)?;
            serve::run(&client, client.shop(), port)
        }
        Commands::Generate { images, out, model } => {
            let mut settings = GeneratorSettings::load()?;
            if let Some(model) = model {
                settings.model = model;
            }
            let generator = generate::OpenAiGenerator::new(&settings)?;
            let doc = generate::run(&generator, &images, &out)?;
            println!(
                "Generated {} chars of copy with {} -> {}",
                doc.content.chars().count(),
                settings.model,
                out.display()
            );
            Ok(())
        }
        Commands::Parse { input } => {
            let doc = artifacts::read_input(&input)?;
            let parsed = parser::parse_document(&doc.content);
            let verdict = validate::validate(&parsed, &doc.content);
            let coerced = coerce::coerce_all(&parser::fields::field_values(&parsed));
            let out = json!({
                "document": parsed,
                "verdict": verdict,
                "desired": coerced.entries,
                "skipped": coerced.skipped,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            if verdict.passed {
                Ok(())
            } else {
                Err(validate::ValidationFailed { verdict }.into())
            }
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}
