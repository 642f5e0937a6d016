//! Operator CLI for the cpedict CPE dictionary.
//!
//! `import` consumes an already-parsed batch of entries (JSON Lines) and
//! runs the atomic generation replace; `search`, `list`, and `deprecated`
//! query the store. Feed retrieval and parsing live outside this tool.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cpedict_core::{AppConfig, BuildInfo, CpeEntry, DictionaryConfig, FetchType};
use cpedict_dictionary::{DictionaryStore, ReplaceProgress};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Parser)]
#[command(name = "cpedictctl")]
#[command(about = "Operator CLI for the cpedict CPE dictionary")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, env = "CPEDICT_CONFIG", default_value = "cpedict.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace one fetch type's entries with a batch from a JSON Lines file
    Import {
        /// Fetch type the batch belongs to (nvd or jvn)
        fetch_type: String,
        /// JSON Lines file of dictionary entries
        file: PathBuf,
        /// Attempts while the database is locked by another process
        #[arg(long, default_value_t = 10)]
        lock_retries: u32,
        /// Seconds to wait between lock retries
        #[arg(long, default_value_t = 3)]
        lock_wait_secs: u64,
    },
    /// Look up CPE identifiers by vendor and product (LIKE patterns allowed)
    Search {
        vendor: String,
        product: String,
    },
    /// List distinct vendor::product pairs
    List,
    /// Report whether a CPE URI is deprecated
    Deprecated {
        cpe_uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Import {
            fetch_type,
            file,
            lock_retries,
            lock_wait_secs,
        } => run_import(&config, &fetch_type, &file, lock_retries, lock_wait_secs).await,
        Commands::Search { vendor, product } => run_search(&config, &vendor, &product).await,
        Commands::List => run_list(&config).await,
        Commands::Deprecated { cpe_uri } => run_deprecated(&config, &cpe_uri).await,
    }
}

fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        figment = figment.merge(Toml::file(path));
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("CPEDICT_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .dictionary
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid dictionary configuration")?;
    Ok(config)
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn DictionaryStore>> {
    cpedict_dictionary::from_config(&config.dictionary)
        .await
        .context("failed to open dictionary store")
}

/// Open with bounded wait-and-reopen retry on lock contention. The store
/// itself never retries; that policy belongs here.
async fn open_with_retry(
    config: &DictionaryConfig,
    lock_retries: u32,
    lock_wait_secs: u64,
) -> Result<Arc<dyn DictionaryStore>> {
    let mut attempt = 0;
    loop {
        match cpedict_dictionary::from_config(config).await {
            Ok(store) => return Ok(store),
            Err(err) if err.is_locked() && attempt < lock_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    lock_retries,
                    "Database locked by another process, waiting before retry"
                );
                tokio::time::sleep(Duration::from_secs(lock_wait_secs)).await;
            }
            Err(err) => return Err(err).context("failed to open dictionary store"),
        }
    }
}

/// Read a JSON Lines file of entries, all of which must carry `fetch_type`.
fn read_entries(file: &Path, fetch_type: FetchType) -> Result<Vec<CpeEntry>> {
    let reader = std::io::BufReader::new(
        std::fs::File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );

    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: CpeEntry = serde_json::from_str(&line)
            .with_context(|| format!("invalid entry at {}:{}", file.display(), idx + 1))?;
        if entry.fetch_type != fetch_type {
            bail!(
                "entry at {}:{} is tagged {} but the import targets {}",
                file.display(),
                idx + 1,
                entry.fetch_type,
                fetch_type
            );
        }
        entries.push(entry);
    }
    Ok(entries)
}

struct LogProgress {
    total: usize,
}

impl ReplaceProgress for LogProgress {
    fn inserted(&self, rows: usize) {
        tracing::info!(rows, total = self.total, "Inserted entries");
    }
}

async fn run_import(
    config: &AppConfig,
    fetch_type: &str,
    file: &Path,
    lock_retries: u32,
    lock_wait_secs: u64,
) -> Result<()> {
    let fetch_type: FetchType = fetch_type.parse()?;
    let entries = read_entries(file, fetch_type)?;
    tracing::info!(count = entries.len(), fetch_type = %fetch_type, "Loaded entry batch");

    let store = open_with_retry(&config.dictionary, lock_retries, lock_wait_secs).await?;
    let build = BuildInfo::current();

    let mut meta = store
        .fetch_meta(&build)
        .await
        .context("failed to read fetch metadata")?;
    if !meta.is_compatible(&build) {
        store.close().await?;
        bail!(
            "stored schema version {} does not match this build ({}); \
             delete the database and import again",
            meta.schema_version,
            build.schema_version
        );
    }

    let progress = LogProgress {
        total: entries.len(),
    };
    store
        .replace_generation(fetch_type, &entries, Some(&progress))
        .await
        .context("failed to replace dictionary generation")?;

    meta.last_fetched_at = OffsetDateTime::now_utc();
    store
        .upsert_fetch_meta(&meta, &build)
        .await
        .context("failed to update fetch metadata")?;
    store.close().await?;

    tracing::info!(count = entries.len(), fetch_type = %fetch_type, "Dictionary updated");
    Ok(())
}

async fn run_search(config: &AppConfig, vendor: &str, product: &str) -> Result<()> {
    let store = open_store(config).await?;
    let (active, deprecated) = store
        .cpes_by_vendor_product(vendor, product)
        .await
        .context("lookup failed")?;
    for cpe_uri in &active {
        println!("{cpe_uri}");
    }
    for cpe_uri in &deprecated {
        println!("{cpe_uri} (deprecated)");
    }
    store.close().await?;
    Ok(())
}

async fn run_list(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    for pair in store.vendor_products().await.context("listing failed")? {
        println!("{pair}");
    }
    store.close().await?;
    Ok(())
}

async fn run_deprecated(config: &AppConfig, cpe_uri: &str) -> Result<()> {
    let store = open_store(config).await?;
    let deprecated = store
        .is_deprecated(cpe_uri)
        .await
        .context("point lookup failed")?;
    println!("{deprecated}");
    store.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(lines: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        (dir, path)
    }

    #[test]
    fn test_read_entries_skips_blank_lines() {
        let (_dir, path) = write_lines(&[
            r#"{"vendor":"v","product":"p","cpe_uri":"cpe:/a:v:p:1","fetch_type":"nvd"}"#,
            "",
            r#"{"vendor":"v","product":"p","cpe_uri":"cpe:/a:v:p:2","deprecated":true,"fetch_type":"nvd"}"#,
        ]);
        let entries = read_entries(&path, FetchType::Nvd).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].deprecated);
    }

    #[test]
    fn test_read_entries_rejects_mismatched_fetch_type() {
        let (_dir, path) = write_lines(&[
            r#"{"vendor":"v","product":"p","cpe_uri":"cpe:/a:v:p:1","fetch_type":"jvn"}"#,
        ]);
        let err = read_entries(&path, FetchType::Nvd).unwrap_err();
        assert!(err.to_string().contains("tagged jvn"));
    }

    #[test]
    fn test_read_entries_reports_line_of_invalid_json() {
        let (_dir, path) = write_lines(&[
            r#"{"vendor":"v","product":"p","cpe_uri":"cpe:/a:v:p:1","fetch_type":"nvd"}"#,
            "not json",
        ]);
        let err = read_entries(&path, FetchType::Nvd).unwrap_err();
        assert!(err.to_string().contains(":2"));
    }
}
