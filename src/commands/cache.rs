//! # Cache Command Implementation
//!
//! Inspects the shared repository cache.
//!
//! ## Subcommands
//!
//! - **`path <url>`**: Print the directory a remote URL maps to
//! - **`list`**: Display all cached repositories with their size and state

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use walkdir::WalkDir;

use changeport::cache::{CacheKey, CachedRepository, RepositoryCache};
use changeport::credentials::{self, CredentialConfig};
use changeport::defaults;
use changeport::git::BareRepository;

/// Inspect the repository cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The root directory for the repository cache.
    ///
    /// Defaults to the system cache directory (`~/.cache/changeport` on
    /// Linux). Can also be set with the `CHANGEPORT_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "CHANGEPORT_CACHE")]
    pub cache_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Print the cache location of a repository URL
    Path(PathArgs),
    /// List all cached repositories
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Remote repository URL
    pub url: String,

    /// Also print the normalized URL the location is derived from
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ListEntry {
    name: String,
    location: PathBuf,
    valid: bool,
    size: u64,
    credential_store: Option<PathBuf>,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs) -> Result<()> {
    let root = args.cache_root.unwrap_or_else(defaults::default_cache_root);
    // Read-only: the credential setting only matters when creating entries.
    let cache = RepositoryCache::new(root, CredentialConfig::Disabled);
    match args.command {
        CacheSubcommand::Path(path_args) => execute_path(&cache, path_args),
        CacheSubcommand::List(list_args) => execute_list(&cache, list_args),
    }
}

fn execute_path(cache: &RepositoryCache, args: PathArgs) -> Result<()> {
    let location = cache
        .location(&args.url)
        .with_context(|| format!("Cannot derive a cache key for '{}'", args.url))?;
    if args.verbose {
        let key = CacheKey::for_url(&args.url)?;
        println!("{}", key.normalized_url());
    }
    println!("{}", location.display());
    Ok(())
}

fn execute_list(cache: &RepositoryCache, args: ListArgs) -> Result<()> {
    let entries: Vec<ListEntry> = cache.entries()?.into_iter().map(describe).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No cached repositories found in: {}", cache.root().display());
        return Ok(());
    }

    println!("Cached repositories:\n");
    println!("{:<64} {:>7} {:>12}", "NAME", "STATE", "SIZE");
    println!("{}", "-".repeat(85));
    for entry in &entries {
        println!(
            "{:<64} {:>7} {:>12}",
            entry.name,
            if entry.valid { "ok" } else { "invalid" },
            format_size(entry.size)
        );
    }
    println!("\nTotal: {} cached repositories", entries.len());
    Ok(())
}

fn describe(entry: CachedRepository) -> ListEntry {
    let credential_store = if entry.valid {
        BareRepository::open(&entry.location)
            .and_then(|repo| credentials::configured_store_file(&repo))
            .ok()
            .flatten()
    } else {
        None
    };
    ListEntry {
        size: directory_size(&entry.location),
        name: entry.dir_name,
        location: entry.location,
        valid: entry.valid,
        credential_store,
    }
}

fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Human readable size, e.g. `1.5 MB`.
fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_path_is_stable_across_spellings() {
        let cache = RepositoryCache::new("/cache", CredentialConfig::Disabled);
        let a = cache.location("https://Example.com/org/repo/").unwrap();
        let b = cache.location("https://example.com:443/org/repo").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("/cache/git_repos"));
    }

    #[test]
    fn test_list_reports_created_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RepositoryCache::new(
            temp_dir.path(),
            CredentialConfig::store_file("/secrets/git-credentials"),
        );
        cache.get_or_create("https://example.com/org/repo").unwrap();

        let entries: Vec<ListEntry> = cache.entries().unwrap().into_iter().map(describe).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].valid);
        assert!(entries[0].size > 0);
        assert_eq!(
            entries[0].credential_store,
            Some(PathBuf::from("/secrets/git-credentials"))
        );
    }

    #[test]
    fn test_list_empty_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp_dir.path(), CredentialConfig::Disabled);
        execute_list(&cache, ListArgs { json: true }).unwrap();
        execute_list(&cache, ListArgs { json: false }).unwrap();
    }
}
