//! `gmp cache` subcommands

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use gmp_core::{ConfigLoader, ProviderClient};
use gmp_foundation::{CacheStats, CacheStore, Error, Namespace, Settings};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

fn open_store(settings: &Settings) -> Arc<CacheStore> {
    Arc::new(CacheStore::open(settings.cache_config()))
}

// ============================================================================
// status
// ============================================================================

pub fn status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let store = open_store(settings);
    let stats = store
        .stats()
        .with_context(|| format!("failed to read cache at {}", store.root().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &CacheStats) {
    println!("\n📦 Tool-provider cache\n");
    println!("  Status:    {}", if stats.enabled { "enabled" } else { "disabled" });
    println!("  Location:  {}", stats.root.display());
    println!("  TTL:       {}", format_ttl(stats.ttl_secs));
    println!(
        "  Entries:   {} ({}, {} expired)",
        stats.total_entries,
        stats.size_readable(),
        stats.expired
    );
    println!();

    println!("  {:<10} {:<10} {:>8} {:>10} {:>8}", "TYPE", "DIR", "ENTRIES", "SIZE", "EXPIRED");
    println!("  {}", "-".repeat(50));
    for ns in &stats.namespaces {
        println!(
            "  {:<10} {:<10} {:>8} {:>10} {:>8}",
            ns.namespace.as_str(),
            format!("{}/", ns.namespace.dir_name()),
            ns.entries,
            format_bytes(ns.bytes),
            ns.expired
        );
    }

    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!();
        println!("  Oldest:    {}", format_time(oldest));
        println!("  Newest:    {}", format_time(newest));
    }
    println!();
}

fn format_ttl(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{}h ({}s)", s / 3600, s),
        s if s >= 60 && s % 60 == 0 => format!("{}m ({}s)", s / 60, s),
        s => format!("{}s", s),
    }
}

fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}

fn entries(count: usize) -> String {
    format!("{} cache entr{}", count, if count == 1 { "y" } else { "ies" })
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// ============================================================================
// clear
// ============================================================================

pub fn clear(
    settings: &Settings,
    namespace: Option<Namespace>,
    id: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let target = match (namespace, id) {
        (Some(ns), Some(id)) => format!("the {} cache entry '{}'", ns, id),
        (Some(ns), None) => format!("all {} cache entries", ns),
        (None, None) => "ALL cache entries".to_string(),
        (None, Some(_)) => return Err(Error::InvalidInput("--id requires --type".to_string()).into()),
    };

    if !force && !confirm(&format!("Remove {}?", target))? {
        bail!("aborted");
    }

    let store = open_store(settings);
    // config 엔트리는 절대 경로로 저장된다
    let resolved = match (namespace, id) {
        (Some(Namespace::Config), Some(id)) => Some(
            std::fs::canonicalize(id)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| id.to_string()),
        ),
        (_, id) => id.map(str::to_string),
    };
    let removed = store.invalidate(namespace, resolved.as_deref())?;

    println!("✓ Removed {}", entries(removed));
    Ok(())
}

/// stdin 에서 y/N 확인
fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// refresh
// ============================================================================

pub async fn refresh(settings: &Settings, name: Option<&str>, servers: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(settings);

    // 이름 확인이 먼저: 오타로 엔트리를 지우지 않는다
    let providers = match servers {
        Some(servers) => {
            let providers = ConfigLoader::new(Arc::clone(&store)).load_providers(servers)?;
            if let Some(name) = name {
                if providers.get(name).is_none() {
                    return Err(Error::InvalidInput(format!(
                        "provider '{}' is not defined in {}",
                        name,
                        servers.display()
                    ))
                    .into());
                }
            }
            Some(providers)
        }
        None => None,
    };

    let removed = store.invalidate(Some(Namespace::Provider), name)?;
    match name {
        Some(name) => println!("✓ Invalidated cached tools for '{}' ({})", name, entries(removed)),
        None => println!("✓ Invalidated cached tools for all providers ({})", entries(removed)),
    }

    let Some(providers) = providers else {
        return Ok(());
    };

    let specs: Vec<_> = match name {
        Some(name) => providers.get(name).into_iter().collect(),
        None => providers.enabled().collect(),
    };

    let client = ProviderClient::from_settings(store, settings);
    let catalog = client.acquire_all(specs).await;

    for handle in catalog.providers() {
        println!("  ✓ {:<20} {} tools ({})", handle.name(), handle.tools().len(), handle.state());
    }
    for (provider, error) in catalog.failures() {
        println!("  ✗ {:<20} {}", provider, error);
    }
    catalog.stop_all().await;

    if !catalog.failures().is_empty() {
        bail!("{} provider(s) failed to refresh", catalog.failures().len());
    }
    Ok(())
}

// ============================================================================
// prune
// ============================================================================

pub fn prune(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings);
    let removed = store.prune_expired()?;
    println!("✓ Pruned {} (expired)", entries(removed));
    Ok(())
}
