//! `gmp tools` - acquire providers and list their tools

use anyhow::bail;
use gmp_core::{ConfigLoader, ProviderClient, ToolCatalog};
use gmp_foundation::{CacheStore, Error, Settings};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub async fn list(settings: &Settings, servers: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let servers = match servers.map(Path::to_path_buf).or_else(|| settings.servers_file()) {
        Some(path) => path,
        None => {
            return Err(Error::InvalidInput(
                "no providers file; pass --servers or set GMP_SERVERS_FILE".to_string(),
            )
            .into())
        }
    };

    let cache = Arc::new(CacheStore::open(settings.cache_config()));
    let providers = ConfigLoader::new(Arc::clone(&cache)).load_providers(&servers)?;

    let client = ProviderClient::from_settings(cache, settings);
    let catalog = client.acquire_all(providers.enabled()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog_json(&catalog))?);
    } else {
        print_catalog(&catalog);
    }

    catalog.stop_all().await;

    let attempted = catalog.providers().count() + catalog.failures().len();
    if attempted > 0 && catalog.providers().count() == 0 {
        bail!("no provider could be started ({} failed)", catalog.failures().len());
    }
    Ok(())
}

fn catalog_json(catalog: &ToolCatalog) -> Value {
    let providers: Vec<Value> = catalog
        .providers()
        .map(|handle| {
            json!({
                "name": handle.name(),
                "state": handle.state(),
                "tools": handle.tools().len(),
            })
        })
        .collect();

    let tools: Vec<Value> = catalog
        .tools()
        .iter()
        .map(|entry| {
            json!({
                "name": entry.qualified_name,
                "provider": entry.provider,
                "tool": entry.tool.name,
                "description": entry.tool.description,
                "inputSchema": entry.tool.input_schema,
            })
        })
        .collect();

    let failures: serde_json::Map<String, Value> = catalog
        .failures()
        .iter()
        .map(|(name, error)| (name.clone(), Value::String(error.to_string())))
        .collect();

    json!({
        "providers": providers,
        "tools": tools,
        "failures": failures,
    })
}

fn print_catalog(catalog: &ToolCatalog) {
    if catalog.is_empty() && catalog.failures().is_empty() {
        println!("No enabled providers configured.");
        return;
    }

    for handle in catalog.providers() {
        println!("\n🔧 {} ({})", handle.name(), handle.state());
        for tool in handle.tools() {
            let description = tool.description.as_deref().unwrap_or("");
            let summary = description.lines().next().unwrap_or("");
            println!(
                "  {:<40} {}",
                gmp_core::qualified_name(handle.name(), &tool.name),
                summary
            );
        }
    }

    if !catalog.failures().is_empty() {
        println!();
        for (name, error) in catalog.failures() {
            eprintln!("warning: provider '{}' unavailable: {}", name, error);
        }
    }

    println!(
        "\n{} tools from {} provider(s)",
        catalog.len(),
        catalog.providers().count()
    );
}
