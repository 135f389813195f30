//! Provider 캐시 통합 테스트 - 가짜 stdio MCP 서버 (POSIX sh)
//!
//! `cargo test -p gmp-core --test provider_cache`

#![cfg(unix)]

use gmp_core::{ConfigLoader, Error, ProviderClient, ProviderState};
use gmp_foundation::{CacheConfig, CacheStore, Namespace, ProviderSpec};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .to_string()
}

struct Harness {
    dir: TempDir,
    launch_log: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let launch_log = dir.path().join("launches.log");
        Self { dir, launch_log }
    }

    fn cache_root(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    fn cache(&self) -> Arc<CacheStore> {
        Arc::new(CacheStore::open(CacheConfig::at(self.cache_root())))
    }

    fn client(&self) -> ProviderClient {
        ProviderClient::new(self.cache()).with_handshake_timeout(Duration::from_secs(5))
    }

    fn spec(&self, name: &str) -> ProviderSpec {
        ProviderSpec::new(name, "/bin/sh")
            .arg(fixture("fake_mcp_server.sh"))
            .env("FAKE_LAUNCH_LOG", self.launch_log.to_string_lossy().to_string())
    }

    fn launches(&self) -> usize {
        std::fs::read_to_string(&self.launch_log)
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    fn has_entry(&self, name: &str) -> bool {
        CacheStore::open(CacheConfig::at(self.cache_root()))
            .read_entry(Namespace::Provider, name)
            .unwrap()
            .is_some()
    }
}

async fn wait_for_state(handle: &gmp_core::ProviderHandle, expected: ProviderState) {
    for _ in 0..100 {
        if handle.state() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("provider never reached {:?} (now {:?})", expected, handle.state());
}

fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// ============================================================================
// Cold / warm cache
// ============================================================================

#[tokio::test]
async fn test_cold_cache_launches_once() {
    let h = Harness::new();
    let client = h.client();

    let (handle, tools) = client.acquire_tools(&h.spec("memory")).await.unwrap();

    assert_eq!(h.launches(), 1);
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "crash"]);
    assert_eq!(handle.state(), ProviderState::Ready);
    assert!(handle.is_running());
    assert!(h.has_entry("memory"));

    handle.stop().await.unwrap();
    assert_eq!(handle.state(), ProviderState::Stopped);
}

#[tokio::test]
async fn test_warm_cache_launches_nothing() {
    let h = Harness::new();
    let spec = h.spec("memory");

    let (first, _) = h.client().acquire_tools(&spec).await.unwrap();
    first.stop().await.unwrap();
    assert_eq!(h.launches(), 1);

    // 새 프로세스 시작을 흉내: 새 store, 같은 디렉토리
    let (second, tools) = h.client().acquire_tools(&spec).await.unwrap();
    assert_eq!(h.launches(), 1);
    assert_eq!(tools.len(), 2);
    assert_eq!(second.state(), ProviderState::ReadyFromCache);
    assert!(!second.is_running());
}

#[tokio::test]
async fn test_invalidated_entry_relaunches() {
    let h = Harness::new();
    let spec = h.spec("memory");
    let client = h.client();

    let (first, _) = client.acquire_tools(&spec).await.unwrap();
    first.stop().await.unwrap();

    assert_eq!(client.invalidate("memory").unwrap(), 1);

    let (second, tools) = client.acquire_tools(&spec).await.unwrap();
    assert_eq!(h.launches(), 2);
    assert!(!tools.is_empty());
    assert_eq!(second.state(), ProviderState::Ready);
    second.stop().await.unwrap();
}

#[tokio::test]
async fn test_disabled_cache_always_launches() {
    let h = Harness::new();
    let cache = Arc::new(CacheStore::open(CacheConfig::at(h.cache_root()).disabled()));
    let client = ProviderClient::new(cache);
    let spec = h.spec("memory");

    for _ in 0..2 {
        let (handle, tools) = client.acquire_tools(&spec).await.unwrap();
        assert_eq!(tools.len(), 2);
        handle.stop().await.unwrap();
    }

    assert_eq!(h.launches(), 2);
    assert!(!h.has_entry("memory"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_handshake_timeout_kills_process() {
    let h = Harness::new();
    let pid_file = h.dir.path().join("silent.pid");
    let spec = ProviderSpec::new("silent", "/bin/sh")
        .arg(fixture("silent_mcp_server.sh"))
        .env("FAKE_PID_FILE", pid_file.to_string_lossy().to_string());
    let client = ProviderClient::new(h.cache()).with_handshake_timeout(Duration::from_millis(500));

    match client.acquire_tools(&spec).await {
        Err(Error::ProviderHandshakeTimeout { provider, timeout }) => {
            assert_eq!(provider, "silent");
            assert_eq!(timeout, Duration::from_millis(500));
        }
        other => panic!("unexpected: {:?}", other.map(|(_, tools)| tools)),
    }

    assert!(!h.has_entry("silent"));
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(!process_alive(pid.trim()));
}

#[tokio::test]
async fn test_per_provider_timeout_override() {
    let h = Harness::new();
    let spec = ProviderSpec::new("silent", "/bin/sh")
        .arg(fixture("silent_mcp_server.sh"))
        .handshake_timeout(1);
    let client = ProviderClient::new(h.cache()).with_handshake_timeout(Duration::from_secs(60));

    let err = client.acquire_tools(&spec).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ProviderHandshakeTimeout { timeout, .. } if timeout == Duration::from_secs(1)
    ));
}

#[tokio::test]
async fn test_malformed_handshake_is_protocol_error() {
    let h = Harness::new();
    let spec = ProviderSpec::new("bogus", "/bin/sh").arg(fixture("bogus_mcp_server.sh"));

    let err = h.client().acquire_tools(&spec).await.unwrap_err();
    assert!(matches!(err, Error::ProviderHandshakeProtocol { .. }));
    assert!(!h.has_entry("bogus"));
}

#[tokio::test]
async fn test_closed_stdout_is_protocol_error() {
    let h = Harness::new();
    let spec = ProviderSpec::new("mute", "/bin/sh").arg(fixture("closed_stdout_mcp_server.sh"));

    match h.client().acquire_tools(&spec).await {
        Err(Error::ProviderHandshakeProtocol { provider, reason }) => {
            assert_eq!(provider, "mute");
            assert!(reason.contains("stdout closed"));
        }
        other => panic!("unexpected: {:?}", other.map(|(_, tools)| tools)),
    }
    assert!(!h.has_entry("mute"));
}

#[tokio::test]
async fn test_cancelled_acquisition_kills_process() {
    let h = Harness::new();
    let pid_file = h.dir.path().join("silent.pid");
    let spec = ProviderSpec::new("silent", "/bin/sh")
        .arg(fixture("silent_mcp_server.sh"))
        .env("FAKE_PID_FILE", pid_file.to_string_lossy().to_string());
    let client = ProviderClient::new(h.cache()).with_handshake_timeout(Duration::from_secs(60));

    // 핸드셰이크 도중 future drop
    let result = tokio::time::timeout(Duration::from_millis(800), client.acquire_tools(&spec)).await;
    assert!(result.is_err());

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let mut alive = true;
    for _ in 0..40 {
        alive = process_alive(pid.trim());
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!alive);
    assert!(!h.has_entry("silent"));
}

#[tokio::test]
async fn test_crash_after_ready_invalidates_cache() {
    let h = Harness::new();
    let client = h.client();

    let (handle, _) = client.acquire_tools(&h.spec("memory")).await.unwrap();
    assert!(h.has_entry("memory"));

    let err = handle.call_tool("crash", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::ProviderExited { .. }));

    wait_for_state(&handle, ProviderState::Failed).await;
    assert!(!h.has_entry("memory"));

    // 재시도 없음
    let err = handle.call_tool("echo", json!({"text": "again"})).await.unwrap_err();
    assert!(matches!(err, Error::ProviderExited { .. }));
}

// ============================================================================
// Tool calls
// ============================================================================

#[tokio::test]
async fn test_cached_handle_launches_on_first_call() {
    let h = Harness::new();
    let spec = h.spec("memory");

    let (first, _) = h.client().acquire_tools(&spec).await.unwrap();
    first.stop().await.unwrap();

    let (handle, _) = h.client().acquire_tools(&spec).await.unwrap();
    assert_eq!(handle.state(), ProviderState::ReadyFromCache);
    assert_eq!(h.launches(), 1);

    let result = handle.call_tool("echo", json!({"text": "hello"})).await.unwrap();
    assert_eq!(result.text(), Some("hello"));
    assert!(!result.is_error);
    assert_eq!(h.launches(), 2);
    assert!(handle.is_running());

    // 이미 떠 있는 프로세스 재사용
    handle.call_tool("echo", json!({"text": "again"})).await.unwrap();
    assert_eq!(h.launches(), 2);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_arguments_never_launch() {
    let h = Harness::new();
    let spec = h.spec("memory");

    let (first, _) = h.client().acquire_tools(&spec).await.unwrap();
    first.stop().await.unwrap();

    let (handle, _) = h.client().acquire_tools(&spec).await.unwrap();
    let err = handle.call_tool("echo", json!({})).await.unwrap_err();
    match err {
        Error::InvalidArguments { tool, problems } => {
            assert_eq!(tool, "echo");
            assert!(problems[0].contains("'text'"));
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(h.launches(), 1);
    assert_eq!(handle.state(), ProviderState::ReadyFromCache);
}

// ============================================================================
// Concurrency / catalog
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_acquisition_launches_once() {
    let h = Harness::new();
    let client = h.client();
    let spec = h.spec("memory");

    let (a, b) = tokio::join!(client.acquire_tools(&spec), client.acquire_tools(&spec));
    let (a, _) = a.unwrap();
    let (b, _) = b.unwrap();

    assert_eq!(h.launches(), 1);
    let mut states = vec![a.state(), b.state()];
    states.sort_by_key(|s| s.as_str());
    assert_eq!(states, vec![ProviderState::Ready, ProviderState::ReadyFromCache]);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}

#[tokio::test]
async fn test_acquire_all_from_providers_file() {
    let h = Harness::new();
    let servers = h.dir.path().join("mcp_servers.json");
    let config = json!({
        "mcpServers": {
            "memory": {
                "command": "/bin/sh",
                "args": [fixture("fake_mcp_server.sh")],
                "env": {"FAKE_LAUNCH_LOG": h.launch_log.to_string_lossy()}
            },
            "missing": {"command": "definitely-not-a-real-binary-gmp"},
            "off": {"command": "/bin/sh", "enabled": false}
        }
    });
    std::fs::write(&servers, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let cache = h.cache();
    let providers = ConfigLoader::new(cache.clone()).load_providers(&servers).unwrap();
    let client = ProviderClient::new(cache);
    let catalog = client.acquire_all(providers.enabled()).await;

    let names: Vec<_> = catalog.tools().iter().map(|t| t.qualified_name.as_str()).collect();
    assert_eq!(names, vec!["memory__echo", "memory__crash"]);
    assert!(matches!(catalog.failures().get("missing"), Some(Error::ProviderLaunch { .. })));
    assert!(catalog.provider("off").is_none());

    let result = catalog.call("memory__echo", json!({"text": "via catalog"})).await.unwrap();
    assert_eq!(result.text(), Some("via catalog"));

    catalog.stop_all().await;
    assert_eq!(h.launches(), 1);
}
