//! Provider process launch
//!
//! 실행 설정 → `Command` 구성 → spawn → 핸드셰이크.
//! 캐시 hit 경로에서는 호출되지 않는다.

use super::handle::{ProviderRecord, ProviderState, StateCell};
use crate::mcp::{McpSession, McpTransport, StdioTransport, DEFAULT_REQUEST_TIMEOUT};
use gmp_foundation::{
    CacheStore, Error, EnvSecrets, Namespace, ProviderSpec, Result, SecretProvider,
    DEFAULT_HANDSHAKE_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// 실행 중인 provider 프로세스
pub(crate) struct LiveProcess {
    pub transport: Arc<StdioTransport>,
    pub session: Arc<McpSession>,
}

/// client 와 handle 이 공유하는 실행 환경
#[derive(Clone)]
pub(crate) struct ProviderContext {
    pub cache: Arc<CacheStore>,
    pub secrets: Arc<dyn SecretProvider>,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl ProviderContext {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            cache,
            secrets: Arc::new(EnvSecrets),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// 프로세스 실행 + 핸드셰이크
    ///
    /// 실패하면 프로세스를 종료하고, 상태를 `Failed`로 바꾸고,
    /// 해당 provider 의 캐시 엔트리를 지운다.
    pub async fn launch(&self, spec: &ProviderSpec, state: &StateCell) -> Result<(LiveProcess, ProviderRecord)> {
        match self.try_launch(spec, state).await {
            Ok(launched) => Ok(launched),
            Err(e) => {
                warn!("Provider '{}' failed to start: {}", spec.name, e);
                *state.lock() = ProviderState::Failed;
                self.cache.invalidate_quietly(Namespace::Provider, &spec.name);
                Err(e)
            }
        }
    }

    async fn try_launch(&self, spec: &ProviderSpec, state: &StateCell) -> Result<(LiveProcess, ProviderRecord)> {
        spec.validate().map_err(|reason| Error::launch(&spec.name, reason))?;

        *state.lock() = ProviderState::Launching;
        let command = self.build_command(spec)?;
        info!("Launching provider '{}': {} {}", spec.name, spec.command, spec.args.join(" "));

        let transport = Arc::new(
            StdioTransport::spawn(&spec.name, command)
                .await?
                .with_request_timeout(self.request_timeout),
        );
        let session = Arc::new(McpSession::new(
            spec.name.clone(),
            Arc::clone(&transport) as Arc<dyn McpTransport>,
        ));

        *state.lock() = ProviderState::Handshaking;
        let timeout = spec.effective_timeout(self.handshake_timeout);

        let outcome = match tokio::time::timeout(timeout, session.handshake()).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(Error::RequestTimeout { .. })) | Err(_) => Err(Error::ProviderHandshakeTimeout {
                provider: spec.name.clone(),
                timeout,
            }),
            Ok(Err(e)) => Err(e),
        };

        let (init, tools) = match outcome {
            Ok(result) => result,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    debug!("Failed to close provider '{}': {}", spec.name, close_err);
                }
                return Err(e);
            }
        };

        info!(
            "Provider '{}' ready with {} tool{} (pid {:?})",
            spec.name,
            tools.len(),
            if tools.len() == 1 { "" } else { "s" },
            transport.pid()
        );

        let record = ProviderRecord {
            tools,
            server: init.server_info,
            protocol_version: Some(init.protocol_version),
        };
        Ok((LiveProcess { transport, session }, record))
    }

    fn build_command(&self, spec: &ProviderSpec) -> Result<Command> {
        let program = resolve_program(spec)?;
        let mut command = Command::new(program);
        command.args(&spec.args);
        command.envs(spec.expand_env());

        for name in &spec.secrets {
            let credential = self.secrets.get(name).ok_or_else(|| {
                Error::launch(&spec.name, format!("secret '{}' is not available", name))
            })?;
            command.env(name, credential.expose());
        }

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        Ok(command)
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("cache_root", &self.cache.root())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// 경로 구분자가 없으면 PATH 에서 찾는다
fn resolve_program(spec: &ProviderSpec) -> Result<PathBuf> {
    let command = spec.command.trim();
    if command.contains('/') || command.contains('\\') {
        return Ok(PathBuf::from(command));
    }
    which::which(command)
        .map_err(|e| Error::launch(&spec.name, format!("command '{}' not found: {}", command, e)))
}
