//! Process-wide map of sessions keyed by caller identity

use super::engine::SessionEngine;
use super::signal::StopSignal;
use super::stats::{SessionPhase, SessionStats};
use crate::config::Config;
use crate::errors::{BotError, BotResult};
use crate::services::gateway::ContractGateway;
use crate::wallet::Wallet;
use alloy::primitives::Address;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Stopping,
    NotRunning,
}

struct RunningTask {
    stop: StopSignal,
    handle: JoinHandle<BotResult<()>>,
}

impl RunningTask {
    fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    async fn stop_and_join(self, identity: &str) {
        self.stop.stop();
        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[Registry] Session {} ended with error: {}", identity, e),
            Err(e) => warn!("[Registry] Session {} task panicked: {}", identity, e),
        }
    }
}

struct SessionEntry {
    engine: Arc<SessionEngine>,
    task: Option<RunningTask>,
}

/// Sessions by identity. Cheap to clone; clones share the map.
#[derive(Clone)]
pub struct SessionRegistry {
    gateway: Arc<dyn ContractGateway>,
    config: Arc<Config>,
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(gateway: Arc<dyn ContractGateway>, config: Config) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn engine(&self, identity: &str) -> BotResult<Arc<SessionEngine>> {
        self.sessions
            .read()
            .await
            .get(identity)
            .map(|entry| entry.engine.clone())
            .ok_or_else(|| BotError::UnknownIdentity(identity.to_string()))
    }

    /// Install a credential for `identity`, creating its session on first use.
    ///
    /// The key format is checked before anything touches the network.
    pub async fn update_credential(&self, identity: &str, private_key: &str) -> BotResult<Address> {
        if identity.trim().is_empty() {
            return Err(BotError::Validation("identity must not be empty".to_string()));
        }
        let wallet = Wallet::from_private_key(private_key)?;
        let address = wallet.address();

        let engine = {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(identity.to_string())
                .or_insert_with(|| SessionEntry {
                    engine: Arc::new(SessionEngine::new(identity, self.gateway.clone(), &self.config)),
                    task: None,
                })
                .engine
                .clone()
        };

        // Outside the map lock: waits for the session's in-flight round
        engine.update_wallet(wallet).await;
        info!("[Registry] Credential updated for {} ({:?})", identity, address);
        Ok(address)
    }

    pub async fn start(&self, identity: &str) -> BotResult<StartStatus> {
        let engine = {
            let sessions = self.sessions.read().await;
            let entry = sessions
                .get(identity)
                .ok_or_else(|| BotError::UnknownIdentity(identity.to_string()))?;
            if entry.task.as_ref().is_some_and(RunningTask::is_active) {
                return Ok(StartStatus::AlreadyRunning);
            }
            entry.engine.clone()
        };

        // Outside the map lock: may wait for a credential swap on this identity
        if !engine.has_wallet().await {
            return Err(BotError::MissingCredential);
        }

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(identity)
            .filter(|entry| Arc::ptr_eq(&entry.engine, &engine))
            .ok_or_else(|| BotError::UnknownIdentity(identity.to_string()))?;
        if entry.task.as_ref().is_some_and(RunningTask::is_active) {
            return Ok(StartStatus::AlreadyRunning);
        }

        engine.set_phase(SessionPhase::Starting).await;
        let stop = StopSignal::new();
        let task_stop = stop.clone();
        let handle = tokio::spawn(async move { engine.run(task_stop).await });
        entry.task = Some(RunningTask { stop, handle });

        info!("[Registry] Started session {}", identity);
        Ok(StartStatus::Started)
    }

    pub async fn stop(&self, identity: &str) -> BotResult<StopStatus> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(identity)
            .ok_or_else(|| BotError::UnknownIdentity(identity.to_string()))?;

        match &entry.task {
            Some(task) if task.is_active() && !task.stop.is_stopped() => {
                task.stop.stop();
                entry.engine.mark_stopping().await;
                info!("[Registry] Stop requested for {}", identity);
                Ok(StopStatus::Stopping)
            }
            _ => Ok(StopStatus::NotRunning),
        }
    }

    pub async fn reset_stats(&self, identity: &str) -> BotResult<()> {
        self.engine(identity).await?.reset_stats().await;
        Ok(())
    }

    pub async fn refresh_balances(&self, identity: &str) -> BotResult<(u128, u128)> {
        self.engine(identity).await?.refresh_balances().await
    }

    pub async fn snapshot(&self, identity: &str) -> BotResult<SessionStats> {
        Ok(self.engine(identity).await?.snapshot().await)
    }

    pub async fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Stop the session, wait for its loop to finish, and forget it
    pub async fn evict(&self, identity: &str) -> BotResult<()> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(identity)
            .ok_or_else(|| BotError::UnknownIdentity(identity.to_string()))?;

        if let Some(task) = entry.task {
            task.stop_and_join(identity).await;
        }
        info!("[Registry] Evicted session {}", identity);
        Ok(())
    }

    /// Stop every session and wait for all loops to finish
    pub async fn shutdown(&self) {
        let tasks: Vec<(String, RunningTask)> = {
            let mut sessions = self.sessions.write().await;
            sessions
                .iter_mut()
                .filter_map(|(identity, entry)| entry.task.take().map(|t| (identity.clone(), t)))
                .collect()
        };

        info!("[Registry] Shutting down {} session task(s)", tasks.len());
        for (_, task) in &tasks {
            task.stop.stop();
        }
        for (identity, task) in tasks {
            task.stop_and_join(&identity).await;
        }
    }
}
