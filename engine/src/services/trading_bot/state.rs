// Shared run state of the bot. Every phase change goes through `set_running`.
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use shared::models::BotPhase;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    pub phase: BotPhase,
    pub active_symbols: BTreeSet<String>,
    pub last_update: Option<DateTime<Utc>>,
    /// Last decision-timeframe combined score per symbol.
    pub last_scores: BTreeMap<String, f64>,
}

impl BotState {
    /// Running until the stop sequence has force-closed every position.
    pub fn running(&self) -> bool {
        matches!(self.phase, BotPhase::Running | BotPhase::Stopping)
    }
}

impl Default for BotState {
    fn default() -> Self {
        BotState {
            phase: BotPhase::Idle,
            active_symbols: BTreeSet::new(),
            last_update: None,
            last_scores: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunTransition {
    Start(Vec<String>),
    BeginStop,
    FinishStop,
}

#[derive(Clone, Default)]
pub struct BotStateHandle {
    inner: Arc<RwLock<BotState>>,
}

impl BotStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one phase transition atomically:
    /// Idle/Stopped -> Running, Running -> Stopping, Stopping -> Stopped.
    pub async fn set_running(&self, transition: RunTransition) -> Result<(), EngineError> {
        let mut state = self.inner.write().await;
        match (state.phase, transition) {
            (BotPhase::Idle | BotPhase::Stopped, RunTransition::Start(symbols)) => {
                state.phase = BotPhase::Running;
                state.active_symbols = symbols.into_iter().collect();
                state.last_scores.clear();
            }
            (_, RunTransition::Start(_)) => return Err(EngineError::AlreadyRunning),
            (BotPhase::Running, RunTransition::BeginStop) => state.phase = BotPhase::Stopping,
            (BotPhase::Stopping, RunTransition::FinishStop) => {
                state.phase = BotPhase::Stopped;
                state.active_symbols.clear();
            }
            (_, RunTransition::BeginStop | RunTransition::FinishStop) => return Err(EngineError::NotRunning),
        }
        state.last_update = Some(Utc::now());
        tracing::info!(phase = ?state.phase, symbols = ?state.active_symbols, "Bot phase changed");
        Ok(())
    }

    pub async fn record_score(&self, symbol: &str, combined: f64) {
        let mut state = self.inner.write().await;
        state.last_scores.insert(symbol.to_string(), combined);
        state.last_update = Some(Utc::now());
    }

    pub async fn phase(&self) -> BotPhase {
        self.inner.read().await.phase
    }

    pub async fn active_symbols(&self) -> Vec<String> {
        self.inner.read().await.active_symbols.iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> BotState {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state() {
        let handle = BotStateHandle::new();
        let state = handle.snapshot().await;
        assert_eq!(state.phase, BotPhase::Idle);
        assert!(!state.running());
        assert!(state.last_update.is_none());
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let handle = BotStateHandle::new();
        handle.set_running(RunTransition::Start(vec!["ETHUSDT".into(), "BTCUSDT".into()])).await.unwrap();
        assert_eq!(handle.phase().await, BotPhase::Running);
        assert_eq!(handle.active_symbols().await, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

        handle.set_running(RunTransition::BeginStop).await.unwrap();
        assert!(handle.snapshot().await.running());

        handle.set_running(RunTransition::FinishStop).await.unwrap();
        let state = handle.snapshot().await;
        assert_eq!(state.phase, BotPhase::Stopped);
        assert!(!state.running());
        assert!(state.active_symbols.is_empty());

        // Restart after a stop is allowed
        handle.set_running(RunTransition::Start(vec!["SOLUSDT".into()])).await.unwrap();
        assert_eq!(handle.phase().await, BotPhase::Running);
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let handle = BotStateHandle::new();
        assert!(matches!(handle.set_running(RunTransition::BeginStop).await, Err(EngineError::NotRunning)));
        assert!(matches!(handle.set_running(RunTransition::FinishStop).await, Err(EngineError::NotRunning)));

        handle.set_running(RunTransition::Start(vec![])).await.unwrap();
        assert!(matches!(
            handle.set_running(RunTransition::Start(vec![])).await,
            Err(EngineError::AlreadyRunning)
        ));
        assert!(matches!(handle.set_running(RunTransition::FinishStop).await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn test_record_score() {
        let handle = BotStateHandle::new();
        handle.record_score("BTCUSDT", 71.5).await;
        let state = handle.snapshot().await;
        assert_eq!(state.last_scores.get("BTCUSDT"), Some(&71.5));
        assert!(state.last_update.is_some());
    }
}
