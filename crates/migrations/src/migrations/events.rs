//! Lifecycle notifications
//!
//! After a successful `latest` or `regress` the runner publishes a
//! `migrate` event carrying a snapshot of its state to every registered
//! [`MigrationObserver`]. Observers cannot fail the run.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Environment;

/// Snapshot of the runner published with each event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerState {
    pub namespace: Option<String>,
    pub group: Option<String>,
    pub default_group: String,
    pub table: String,
    pub batch: i64,
    pub silent: bool,
    pub environment: Environment,
    pub messages: Vec<String>,
}

/// Event published after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationEvent {
    /// `latest` or `regress`
    pub method: String,
    pub state: RunnerState,
}

#[async_trait]
pub trait MigrationObserver: Send + Sync {
    async fn migrate(&self, _event: &MigrationEvent) {}
}

/// Default observer: logs each event with its state as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[async_trait]
impl MigrationObserver for TracingObserver {
    async fn migrate(&self, event: &MigrationEvent) {
        match serde_json::to_string(&event.state) {
            Ok(state) => info!(method = %event.method, state = %state, "migrate"),
            Err(e) => warn!(method = %event.method, error = %e, "failed to serialize runner state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_to_json() {
        let event = MigrationEvent {
            method: "latest".to_string(),
            state: RunnerState {
                namespace: None,
                group: Some("reporting".to_string()),
                default_group: "default".to_string(),
                table: "migrations".to_string(),
                batch: 3,
                silent: false,
                environment: Environment::Testing,
                messages: vec![],
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["method"], "latest");
        assert_eq!(json["state"]["group"], "reporting");
        assert_eq!(json["state"]["environment"], "testing");
        assert!(json["state"]["namespace"].is_null());
    }

    #[tokio::test]
    async fn test_tracing_observer_accepts_events() {
        let event = MigrationEvent {
            method: "regress".to_string(),
            state: RunnerState {
                namespace: Some("App".to_string()),
                group: None,
                default_group: "default".to_string(),
                table: "migrations".to_string(),
                batch: 0,
                silent: true,
                environment: Environment::Development,
                messages: vec!["Rolled back".to_string()],
            },
        };
        TracingObserver.migrate(&event).await;
    }
}
