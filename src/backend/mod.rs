//! Task-management backends.
//!
//! Each backend pairs an applier (the reconciliation state machine, shared
//! shape across backends) with a transport trait covering the remote calls
//! it needs. Appliers only see the transport trait, so tests drive them
//! with recording mocks and the reqwest clients stay thin.

pub mod asana;
pub mod linear;
pub mod trello;

use async_trait::async_trait;
use thiserror::Error;

use crate::ops::{Operation, OperationResult};
use crate::snapshot::WorkspaceSnapshot;

/// Remote call failure, as reported by a backend transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{backend} API error ({status}): {message}")]
    Api {
        backend: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn api(backend: &'static str, status: u16, message: impl Into<String>) -> Self {
        TransportError::Api {
            backend,
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        TransportError::Decode(message.into())
    }
}

/// A task-management backend: snapshot fetch plus sequential application
/// of an already-sequenced batch.
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError>;

    /// Apply operations one at a time, in order, producing one result per
    /// operation. Individual failures never abort the batch.
    async fn apply(&self, ops: &[Operation], snapshot: &WorkspaceSnapshot)
        -> Vec<OperationResult>;
}
