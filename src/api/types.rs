//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::OperationResult;

/// Request to apply a batch of extracted operations.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsRequest {
    /// Target platform: "trello", "linear", or "asana"
    pub platform: String,

    /// Raw extracted operations, applied in request order (after
    /// sequencing)
    pub operations: Vec<Value>,

    /// Source transcript, used to recover a spoken status no operation
    /// field captured
    pub transcript: Option<String>,

    /// Signatures of operations already applied in earlier batches of the
    /// same session; echoed back extended with this batch
    #[serde(default)]
    pub processed_signatures: Vec<String>,

    // Per-request credentials. Any of these may be omitted or carry a
    // placeholder; the server then falls back to its environment.
    pub api_key: Option<String>,
    pub token: Option<String>,
    pub board_id: Option<String>,
    pub linear_api_key: Option<String>,
    pub linear_team_id: Option<String>,
    pub asana_token: Option<String>,
    pub asana_project_id: Option<String>,
}

/// Response after applying a batch.
#[derive(Debug, Clone, Serialize)]
pub struct OperationsResponse {
    /// True when every surviving operation succeeded
    pub success: bool,

    /// One entry per applied operation, in processing order
    pub results: Vec<OperationResult>,

    /// Human-readable summary, one line per result
    pub summary: String,

    /// All signatures seen so far; pass back on the next batch
    pub processed_signatures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
