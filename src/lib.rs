//! # Agilow
//!
//! Applies operations extracted from meeting transcripts to a task board
//! on Trello, Linear, or Asana.
//!
//! This library provides:
//! - An HTTP API accepting batches of extracted operations
//! - A normalization pipeline (parsing, status canonicalization, fuzzy
//!   name resolution, dedup, sequencing)
//! - One backend per platform, each translating the shared operation set
//!   into that platform's API calls
//!
//! ## Batch Flow
//! 1. Receive raw operations plus credentials via API
//! 2. Fetch a workspace snapshot from the platform
//! 3. Parse, normalize, dedup, and sequence the operations
//! 4. Apply them one at a time, isolating failures
//! 5. Return per-operation results and a line-per-action summary
//!
//! ## Modules
//! - `ops`: operation model and the pure normalization passes
//! - `backend`: Trello, Linear, and Asana appliers and clients
//! - `pipeline`: glue from raw payload to applied results
//! - `snapshot`: remote workspace state and the in-batch ledger

pub mod api;
pub mod backend;
pub mod config;
pub mod ops;
pub mod pipeline;
pub mod snapshot;
