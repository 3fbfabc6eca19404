// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Workspace-level error kinds, surfaced to tool callers as one of a small
//! set of abstract categories (`not_found`, `conflict`, `invalid`, ...).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock held: {path} is locked by {holder}")]
    LockHeld { path: String, holder: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// The stable machine-readable category used in error responses, kept
    /// separate from the human `Display` message so clients can branch on
    /// it without string matching.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::LockHeld { .. } => "lock_held",
            ToolError::InvalidInput(_) => "invalid_input",
            ToolError::Conflict(_) => "conflict",
            ToolError::Internal(_) => "internal",
        }
    }
}
