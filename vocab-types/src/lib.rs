//! Shared types for the vocab service and its HTTP clients.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// A single vocabulary entry. `created_at` lives only in the store and is
/// never part of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub id: i64,
    pub term: String,
    pub translation: String,
    pub knowledge_level: u8,
    pub practice_at: DateTime<Local>,
}

/// Values for a vocab row that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVocab {
    pub term: String,
    pub translation: String,
    pub knowledge_level: u8,
    pub practice_at: DateTime<Local>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VocabPage {
    pub count: i64,
    pub items: Vec<VocabEntry>,
}

// =====================================================
// RPC Request Types
// =====================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateVocabRequest {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
}

/// One pass/fail result submitted from a practice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeOutcome {
    pub id: i64,
    pub passed: bool,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub clean: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub total_entries: i64,
    pub due_count: i64,
}
