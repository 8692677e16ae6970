//! Conversation and onboarding-status data models.
//!
//! These are the wire shapes shared by the proxy, the gateway, and the
//! client-side store.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of onboarding days.
pub const ONBOARDING_DAYS: u8 = 7;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single transcript entry. Never edited once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Snapshot of the user's onboarding progress, as reported by the backend.
///
/// The backend owns this data: `onboarding_complete` is not derived from
/// `onboarding_step` here. This is the client's view; the proxy forwards the
/// backend's body as raw JSON and never decodes into this type. Fields not
/// modelled here are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStatus {
    pub username: String,
    pub onboarding_step: u8,
    pub onboarding_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
    /// The question for the current onboarding day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserStatus {
    /// Progress through onboarding as a percentage (unrounded).
    pub fn progress(&self) -> f64 {
        f64::from(self.onboarding_step) / f64::from(ONBOARDING_DAYS) * 100.0
    }

    /// Progress rounded to the nearest whole percent.
    pub fn progress_percent(&self) -> u32 {
        // Step is a small non-negative integer, so the rounded value fits.
        self.progress().round().max(0.0) as u32
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at.as_deref().and_then(parse_timestamp)
    }

    /// The day onboarding started, for display.
    pub fn started_on(&self) -> Option<NaiveDate> {
        self.created_at().map(|ts| ts.date_naive())
    }
}

/// Result of marking the current onboarding day complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayCompletion {
    pub status: UserStatus,
    /// Confirmation text to show in the transcript.
    pub message: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339, and naive ISO-8601 (no offset) which the backend emits
/// for UTC times.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
