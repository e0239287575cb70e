//! The single point where state leaves the process.
//!
//! [`PersistenceGateway`] is implemented by [`HttpGateway`] for the real backend and by
//! [`MemoryGateway`] for tests and dry runs. Everything the session pushes or polls goes
//! through it.

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

use crate::{ConfigValue, statics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, str::FromStr};
use thiserror::Error;

/// Transport-level failures. Never fatal to the session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// Persisted favorites collections. The faction index is read-only and loaded through
/// [`PersistenceGateway::load_factions`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavoriteCategory {
    Presets,
    Npcs,
    Equipment,
}

impl FavoriteCategory {
    pub const ALL: [FavoriteCategory; 3] = [
        FavoriteCategory::Presets,
        FavoriteCategory::Npcs,
        FavoriteCategory::Equipment,
    ];

    pub const fn path_segment(&self) -> &'static str {
        match self {
            FavoriteCategory::Presets => "presets",
            FavoriteCategory::Npcs => "npcs",
            FavoriteCategory::Equipment => "equipment",
        }
    }
}

impl fmt::Display for FavoriteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Read-only listings exported by the game process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Npcs,
    Equipment,
}

impl CatalogKind {
    pub const fn path_segment(&self) -> &'static str {
        match self {
            CatalogKind::Npcs => "npcs",
            CatalogKind::Equipment => "equipment",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Where the faction library comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FactionSource {
    /// Accumulated from NPCs the running game has encountered.
    Live,
    /// Static table bundled with the backend.
    #[default]
    Reference,
}

impl FactionSource {
    pub const fn path_segment(&self) -> &'static str {
        match self {
            FactionSource::Live => "live",
            FactionSource::Reference => "reference",
        }
    }
}

impl fmt::Display for FactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for FactionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(FactionSource::Live),
            "reference" | "static" => Ok(FactionSource::Reference),
            other => Err(format!("unknown faction source: {other}")),
        }
    }
}

/// Tri-state answer from the liveness endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessSignal {
    Active,
    /// Backend answers but the game is not fully ready.
    Idle,
    Unreachable,
}

impl LivenessSignal {
    /// Reads a `{ "status": ... }` payload. Unknown statuses mean the backend is up but
    /// not ready.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let status = payload
            .get(statics::KEY_STATUS)
            .or(Some(payload))
            .and_then(|v| v.as_str())
            .map(str::to_ascii_lowercase);
        match status.as_deref() {
            Some(statics::STATUS_ACTIVE) => LivenessSignal::Active,
            _ => LivenessSignal::Idle,
        }
    }
}

/// Opaque remote-state marker. Only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriftToken(pub String);

impl DriftToken {
    /// Accepts a bare string, a `{ "hash": ... }` object, a boolean flag or a number.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, GatewayError> {
        let value = payload.get(statics::KEY_HASH).unwrap_or(payload);
        match value {
            serde_json::Value::String(s) => Ok(DriftToken(s.clone())),
            serde_json::Value::Bool(b) => Ok(DriftToken(b.to_string())),
            serde_json::Value::Number(n) => Ok(DriftToken(n.to_string())),
            other => Err(GatewayError::Decode(format!(
                "unexpected drift token payload: {other}"
            ))),
        }
    }
}

impl fmt::Display for DriftToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a successful document save told us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Hash of the document as stored, when the backend reports it.
    pub hash: Option<DriftToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AddMapEntry,
    AddListEntries,
    Delete,
    SetScalar,
    ManualEdit,
}

impl AuditAction {
    pub const fn label(&self) -> &'static str {
        match self {
            AuditAction::AddMapEntry => "add",
            AuditAction::AddListEntries => "add",
            AuditAction::Delete => "delete",
            AuditAction::SetScalar => "set",
            AuditAction::ManualEdit => "edit",
        }
    }
}

/// Describes one document mutation, sent alongside the save for traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: AuditAction,
    pub section: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<ConfigValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<ConfigValue>,
}

impl AuditRecord {
    pub fn describe(&self) -> String {
        let place = match &self.target {
            Some(target) => format!("{}.{}", self.section, target),
            None => self.section.clone(),
        };
        let preview = |v: Option<&ConfigValue>| {
            v.map(ConfigValue::to_compact_text)
                .unwrap_or_else(|| statics::EN_LITERAL_MISSING.to_string())
        };
        format!(
            "{} {}: {} -> {}",
            self.action.label(),
            place,
            preview(self.before.as_ref()),
            preview(self.after.as_ref())
        )
    }
}

/// Fire-and-forget trace line for the backend's log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub action: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Remote store for the document, favorites, catalogs and change signals.
///
/// Futures are `Send` so pushes and polls can run as spawned tasks.
pub trait PersistenceGateway: Send + Sync + 'static {
    fn load_document(&self) -> impl Future<Output = Result<ConfigValue, GatewayError>> + Send;

    fn save_document(
        &self,
        document: ConfigValue,
        audit: Option<AuditRecord>,
    ) -> impl Future<Output = Result<SaveReceipt, GatewayError>> + Send;

    fn load_favorites(
        &self,
        category: FavoriteCategory,
    ) -> impl Future<Output = Result<serde_json::Value, GatewayError>> + Send;

    fn save_favorites(
        &self,
        category: FavoriteCategory,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn load_catalog(
        &self,
        kind: CatalogKind,
    ) -> impl Future<Output = Result<serde_json::Value, GatewayError>> + Send;

    fn load_factions(
        &self,
        source: FactionSource,
    ) -> impl Future<Output = Result<serde_json::Value, GatewayError>> + Send;

    fn drift_token(&self) -> impl Future<Output = Result<DriftToken, GatewayError>> + Send;

    /// Transport failures map to `LivenessSignal::Unreachable`.
    fn liveness(&self) -> impl Future<Output = LivenessSignal> + Send;

    fn log_event(&self, event: LogEvent) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::{AuditAction, AuditRecord, DriftToken, FactionSource, LivenessSignal};
    use crate::ConfigValue;
    use serde_json::json;

    #[test]
    fn drift_token_accepts_hash_object_string_and_flag() {
        assert_eq!(
            DriftToken::from_payload(&json!({ "hash": "abc" })).unwrap(),
            DriftToken("abc".to_string())
        );
        assert_eq!(
            DriftToken::from_payload(&json!("def")).unwrap(),
            DriftToken("def".to_string())
        );
        assert_eq!(
            DriftToken::from_payload(&json!(true)).unwrap(),
            DriftToken("true".to_string())
        );
        assert!(DriftToken::from_payload(&json!([1, 2])).is_err());
    }

    #[test]
    fn liveness_payload_maps_unknown_status_to_idle() {
        assert_eq!(
            LivenessSignal::from_payload(&json!({ "status": "active" })),
            LivenessSignal::Active
        );
        assert_eq!(
            LivenessSignal::from_payload(&json!({ "status": "IDLE" })),
            LivenessSignal::Idle
        );
        assert_eq!(
            LivenessSignal::from_payload(&json!({ "status": "loading" })),
            LivenessSignal::Idle
        );
        assert_eq!(LivenessSignal::from_payload(&json!("active")), LivenessSignal::Active);
    }

    #[test]
    fn faction_source_parses_aliases() {
        assert_eq!("LIVE".parse::<FactionSource>().unwrap(), FactionSource::Live);
        assert_eq!("static".parse::<FactionSource>().unwrap(), FactionSource::Reference);
        assert!("other".parse::<FactionSource>().is_err());
    }

    #[test]
    fn audit_record_describes_change_and_serializes_camel_case() {
        let record = AuditRecord {
            action: AuditAction::AddMapEntry,
            section: "npc".to_string(),
            target: Some("Lydia".to_string()),
            before: None,
            after: Some(ConfigValue::from(vec!["PresetB"])),
        };
        assert_eq!(record.describe(), "add npc.Lydia: <missing> -> [\"PresetB\"]");

        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(
            wire,
            json!({ "action": "add_map_entry", "section": "npc", "target": "Lydia", "after": ["PresetB"] })
        );
    }
}
