use super::{
    AuditRecord, CatalogKind, DriftToken, FactionSource, FavoriteCategory, GatewayError,
    LivenessSignal, LogEvent, PersistenceGateway, SaveReceipt,
};
use crate::ConfigValue;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Remote {
    document: ConfigValue,
    revision: u64,
    favorites: HashMap<FavoriteCategory, serde_json::Value>,
    catalogs: HashMap<CatalogKind, serde_json::Value>,
    factions: HashMap<FactionSource, serde_json::Value>,
    liveness_script: VecDeque<LivenessSignal>,
    liveness_default: Option<LivenessSignal>,
    fail_writes: bool,
    fail_reads: bool,
}

/// Records of what reached the store, for assertions.
#[derive(Debug, Default)]
struct Journal {
    saves: Vec<(ConfigValue, Option<AuditRecord>)>,
    favorite_saves: Vec<(FavoriteCategory, serde_json::Value)>,
    log_events: Vec<LogEvent>,
    document_loads: usize,
}

/// In-process store with the backend's semantics: every document write bumps the
/// revision, and the drift token is derived from it.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    remote: Mutex<Remote>,
    journal: Mutex<Journal>,
}

impl MemoryGateway {
    pub fn new(document: ConfigValue) -> Self {
        let gateway = Self::default();
        lock(&gateway.remote).document = document;
        gateway
    }

    /// Simulates the game (or another editor) rewriting the document.
    pub fn replace_remote_document(&self, document: ConfigValue) {
        let mut remote = lock(&self.remote);
        remote.document = document;
        remote.revision += 1;
    }

    pub fn remote_document(&self) -> ConfigValue {
        lock(&self.remote).document.clone()
    }

    pub fn set_favorites(&self, category: FavoriteCategory, payload: serde_json::Value) {
        lock(&self.remote).favorites.insert(category, payload);
    }

    pub fn favorites(&self, category: FavoriteCategory) -> Option<serde_json::Value> {
        lock(&self.remote).favorites.get(&category).cloned()
    }

    pub fn set_catalog(&self, kind: CatalogKind, payload: serde_json::Value) {
        lock(&self.remote).catalogs.insert(kind, payload);
    }

    pub fn set_factions(&self, source: FactionSource, payload: serde_json::Value) {
        lock(&self.remote).factions.insert(source, payload);
    }

    /// Signals returned by successive liveness probes; once exhausted the last one repeats.
    pub fn script_liveness(&self, signals: impl IntoIterator<Item = LivenessSignal>) {
        lock(&self.remote).liveness_script.extend(signals);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.remote).fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        lock(&self.remote).fail_reads = fail;
    }

    pub fn saves(&self) -> Vec<(ConfigValue, Option<AuditRecord>)> {
        lock(&self.journal).saves.clone()
    }

    pub fn favorite_saves(&self) -> Vec<(FavoriteCategory, serde_json::Value)> {
        lock(&self.journal).favorite_saves.clone()
    }

    pub fn log_events(&self) -> Vec<LogEvent> {
        lock(&self.journal).log_events.clone()
    }

    pub fn document_loads(&self) -> usize {
        lock(&self.journal).document_loads
    }

    fn token(revision: u64) -> DriftToken {
        DriftToken(format!("rev-{revision}"))
    }

    fn read<T>(&self, f: impl FnOnce(&Remote) -> Option<T>, what: &str) -> Result<T, GatewayError> {
        let remote = lock(&self.remote);
        if remote.fail_reads {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        f(&remote).ok_or_else(|| GatewayError::Status {
            status: 404,
            body: format!("no {what}"),
        })
    }
}

impl PersistenceGateway for MemoryGateway {
    async fn load_document(&self) -> Result<ConfigValue, GatewayError> {
        let document = self.read(|r| Some(r.document.clone()), "document")?;
        lock(&self.journal).document_loads += 1;
        Ok(document)
    }

    async fn save_document(
        &self,
        document: ConfigValue,
        audit: Option<AuditRecord>,
    ) -> Result<SaveReceipt, GatewayError> {
        let hash = {
            let mut remote = lock(&self.remote);
            if remote.fail_writes {
                return Err(GatewayError::Transport("connection reset".to_string()));
            }
            remote.document = document.clone();
            remote.revision += 1;
            Self::token(remote.revision)
        };
        lock(&self.journal).saves.push((document, audit));
        Ok(SaveReceipt { hash: Some(hash) })
    }

    async fn load_favorites(
        &self,
        category: FavoriteCategory,
    ) -> Result<serde_json::Value, GatewayError> {
        self.read(|r| r.favorites.get(&category).cloned(), category.path_segment())
    }

    async fn save_favorites(
        &self,
        category: FavoriteCategory,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        {
            let mut remote = lock(&self.remote);
            if remote.fail_writes {
                return Err(GatewayError::Transport("connection reset".to_string()));
            }
            remote.favorites.insert(category, payload.clone());
        }
        lock(&self.journal).favorite_saves.push((category, payload));
        Ok(())
    }

    async fn load_catalog(&self, kind: CatalogKind) -> Result<serde_json::Value, GatewayError> {
        self.read(|r| r.catalogs.get(&kind).cloned(), kind.path_segment())
    }

    async fn load_factions(
        &self,
        source: FactionSource,
    ) -> Result<serde_json::Value, GatewayError> {
        self.read(|r| r.factions.get(&source).cloned(), source.path_segment())
    }

    async fn drift_token(&self) -> Result<DriftToken, GatewayError> {
        self.read(|r| Some(Self::token(r.revision)), "hash")
    }

    async fn liveness(&self) -> LivenessSignal {
        let mut remote = lock(&self.remote);
        if let Some(next) = remote.liveness_script.pop_front() {
            remote.liveness_default = Some(next);
            return next;
        }
        remote.liveness_default.unwrap_or(LivenessSignal::Active)
    }

    async fn log_event(&self, event: LogEvent) -> Result<(), GatewayError> {
        if lock(&self.remote).fail_writes {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        lock(&self.journal).log_events.push(event);
        Ok(())
    }
}
