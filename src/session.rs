//! The single owner of the document mirror, the favorites overlay and the detectors.
//!
//! All mutation happens on the task that holds the [`Session`]. Pushes run as spawned
//! tasks and report back through [`SessionEvent::Pushed`]; pollers report through
//! [`SessionEvent::Poll`]. Nothing is rolled back when a push fails: the local state is
//! what the user just did, and a warning notice is raised instead.

use crate::config::AssistConfig;
use crate::detector::{ChangeDetector, Debouncer, DriftState, DriftVerdict, GatedAction, Liveness, PollEvent};
use crate::document::{Address, DocumentStore, PendingDeletion, SectionView, Selection};
use crate::editor::ManualEditValidator;
use crate::error::{AssistError, Result};
use crate::favorites::{FactionInfo, FavoritesOverlay, PluginCatalog, PresetToggle};
use crate::gateway::{
    AuditRecord, CatalogKind, DriftToken, FactionSource, FavoriteCategory, GatewayError,
    LivenessSignal, LogEvent, PersistenceGateway,
};
use crate::notice::{Notice, NoticeKind, NoticeQueue};
use crate::{ConfigValue, statics};
use std::{future::Future, sync::Arc};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinSet,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTarget {
    Document,
    Favorites(FavoriteCategory),
}

#[derive(Debug)]
pub enum SessionEvent {
    Poll(PollEvent),
    /// A spawned push finished. Document pushes carry the stored hash when known.
    Pushed {
        target: PushTarget,
        result: std::result::Result<Option<DriftToken>, GatewayError>,
    },
}

impl From<PollEvent> for SessionEvent {
    fn from(event: PollEvent) -> Self {
        SessionEvent::Poll(event)
    }
}

/// Receiving half of the session's event channel. Kept apart from [`Session`] so the
/// event loop can wait on it while handing events to the session.
#[derive(Debug)]
pub struct SessionEvents {
    rx: UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

pub struct Session<G> {
    gateway: Arc<G>,
    tx: UnboundedSender<SessionEvent>,
    store: DocumentStore,
    editor: ManualEditValidator,
    favorites: FavoritesOverlay,
    detector: ChangeDetector,
    debounce: Debouncer,
    /// Audit for the change waiting on the debouncer.
    pending_audit: Option<AuditRecord>,
    in_flight: usize,
    log_tasks: JoinSet<()>,
    notices: NoticeQueue,
    seen_green: bool,
}

impl<G: PersistenceGateway> Session<G> {
    pub fn new(gateway: Arc<G>, config: &AssistConfig) -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            gateway,
            tx,
            store: DocumentStore::new(),
            editor: ManualEditValidator::new(config.editing.manual_edit),
            favorites: FavoritesOverlay::with_pinned(config.favorites.pinned_presets.clone()),
            detector: ChangeDetector::new(
                config.polling.drift_interval(),
                config.polling.liveness_interval(),
                config.editing.edit_cooldown(),
            ),
            debounce: Debouncer::new(config.editing.push_debounce()),
            pending_audit: None,
            in_flight: 0,
            log_tasks: JoinSet::new(),
            notices: NoticeQueue::default(),
            seen_green: false,
        };
        (session, SessionEvents { rx })
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn favorites(&self) -> &FavoritesOverlay {
        &self.favorites
    }

    pub fn liveness(&self) -> Liveness {
        self.detector.liveness.state()
    }

    pub fn drift_state(&self) -> &DriftState {
        self.detector.drift.state()
    }

    /// Pushes spawned but not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn has_pending_push(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    fn notify(&mut self, notice: Notice) {
        debug!(kind = ?notice.kind, message = %notice.message, "notice");
        self.notices.push(notice);
    }

    /// Turns a refused operation into a notice and hands the result back unchanged.
    fn reject<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(%err, "operation refused");
            self.notify(Notice::warning(NoticeKind::Rejected, err.user_message()));
        }
        result
    }

    // ---- Loading ----

    /// Full initial load: document, every favorites collection, the reference faction
    /// table, then one liveness probe (which refreshes the catalogs when the game is up).
    /// Only the document load decides the result; the rest degrade to notices.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let document = self.load().await;
        for category in FavoriteCategory::ALL {
            if let Err(err) = self.load_favorites(category).await {
                debug!(%err, %category, "favorites not loaded");
            }
        }
        if let Err(err) = self.load_factions(FactionSource::Reference).await {
            debug!(%err, "reference factions not loaded");
        }
        self.probe_liveness().await;
        document
    }

    /// Explicit full reload. Drops any debounced push and forgets the known drift token.
    pub async fn load(&mut self) -> Result<()> {
        match self.fetch_document().await {
            Ok(()) => {
                self.detector.drift.rebase();
                self.notify(Notice::info(NoticeKind::Loaded, statics::EN_NOTICE_LOADED));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "document load failed");
                self.notify(Notice::error(NoticeKind::LoadFailed, statics::EN_NOTICE_LOAD_FAILED));
                Err(err)
            }
        }
    }

    async fn fetch_document(&mut self) -> Result<()> {
        let document = self
            .gateway
            .load_document()
            .await
            .map_err(|e| AssistError::load("document", e))?;
        self.store.replace(document)?;
        if self.debounce.cancel() {
            debug!("pending push dropped by reload");
        }
        self.pending_audit = None;
        info!(sections = self.store.section_names().count(), "document loaded");
        Ok(())
    }

    /// Hydrates one favorites collection. A collection the backend has never stored
    /// loads as empty.
    pub async fn load_favorites(&mut self, category: FavoriteCategory) -> Result<()> {
        let payload = match self.gateway.load_favorites(category).await {
            Ok(payload) => payload,
            Err(GatewayError::Status { status: 404, .. }) => {
                debug!(%category, "no stored favorites");
                serde_json::Value::Object(serde_json::Map::new())
            }
            Err(err) => {
                warn!(%err, %category, "favorites load failed");
                return Err(AssistError::load("favorites", err));
            }
        };
        let hydrated = self
            .favorites
            .hydrate(category, &payload)
            .map_err(|e| AssistError::load("favorites", e.into()));
        if hydrated.is_err() {
            self.notify(Notice::warning(
                NoticeKind::LoadFailed,
                format!("Could not read {category} favorites"),
            ));
        }
        hydrated
    }

    pub async fn load_factions(&mut self, source: FactionSource) -> Result<usize> {
        let payload = self
            .gateway
            .load_factions(source)
            .await
            .map_err(|e| AssistError::load("faction table", e))?;
        let count = self
            .favorites
            .factions
            .insert_table(source, &payload)
            .map_err(|e| AssistError::load("faction table", e.into()))?;
        info!(%source, count, "faction table loaded");
        Ok(count)
    }

    // ---- Document navigation ----

    pub fn open_section(&mut self, key: &str) -> SectionView<'_> {
        self.store.open_section(key)
    }

    pub fn close_section(&mut self) {
        self.store.close_section();
    }

    pub fn select(&mut self, address: Address) -> Result<Selection> {
        let result = self.store.select(address).cloned();
        self.reject(result)
    }

    /// Records user typing; drift reloads wait until input has been quiet for a while.
    pub fn note_input(&mut self) {
        self.detector.cooldown.note_input();
    }

    // ---- Document mutations ----

    /// Returns whether the document changed (a repeated add is a no-op and pushes nothing).
    pub fn add_map_entry(&mut self, section: &str, key: &str, value: ConfigValue) -> Result<bool> {
        let result = self.store.add_map_entry(section, key, value);
        let audit = self.reject(result)?;
        Ok(self.push_now(audit))
    }

    pub fn add_list_entries(&mut self, section: &str, values: Vec<ConfigValue>) -> Result<bool> {
        let result = self.store.add_list_entries(section, values);
        let audit = self.reject(result)?;
        Ok(self.push_now(audit))
    }

    pub fn stage_deletion(
        &mut self,
        section: &str,
        address: Address,
        label: impl Into<String>,
    ) -> Result<PendingDeletion> {
        let result = self.store.stage_deletion(section, address, label).cloned();
        let pending = self.reject(result)?;
        self.notify(Notice::info(
            NoticeKind::DeletionStaged,
            format!("{}: {}", statics::EN_NOTICE_DELETION_STAGED, pending.label),
        ));
        Ok(pending)
    }

    pub fn pending_deletion(&self) -> Option<&PendingDeletion> {
        self.store.pending_deletion()
    }

    pub fn cancel_deletion(&mut self) -> Option<PendingDeletion> {
        let cancelled = self.store.cancel_deletion();
        if let Some(pending) = &cancelled {
            debug!(label = %pending.label, "deletion cancelled");
        }
        cancelled
    }

    pub fn commit_deletion(&mut self) -> Result<AuditRecord> {
        let result = self.store.commit_deletion();
        let audit = self.reject(result)?;
        self.notify(Notice::info(
            NoticeKind::Deleted,
            format!("{}: {}", statics::EN_NOTICE_DELETED, audit.describe()),
        ));
        self.push_now(Some(audit.clone()));
        Ok(audit)
    }

    /// Scalar text edits are debounced into one push.
    pub fn set_scalar(&mut self, section: &str, value: ConfigValue) -> Result<()> {
        let result = self.store.set_scalar(section, value);
        let audit = self.reject(result)?;
        self.schedule_push(audit);
        Ok(())
    }

    pub fn manual_edit_enabled(&self) -> bool {
        self.editor.is_enabled()
    }

    pub fn set_manual_edit(&mut self, enabled: bool) {
        info!(enabled, "manual edit mode");
        self.editor.set_enabled(enabled);
    }

    pub fn edit_buffer(&self) -> Option<String> {
        ManualEditValidator::buffer_for(&self.store)
    }

    /// Replaces the selected value with `raw`. Debounced like scalar edits.
    pub fn manual_edit(&mut self, raw: &str) -> Result<()> {
        let result = self.editor.apply(&mut self.store, raw);
        let audit = self.reject(result)?;
        self.schedule_push(audit);
        self.notify(Notice::info(NoticeKind::EditApplied, statics::EN_NOTICE_EDIT_APPLIED));
        Ok(())
    }

    // ---- Pushes ----

    fn push_now(&mut self, audit: Option<AuditRecord>) -> bool {
        let Some(audit) = audit else {
            debug!("nothing changed, no push");
            return false;
        };
        self.note_input();
        // A pending debounced edit rides along with this push; its audit still gets logged.
        if self.debounce.cancel()
            && let Some(pending) = self.pending_audit.take()
        {
            self.log(pending.action.label(), pending.describe());
        }
        self.push_document(Some(audit));
        true
    }

    fn schedule_push(&mut self, audit: AuditRecord) {
        self.note_input();
        // Successive edits of the same value collapse into one audit: first before, last after.
        let same_target = self.pending_audit.as_ref().is_some_and(|pending| {
            pending.action == audit.action
                && pending.section == audit.section
                && pending.target == audit.target
        });
        if same_target {
            if let Some(pending) = self.pending_audit.as_mut() {
                pending.after = audit.after;
            }
        } else {
            self.flush();
            self.pending_audit = Some(audit);
        }
        self.debounce.schedule();
    }

    /// Sends the debounced push right away, if there is one.
    pub fn flush(&mut self) -> bool {
        if !self.debounce.cancel() {
            return false;
        }
        let audit = self.pending_audit.take();
        self.push_document(audit);
        true
    }

    fn flush_if_due(&mut self) {
        if self.debounce.take_due() {
            let audit = self.pending_audit.take();
            self.push_document(audit);
        }
    }

    fn push_document(&mut self, audit: Option<AuditRecord>) {
        if let Some(audit) = &audit {
            self.log(audit.action.label(), audit.describe());
        }
        let document = self.store.document();
        self.store.mark_clean();
        self.in_flight += 1;
        debug!(in_flight = self.in_flight, "pushing document");

        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway
                .save_document(document, audit)
                .await
                .map(|receipt| receipt.hash);
            // Receiver gone means the session was dropped; nothing left to tell.
            let _ = tx.send(SessionEvent::Pushed {
                target: PushTarget::Document,
                result,
            });
        });
    }

    fn push_favorites(&mut self, category: FavoriteCategory) {
        let payload = self.favorites.payload(category);
        self.in_flight += 1;
        debug!(%category, in_flight = self.in_flight, "pushing favorites");

        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway
                .save_favorites(category, payload)
                .await
                .map(|()| None);
            let _ = tx.send(SessionEvent::Pushed {
                target: PushTarget::Favorites(category),
                result,
            });
        });
    }

    /// Fire-and-forget trace line; failures are only logged locally.
    fn log(&mut self, action: &str, detail: String) {
        while self.log_tasks.try_join_next().is_some() {}
        let event = LogEvent::new(action, detail);
        let gateway = Arc::clone(&self.gateway);
        self.log_tasks.spawn(async move {
            if let Err(err) = gateway.log_event(event).await {
                debug!(%err, "log event dropped");
            }
        });
    }

    // ---- Favorites ----

    pub fn toggle_preset(&mut self, name: &str) -> PresetToggle {
        let outcome = self.favorites.presets.toggle(name);
        if outcome == PresetToggle::Pinned {
            debug!(name, "pinned preset left alone");
            return outcome;
        }
        self.log("favorite_preset", format!("{name}: {outcome:?}"));
        self.push_favorites(FavoriteCategory::Presets);
        outcome
    }

    /// Returns whether the NPC is a favorite afterwards.
    pub fn toggle_npc(&mut self, plugin: &str, form_id: &str) -> Result<bool> {
        let result = self.favorites.toggle_npc(plugin, form_id);
        let now = self.reject(result)?;
        self.log("favorite_npc", format!("{plugin} {form_id}: {now}"));
        self.push_favorites(FavoriteCategory::Npcs);
        Ok(now)
    }

    pub fn toggle_equipment(&mut self, plugin: &str, category: &str, form_id: &str) -> Result<bool> {
        let result = self.favorites.toggle_equipment(plugin, category, form_id);
        let now = self.reject(result)?;
        self.log(
            "favorite_equipment",
            format!("{plugin} {category} {form_id}: {now}"),
        );
        self.push_favorites(FavoriteCategory::Equipment);
        Ok(now)
    }

    /// Whole-plugin toggle. Applied immediately, no confirmation step.
    pub fn set_plugin_all(
        &mut self,
        category: FavoriteCategory,
        plugin: &str,
        selected: bool,
    ) -> Result<usize> {
        let before = match category {
            FavoriteCategory::Npcs => self.favorites.npcs.favorited_count(plugin),
            FavoriteCategory::Equipment => self.favorites.equipment.favorited_count(plugin),
            FavoriteCategory::Presets => 0,
        };
        let result = self.favorites.set_plugin_all(category, plugin, selected);
        let after = self.reject(result)?;
        self.log(
            "favorite_plugin",
            format!("{category} {plugin}: all={selected} ({before} -> {after} entries)"),
        );
        self.push_favorites(category);
        Ok(after)
    }

    pub fn clear_favorites(&mut self, category: FavoriteCategory) {
        self.favorites.clear(category);
        self.log("clear_favorites", category.to_string());
        self.push_favorites(category);
    }

    /// Pushes one collection as it stands.
    pub fn save_favorites(&mut self, category: FavoriteCategory) {
        self.push_favorites(category);
    }

    // ---- Factions and catalogs ----

    /// The live source needs the game running and is refetched on every switch; the
    /// reference table is fetched once.
    pub async fn switch_faction_source(&mut self, source: FactionSource) -> Result<usize> {
        if source == FactionSource::Live {
            let gate = self.detector.liveness.check(GatedAction::LiveFactionSource);
            self.reject(gate)?;
        }
        if source == FactionSource::Live || !self.favorites.factions.is_loaded(source) {
            let loaded = self.load_factions(source).await;
            self.reject(loaded)?;
        }
        self.favorites.factions.set_active(source);
        Ok(self.favorites.factions.len())
    }

    pub fn search_factions(&self, term: &str) -> Vec<(&str, &FactionInfo)> {
        self.favorites.factions.search(term)
    }

    /// Refetches one catalog and re-derives every `allSelected` flag against it.
    pub async fn refresh_catalog(&mut self, kind: CatalogKind) -> Result<usize> {
        let action = match kind {
            CatalogKind::Npcs => GatedAction::RefreshNpcCatalog,
            CatalogKind::Equipment => GatedAction::RefreshEquipmentCatalog,
        };
        let gate = self.detector.liveness.check(action);
        self.reject(gate)?;

        let catalog = match self.gateway.load_catalog(kind).await {
            Ok(payload) => PluginCatalog::from_payload(&payload).map_err(GatewayError::from),
            Err(err) => Err(err),
        };
        let catalog = match catalog {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(%err, %kind, "catalog refresh failed");
                self.notify(Notice::warning(
                    NoticeKind::CatalogFailed,
                    format!("{} ({kind})", statics::EN_NOTICE_CATALOG_FAILED),
                ));
                return Err(AssistError::load("catalog", err));
            }
        };
        let plugins = catalog.plugins().count();
        self.favorites.set_catalog(kind, catalog);
        info!(%kind, plugins, "catalog refreshed");
        Ok(plugins)
    }

    pub async fn refresh_catalogs(&mut self) {
        for kind in [CatalogKind::Npcs, CatalogKind::Equipment] {
            if let Err(err) = self.refresh_catalog(kind).await {
                debug!(%err, %kind, "catalog not refreshed");
            }
        }
    }

    // ---- Event loop ----

    pub fn start_polling(&mut self) {
        self.detector.start(&self.gateway, &self.tx);
    }

    pub fn stop_polling(&mut self) {
        self.detector.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.detector.is_running()
    }

    /// One liveness check outside the poller.
    pub async fn probe_liveness(&mut self) {
        let signal = self.gateway.liveness().await;
        self.on_liveness(signal).await;
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Poll(PollEvent::Drift(Ok(token))) => self.on_drift(token).await,
            SessionEvent::Poll(PollEvent::Drift(Err(err))) => {
                debug!(%err, "drift poll failed");
            }
            SessionEvent::Poll(PollEvent::Liveness(signal)) => self.on_liveness(signal).await,
            SessionEvent::Pushed { target, result } => self.on_pushed(target, result),
        }
    }

    async fn on_drift(&mut self, token: DriftToken) {
        let editing = self.detector.cooldown.is_active() || self.debounce.is_pending();
        match self.detector.drift.observe(token, editing) {
            DriftVerdict::Reload => {
                info!("remote document changed, reloading");
                match self.fetch_document().await {
                    Ok(()) => {
                        self.detector.drift.reloaded();
                        self.notify(Notice::info(NoticeKind::Reloaded, statics::EN_NOTICE_RELOADED));
                    }
                    Err(err) => {
                        warn!(%err, "reload failed");
                        self.notify(Notice::error(
                            NoticeKind::LoadFailed,
                            statics::EN_NOTICE_LOAD_FAILED,
                        ));
                    }
                }
            }
            DriftVerdict::Suppressed => debug!("remote changed during a local edit, reload deferred"),
            DriftVerdict::Baseline | DriftVerdict::Unchanged => {}
        }
    }

    async fn on_liveness(&mut self, signal: LivenessSignal) {
        let Some(transition) = self.detector.liveness.observe(signal) else {
            return;
        };
        info!(from = %transition.from, to = %transition.to, "liveness changed");
        if transition.connection_lost {
            self.notify(Notice::warning(
                NoticeKind::ConnectionLost,
                statics::EN_NOTICE_CONNECTION_LOST,
            ));
        }
        match transition.to {
            Liveness::Red => {
                self.notify(Notice::warning(NoticeKind::Unreachable, statics::EN_NOTICE_UNREACHABLE));
            }
            Liveness::Green => {
                if self.seen_green {
                    self.notify(Notice::info(
                        NoticeKind::ConnectionRestored,
                        statics::EN_NOTICE_CONNECTION_RESTORED,
                    ));
                }
                self.seen_green = true;
                if self.favorites.catalog(CatalogKind::Npcs).is_empty()
                    || self.favorites.catalog(CatalogKind::Equipment).is_empty()
                {
                    self.refresh_catalogs().await;
                }
            }
            Liveness::Yellow => {}
        }
    }

    fn on_pushed(
        &mut self,
        target: PushTarget,
        result: std::result::Result<Option<DriftToken>, GatewayError>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match (target, result) {
            (PushTarget::Document, Ok(hash)) => {
                debug!(?hash, "document saved");
                if let Some(hash) = hash {
                    self.detector.drift.acknowledge(hash);
                }
            }
            (PushTarget::Favorites(category), Ok(_)) => debug!(%category, "favorites saved"),
            (PushTarget::Document, Err(err)) => {
                warn!(%err, "document push failed, keeping local state");
                self.notify(Notice::warning(
                    NoticeKind::PersistenceWarning,
                    format!("{}: {err}", statics::EN_NOTICE_SAVE_FAILED),
                ));
            }
            (PushTarget::Favorites(category), Err(err)) => {
                warn!(%err, %category, "favorites push failed, keeping local state");
                self.notify(Notice::warning(
                    NoticeKind::PersistenceWarning,
                    format!("{} ({category}): {err}", statics::EN_NOTICE_FAVORITES_SAVE_FAILED),
                ));
            }
        }
    }

    /// Flushes the debounced push and waits until every spawned push and log event has
    /// finished. Other events arriving meanwhile are handled normally.
    pub async fn settle(&mut self, events: &mut SessionEvents) {
        self.flush();
        while self.in_flight > 0 {
            let Some(event) = events.recv().await else {
                break;
            };
            self.handle_event(event).await;
        }
        while self.log_tasks.join_next().await.is_some() {}
    }

    /// Polls and handles events until `shutdown` resolves, then stops the pollers and
    /// settles. Notices are handed to `on_notice` as they are raised.
    pub async fn run<F>(
        &mut self,
        events: &mut SessionEvents,
        shutdown: F,
        mut on_notice: impl FnMut(Notice),
    ) where
        F: Future<Output = ()>,
    {
        self.start_polling();
        tokio::pin!(shutdown);
        loop {
            for notice in self.notices.drain() {
                on_notice(notice);
            }
            let deadline = self.debounce.deadline();
            tokio::select! {
                () = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_if_due();
                }
            }
        }
        self.stop_polling();
        self.settle(events).await;
        for notice in self.notices.drain() {
            on_notice(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionEvents};
    use crate::config::AssistConfig;
    use crate::document::Address;
    use crate::gateway::{LivenessSignal, MemoryGateway};
    use crate::notice::NoticeKind;
    use crate::ConfigValue;
    use std::sync::Arc;

    async fn session(text: &str) -> (Session<MemoryGateway>, SessionEvents, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::new(ConfigValue::parse_json5(text).unwrap()));
        let (mut session, events) = Session::new(Arc::clone(&gateway), &AssistConfig::default());
        session.load().await.unwrap();
        (session, events, gateway)
    }

    #[tokio::test(start_paused = true)]
    async fn refused_operations_become_notices() {
        let (mut session, _events, _gateway) = session(r#"{ "list": [1] }"#).await;
        session.drain_notices();
        session.open_section("list");
        assert!(session.select(Address::Key("x".to_string())).is_err());
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_add_pushes_once() {
        let (mut session, mut events, gateway) = session(r#"{ "npc": {} }"#).await;
        let value = ConfigValue::from(vec!["A"]);
        assert!(session.add_map_entry("npc", "Lydia", value.clone()).unwrap());
        assert!(!session.add_map_entry("npc", "Lydia", value).unwrap());
        session.settle(&mut events).await;
        assert_eq!(gateway.saves().len(), 1);
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_push_absorbs_pending_edit() {
        let (mut session, mut events, gateway) =
            session(r#"{ "title": "a", "blacklist": [] }"#).await;
        session.set_scalar("title", ConfigValue::from("b")).unwrap();
        assert!(session.add_list_entries("blacklist", vec!["x".into()]).unwrap());
        assert!(!session.has_pending_push());
        session.settle(&mut events).await;

        let saves = gateway.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(
            saves[0].0,
            ConfigValue::parse_json5(r#"{ "title": "b", "blacklist": ["x"] }"#).unwrap()
        );
        let actions: Vec<String> = gateway.log_events().into_iter().map(|e| e.action).collect();
        assert_eq!(actions.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_restored_only_after_a_previous_green() {
        let (mut session, _events, gateway) = session("{}").await;
        gateway.script_liveness([
            LivenessSignal::Active,
            LivenessSignal::Idle,
            LivenessSignal::Active,
        ]);
        session.probe_liveness().await;
        session.probe_liveness().await;
        session.probe_liveness().await;
        let kinds: Vec<NoticeKind> = session.drain_notices().into_iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&NoticeKind::ConnectionLost));
        assert_eq!(
            kinds.iter().filter(|k| **k == NoticeKind::ConnectionRestored).count(),
            1
        );
    }
}
