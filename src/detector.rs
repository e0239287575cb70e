//! Change detection: drift and liveness state machines plus the pollers that feed them.
//!
//! The state machines only see tokens and signals, never the transport, so anything that
//! produces a [`PollEvent`] can drive them.

use crate::gateway::{DriftToken, GatewayError, LivenessSignal, PersistenceGateway};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

/// Actions that need the game process to be fully ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    RefreshNpcCatalog,
    RefreshEquipmentCatalog,
    LiveFactionSource,
}

impl fmt::Display for GatedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GatedAction::RefreshNpcCatalog => "Refreshing the NPC catalog",
            GatedAction::RefreshEquipmentCatalog => "Refreshing the equipment catalog",
            GatedAction::LiveFactionSource => "The live faction list",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftState {
    /// No token seen since the last full load.
    Unknown,
    Synced(DriftToken),
    /// Remote moved on; a reload has been requested but not completed.
    Stale { known: DriftToken, remote: DriftToken },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftVerdict {
    /// First token after a load; adopted without reloading.
    Baseline,
    Unchanged,
    /// Token differs but a local edit is in flight. The token is not adopted.
    Suppressed,
    Reload,
}

#[derive(Debug, Clone)]
pub struct DriftMonitor {
    state: DriftState,
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self {
            state: DriftState::Unknown,
        }
    }
}

impl DriftMonitor {
    pub fn state(&self) -> &DriftState {
        &self.state
    }

    pub fn observe(&mut self, token: DriftToken, editing: bool) -> DriftVerdict {
        let known = match &self.state {
            DriftState::Unknown => {
                self.state = DriftState::Synced(token);
                return DriftVerdict::Baseline;
            }
            DriftState::Synced(known) | DriftState::Stale { known, .. } => known.clone(),
        };

        if known == token {
            self.state = DriftState::Synced(token);
            DriftVerdict::Unchanged
        } else if editing {
            DriftVerdict::Suppressed
        } else {
            self.state = DriftState::Stale {
                known,
                remote: token,
            };
            DriftVerdict::Reload
        }
    }

    /// A requested reload completed: the remote token becomes the known one.
    pub fn reloaded(&mut self) {
        if let DriftState::Stale { remote, .. } = &self.state {
            self.state = DriftState::Synced(remote.clone());
        }
    }

    /// Our own save produced `token`; do not treat it as drift.
    pub fn acknowledge(&mut self, token: DriftToken) {
        self.state = DriftState::Synced(token);
    }

    /// Forget the known token (after an explicit full load).
    pub fn rebase(&mut self) {
        self.state = DriftState::Unknown;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Red,
    Yellow,
    Green,
}

impl From<LivenessSignal> for Liveness {
    fn from(signal: LivenessSignal) -> Self {
        match signal {
            LivenessSignal::Active => Liveness::Green,
            LivenessSignal::Idle => Liveness::Yellow,
            LivenessSignal::Unreachable => Liveness::Red,
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Liveness::Red => "red",
            Liveness::Yellow => "yellow",
            Liveness::Green => "green",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessTransition {
    pub from: Liveness,
    pub to: Liveness,
    /// The one-shot "connection lost" notice should be shown.
    pub connection_lost: bool,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    state: Liveness,
    lost_notice_armed: bool,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self {
            state: Liveness::Red,
            lost_notice_armed: false,
        }
    }
}

impl LivenessMonitor {
    pub fn state(&self) -> Liveness {
        self.state
    }

    pub fn actions_locked(&self) -> bool {
        self.state != Liveness::Green
    }

    pub fn check(&self, action: GatedAction) -> crate::Result<()> {
        if self.actions_locked() {
            Err(crate::AssistError::ActionLocked(action))
        } else {
            Ok(())
        }
    }

    /// Returns `None` when the state did not change.
    pub fn observe(&mut self, signal: LivenessSignal) -> Option<LivenessTransition> {
        let to = Liveness::from(signal);
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;

        let connection_lost = match (from, to) {
            (_, Liveness::Green) => {
                self.lost_notice_armed = true;
                false
            }
            (Liveness::Green, Liveness::Yellow) if self.lost_notice_armed => {
                self.lost_notice_armed = false;
                true
            }
            _ => false,
        };
        Some(LivenessTransition {
            from,
            to,
            connection_lost,
        })
    }
}

/// Set by tracked input, clear after a quiet period.
#[derive(Debug, Clone)]
pub struct EditCooldown {
    quiet: Duration,
    last_input: Option<Instant>,
}

impl EditCooldown {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_input: None,
        }
    }

    pub fn note_input(&mut self) {
        self.last_input = Some(Instant::now());
    }

    pub fn is_active(&self) -> bool {
        self.last_input
            .is_some_and(|at| Instant::now() < at + self.quiet)
    }

    pub fn reset(&mut self) {
        self.last_input = None;
    }
}

/// Coalesces bursts of requests into one action after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)starts the quiet period.
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True (once) when the quiet period has elapsed.
    pub fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(at) if Instant::now() >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drops the pending action, returning whether there was one.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// What the pollers report.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Drift(Result<DriftToken, GatewayError>),
    Liveness(LivenessSignal),
}

/// Owns a poller task; dropping the handle aborts it.
#[derive(Debug)]
pub struct PollerHandle(JoinHandle<()>);

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Polls the drift token every `period` until the receiver goes away.
pub fn spawn_drift_poll<G, T>(gateway: Arc<G>, period: Duration, tx: UnboundedSender<T>) -> PollerHandle
where
    G: PersistenceGateway,
    T: From<PollEvent> + Send + 'static,
{
    PollerHandle(tokio::spawn(async move {
        let mut interval = ticker(period);
        loop {
            interval.tick().await;
            let token = gateway.drift_token().await;
            debug!(?token, "drift poll");
            if tx.send(PollEvent::Drift(token).into()).is_err() {
                break;
            }
        }
    }))
}

/// Polls liveness every `period` until the receiver goes away.
pub fn spawn_liveness_poll<G, T>(gateway: Arc<G>, period: Duration, tx: UnboundedSender<T>) -> PollerHandle
where
    G: PersistenceGateway,
    T: From<PollEvent> + Send + 'static,
{
    PollerHandle(tokio::spawn(async move {
        let mut interval = ticker(period);
        loop {
            interval.tick().await;
            let signal = gateway.liveness().await;
            debug!(?signal, "liveness poll");
            if tx.send(PollEvent::Liveness(signal).into()).is_err() {
                break;
            }
        }
    }))
}

/// Both state machines, the edit cooldown and the running pollers.
#[derive(Debug)]
pub struct ChangeDetector {
    pub drift: DriftMonitor,
    pub liveness: LivenessMonitor,
    pub cooldown: EditCooldown,
    drift_period: Duration,
    liveness_period: Duration,
    pollers: Vec<PollerHandle>,
}

impl ChangeDetector {
    pub fn new(drift_period: Duration, liveness_period: Duration, cooldown: Duration) -> Self {
        Self {
            drift: DriftMonitor::default(),
            liveness: LivenessMonitor::default(),
            cooldown: EditCooldown::new(cooldown),
            drift_period,
            liveness_period,
            pollers: Vec::new(),
        }
    }

    /// Starts both pollers, aborting any that were already running.
    pub fn start<G, T>(&mut self, gateway: &Arc<G>, tx: &UnboundedSender<T>)
    where
        G: PersistenceGateway,
        T: From<PollEvent> + Send + 'static,
    {
        self.stop();
        info!(
            drift_ms = self.drift_period.as_millis() as u64,
            liveness_ms = self.liveness_period.as_millis() as u64,
            "starting pollers"
        );
        self.pollers.push(spawn_drift_poll(
            Arc::clone(gateway),
            self.drift_period,
            tx.clone(),
        ));
        self.pollers.push(spawn_liveness_poll(
            Arc::clone(gateway),
            self.liveness_period,
            tx.clone(),
        ));
    }

    pub fn stop(&mut self) {
        if !self.pollers.is_empty() {
            debug!("stopping pollers");
        }
        self.pollers.clear();
    }

    pub fn is_running(&self) -> bool {
        self.pollers.iter().any(|p| !p.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChangeDetector, Debouncer, DriftMonitor, DriftState, DriftVerdict, EditCooldown,
        GatedAction, Liveness, LivenessMonitor, PollEvent,
    };
    use crate::gateway::{DriftToken, LivenessSignal, MemoryGateway};
    use crate::{AssistError, ConfigValue};
    use std::{sync::Arc, time::Duration};
    use tokio::sync::mpsc;

    fn token(s: &str) -> DriftToken {
        DriftToken(s.to_string())
    }

    #[test]
    fn liveness_notice_fires_once_per_green() {
        let mut monitor = LivenessMonitor::default();
        let t = monitor.observe(LivenessSignal::Active).unwrap();
        assert_eq!(t.to, Liveness::Green);
        assert!(!t.connection_lost);

        assert!(monitor.observe(LivenessSignal::Idle).unwrap().connection_lost);
        assert!(!monitor.observe(LivenessSignal::Unreachable).unwrap().connection_lost);
        assert!(!monitor.observe(LivenessSignal::Idle).unwrap().connection_lost);

        monitor.observe(LivenessSignal::Active).unwrap();
        assert!(monitor.observe(LivenessSignal::Idle).unwrap().connection_lost);
    }

    #[test]
    fn lost_notice_counts_over_a_signal_sequence() {
        use LivenessSignal::{Active, Idle};
        let mut monitor = LivenessMonitor::default();
        let mut fired = |signals: &[LivenessSignal]| {
            signals
                .iter()
                .filter_map(|s| monitor.observe(*s))
                .filter(|t| t.connection_lost)
                .count()
        };
        assert_eq!(fired(&[Active, Active, Idle]), 1);
        assert_eq!(fired(&[Idle, Idle, Idle]), 0);
        assert_eq!(fired(&[Active]), 0);
        assert_eq!(fired(&[Idle]), 1);
    }

    #[test]
    fn repeated_signals_are_not_transitions() {
        let mut monitor = LivenessMonitor::default();
        assert_eq!(monitor.state(), Liveness::Red);
        assert!(monitor.observe(LivenessSignal::Unreachable).is_none());
        monitor.observe(LivenessSignal::Active);
        assert!(monitor.observe(LivenessSignal::Active).is_none());
    }

    #[test]
    fn gated_actions_lock_unless_green() {
        let mut monitor = LivenessMonitor::default();
        assert!(matches!(
            monitor.check(GatedAction::LiveFactionSource),
            Err(AssistError::ActionLocked(GatedAction::LiveFactionSource))
        ));
        monitor.observe(LivenessSignal::Active);
        assert!(monitor.check(GatedAction::RefreshNpcCatalog).is_ok());
        monitor.observe(LivenessSignal::Idle);
        assert!(monitor.actions_locked());
    }

    #[test]
    fn drift_baseline_then_reload() {
        let mut drift = DriftMonitor::default();
        assert_eq!(drift.observe(token("a"), false), DriftVerdict::Baseline);
        assert_eq!(drift.observe(token("a"), false), DriftVerdict::Unchanged);
        assert_eq!(drift.observe(token("b"), false), DriftVerdict::Reload);
        assert!(matches!(drift.state(), DriftState::Stale { .. }));
        drift.reloaded();
        assert_eq!(drift.state(), &DriftState::Synced(token("b")));
        assert_eq!(drift.observe(token("b"), false), DriftVerdict::Unchanged);
    }

    #[test]
    fn drift_is_suppressed_while_editing_and_not_adopted() {
        let mut drift = DriftMonitor::default();
        drift.observe(token("a"), false);
        assert_eq!(drift.observe(token("b"), true), DriftVerdict::Suppressed);
        assert_eq!(drift.state(), &DriftState::Synced(token("a")));
        assert_eq!(drift.observe(token("b"), false), DriftVerdict::Reload);
    }

    #[test]
    fn acknowledged_save_is_not_drift() {
        let mut drift = DriftMonitor::default();
        drift.observe(token("a"), false);
        drift.acknowledge(token("b"));
        assert_eq!(drift.observe(token("b"), false), DriftVerdict::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_clears_after_quiet_period() {
        let mut cooldown = EditCooldown::new(Duration::from_millis(3000));
        assert!(!cooldown.is_active());
        cooldown.note_input();
        tokio::time::advance(Duration::from_millis(2999)).await;
        assert!(cooldown.is_active());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!cooldown.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_restarts_on_each_schedule() {
        let mut debounce = Debouncer::new(Duration::from_millis(750));
        debounce.schedule();
        tokio::time::advance(Duration::from_millis(500)).await;
        debounce.schedule();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!debounce.take_due());
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(debounce.take_due());
        assert!(!debounce.take_due());
        assert!(!debounce.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn pollers_report_and_stop_on_drop() {
        let gateway = Arc::new(MemoryGateway::new(ConfigValue::default()));
        let (tx, mut rx) = mpsc::unbounded_channel::<PollEvent>();
        let mut detector = ChangeDetector::new(
            Duration::from_millis(2500),
            Duration::from_millis(2000),
            Duration::from_millis(3000),
        );
        detector.start(&gateway, &tx);
        assert!(detector.is_running());

        let mut drift = 0;
        let mut liveness = 0;
        for _ in 0..2 {
            match rx.recv().await {
                Some(PollEvent::Drift(Ok(_))) => drift += 1,
                Some(PollEvent::Liveness(LivenessSignal::Active)) => liveness += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!((drift, liveness), (1, 1));

        detector.stop();
        assert!(!detector.is_running());
        drop(tx);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
