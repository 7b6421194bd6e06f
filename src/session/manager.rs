use super::api::{AuthApi, RefreshResult};
use super::navigator::{is_on_route, Navigator};
use super::platform::{PlatformEvent, PlatformEventBus, Subscription};
use super::store::AuthStore;
use crate::config::SessionConfig;
use crate::metrics::RuntimeMetrics;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not monitoring; the user may or may not be signed in.
    Idle,
    /// Refresh and timeout timers are armed.
    Monitoring,
    /// Store cleared and user sent to the login route.
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    Logout,
    Timeout,
    RefreshFailed,
    ValidationFailed,
}

impl TeardownReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            TeardownReason::Logout => "logout",
            TeardownReason::Timeout => "timeout",
            TeardownReason::RefreshFailed => "refresh_failed",
            TeardownReason::ValidationFailed => "validation_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Monitoring guard was false; monitoring stopped instead.
    Skipped,
    /// Monitoring restarted or stopped while the call was in flight.
    Discarded,
    /// Refresh failed and the session was torn down.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityCheck {
    Valid,
    /// Guard was false; nothing was checked.
    Skipped,
    /// The check failed but a refresh brought the session back.
    Recovered,
    /// Superseded by a start, stop or teardown while in flight.
    Discarded,
    Ended,
}

#[derive(Debug)]
struct SessionTimers {
    state: SessionState,
    refresh: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
    session_id: Option<Uuid>,
}

/// Keeps an authenticated session alive and ends it when it must end.
///
/// While monitoring, a periodic task refreshes the token pair and a single
/// absolute timeout ends the session unless user activity pushes it back.
/// Every ending (logout, timeout, failed refresh, failed validation) goes
/// through one teardown path that clears the store and redirects to the
/// login route exactly once.
///
/// Refresh results are tagged with the monitoring generation they started
/// under; results that land after monitoring restarted or stopped are
/// dropped.
pub struct SessionManager {
    config: SessionConfig,
    api: Arc<dyn AuthApi>,
    store: Arc<dyn AuthStore>,
    navigator: Arc<dyn Navigator>,
    metrics: Arc<RuntimeMetrics>,
    timers: Mutex<SessionTimers>,
    generation: AtomicU64,
    self_ref: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        api: Arc<dyn AuthApi>,
        store: Arc<dyn AuthStore>,
        navigator: Arc<dyn Navigator>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            api,
            store,
            navigator,
            metrics,
            timers: Mutex::new(SessionTimers {
                state: SessionState::Idle,
                refresh: None,
                timeout: None,
                session_id: None,
            }),
            generation: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AuthStore> {
        &self.store
    }

    pub async fn state(&self) -> SessionState {
        self.timers.lock().await.state
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.timers.lock().await.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Monitoring is wanted only off the login route and with a token present.
    pub async fn should_monitor_session(&self) -> bool {
        if is_on_route(&self.navigator.current_route(), &self.config.login_route) {
            return false;
        }
        self.store.is_authenticated().await
    }

    /// Begin monitoring after a successful sign-in.
    ///
    /// Calling this while already monitoring re-arms both timers; there is
    /// never more than one of each.
    pub async fn login(&self) {
        let mut timers = self.timers.lock().await;
        if timers.state != SessionState::Monitoring {
            timers.session_id = Some(Uuid::new_v4());
        }
        self.start_monitoring_locked(&mut timers);
        tracing::info!(
            session_id = ?timers.session_id,
            generation = self.generation(),
            "Session monitoring started"
        );
    }

    pub async fn logout(&self) {
        self.handle_session_timeout(TeardownReason::Logout).await;
    }

    /// Stop the timers without ending the session.
    pub async fn stop_monitoring(&self) {
        let mut timers = self.timers.lock().await;
        if timers.state != SessionState::Monitoring {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_timers(&mut timers);
        timers.state = SessionState::Idle;
        tracing::debug!(session_id = ?timers.session_id, "Session monitoring stopped");
    }

    /// Push the absolute timeout back to a full period from now.
    ///
    /// Only has an effect while monitoring. Returns whether the timeout was
    /// re-armed.
    pub async fn extend_session(&self) -> bool {
        let mut timers = self.timers.lock().await;
        if timers.state != SessionState::Monitoring {
            return false;
        }
        if let Some(handle) = timers.timeout.take() {
            handle.abort();
            self.metrics.increment_timeout_timers_cleared();
        }
        timers.timeout = Some(self.spawn_timeout_timer());
        self.metrics.increment_timeout_timers_created();
        self.metrics.increment_session_extensions();
        tracing::trace!("Session timeout extended");
        true
    }

    /// End the session for `reason`.
    ///
    /// Safe to call from inside the manager's own timer tasks: the teardown
    /// runs on a separate task so aborting those timers cannot cut it short.
    pub async fn handle_session_timeout(&self, reason: TeardownReason) {
        self.detached(move |manager| async move { manager.teardown(reason).await })
            .await;
    }

    /// One tick of the refresh timer.
    pub async fn refresh_tick(&self) -> RefreshOutcome {
        if !self.should_monitor_session().await {
            self.metrics.increment_guard_skips();
            tracing::debug!("Monitoring guard no longer holds, stopping refresh");
            self.detached(|manager| async move { manager.stop_monitoring().await })
                .await;
            return RefreshOutcome::Skipped;
        }
        self.refresh_token(TeardownReason::RefreshFailed).await
    }

    /// Ask the backend whether the session is still good, refreshing once if
    /// it is not.
    pub async fn check_session_validity(&self) -> ValidityCheck {
        if !self.should_monitor_session().await {
            return ValidityCheck::Skipped;
        }

        self.metrics.increment_validations();
        if let Err(error) = self.store.reload().await {
            tracing::warn!(%error, "Failed to reload auth store before validation");
        }

        let valid = match self.store.tokens().await {
            Some(tokens) => match self.api.current_user(&tokens.token).await {
                Ok(valid) => valid,
                Err(error) => {
                    tracing::warn!(%error, "Session validation request failed");
                    false
                }
            },
            None => false,
        };
        if valid {
            return ValidityCheck::Valid;
        }

        self.metrics.increment_validation_failures();
        tracing::info!("Session validation failed, attempting refresh");
        match self.refresh_token(TeardownReason::ValidationFailed).await {
            RefreshOutcome::Refreshed => ValidityCheck::Recovered,
            RefreshOutcome::Discarded | RefreshOutcome::Skipped => ValidityCheck::Discarded,
            RefreshOutcome::Failed => ValidityCheck::Ended,
        }
    }

    /// React to a single platform event.
    pub async fn handle_platform_event(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::VisibilityChanged { visible: true } | PlatformEvent::FocusGained => {
                self.on_foreground().await;
            }
            PlatformEvent::VisibilityChanged { visible: false } => {
                tracing::debug!("Page hidden");
            }
            PlatformEvent::Online => {
                if self.state().await == SessionState::Monitoring {
                    self.check_session_validity().await;
                }
            }
            PlatformEvent::Offline => {
                tracing::debug!("Connection lost");
            }
            PlatformEvent::UserActivity(_) => {}
        }
    }

    /// Listen for visibility, focus and connectivity changes on `bus`.
    pub fn attach_platform_events(&self, bus: &PlatformEventBus) -> Subscription {
        let mut events = bus.subscribe();
        let manager = self.self_ref.clone();
        Subscription::new(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PlatformEvent::UserActivity(_)) => {}
                    Ok(event) => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.handle_platform_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Platform event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn on_foreground(&self) {
        if !self.should_monitor_session().await {
            self.stop_monitoring().await;
            return;
        }
        {
            let mut timers = self.timers.lock().await;
            if timers.state != SessionState::Monitoring {
                timers.session_id = Some(Uuid::new_v4());
                self.start_monitoring_locked(&mut timers);
                tracing::info!(session_id = ?timers.session_id, "Session monitoring resumed");
            }
        }
        self.check_session_validity().await;
    }

    async fn refresh_token(&self, reason: TeardownReason) -> RefreshOutcome {
        self.metrics.increment_refresh_attempts();
        let generation = self.generation();

        let result = match self.store.tokens().await {
            Some(tokens) => self.api.refresh(&tokens.refresh_token).await,
            None => Ok(RefreshResult::Failure {
                message: "no refresh token available".to_string(),
            }),
        };

        let timers = self.timers.lock().await;
        if self.generation() != generation {
            self.metrics.increment_stale_refreshes_discarded();
            tracing::debug!(
                started = generation,
                current = self.generation(),
                "Discarding refresh result from a previous monitoring run"
            );
            return RefreshOutcome::Discarded;
        }

        let message = match result {
            Ok(RefreshResult::Success { tokens, user }) => {
                if let Err(error) = self.store.set_tokens(tokens).await {
                    tracing::warn!(%error, "Failed to persist refreshed tokens");
                }
                if let Some(user) = user {
                    if let Err(error) = self.store.set_user(user).await {
                        tracing::warn!(%error, "Failed to persist refreshed user");
                    }
                }
                self.metrics.increment_refresh_successes();
                tracing::debug!(session_id = ?timers.session_id, "Session token refreshed");
                return RefreshOutcome::Refreshed;
            }
            Ok(RefreshResult::Failure { message }) => message,
            Err(error) => error.to_string(),
        };
        drop(timers);

        self.metrics.increment_refresh_failures();
        tracing::warn!(error = %message, reason = reason.as_str(), "Token refresh failed");
        self.handle_session_timeout(reason).await;
        RefreshOutcome::Failed
    }

    async fn teardown(&self, reason: TeardownReason) {
        let mut timers = self.timers.lock().await;
        if timers.state == SessionState::TornDown {
            tracing::debug!(reason = reason.as_str(), "Session already torn down");
            return;
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_timers(&mut timers);
        timers.state = SessionState::TornDown;
        let session_id = timers.session_id.take();

        match reason {
            TeardownReason::Logout => self.metrics.increment_teardowns_logout(),
            TeardownReason::Timeout => self.metrics.increment_teardowns_timeout(),
            TeardownReason::RefreshFailed => self.metrics.increment_teardowns_refresh_failed(),
            TeardownReason::ValidationFailed => {
                self.metrics.increment_teardowns_validation_failed()
            }
        }

        if let Err(error) = self.store.clear().await {
            tracing::warn!(%error, "Failed to clear auth store during teardown");
        }
        self.navigator.redirect(&self.config.login_route);

        tracing::info!(
            ?session_id,
            reason = reason.as_str(),
            redirect = %self.config.login_route,
            "Session ended"
        );
    }

    async fn on_session_expired(&self) {
        {
            let mut timers = self.timers.lock().await;
            // The running timer is this task; drop its handle without aborting.
            if timers.timeout.take().is_none() {
                return;
            }
            self.metrics.increment_timeout_timers_cleared();
        }
        tracing::info!(
            timeout_secs = self.config.session_timeout_secs,
            "Session timed out without activity"
        );
        self.handle_session_timeout(TeardownReason::Timeout).await;
    }

    fn start_monitoring_locked(&self, timers: &mut SessionTimers) {
        self.clear_timers(timers);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        timers.refresh = Some(self.spawn_refresh_timer(generation));
        self.metrics.increment_refresh_timers_created();
        timers.timeout = Some(self.spawn_timeout_timer());
        self.metrics.increment_timeout_timers_created();
        timers.state = SessionState::Monitoring;
    }

    fn clear_timers(&self, timers: &mut SessionTimers) {
        if let Some(handle) = timers.refresh.take() {
            handle.abort();
            self.metrics.increment_refresh_timers_cleared();
        }
        if let Some(handle) = timers.timeout.take() {
            handle.abort();
            self.metrics.increment_timeout_timers_cleared();
        }
    }

    /// Refresh period with up to `refresh_jitter` of it shaved off.
    fn jittered_refresh_interval(&self) -> Duration {
        let base = self.config.refresh_interval().max(MIN_TIMER_PERIOD);
        let jitter = self.config.refresh_jitter.clamp(0.0, 0.99);
        if jitter == 0.0 {
            return base;
        }
        let shave = base.mul_f64(jitter * fastrand::f64());
        base.saturating_sub(shave).max(MIN_TIMER_PERIOD)
    }

    fn spawn_refresh_timer(&self, generation: u64) -> JoinHandle<()> {
        let manager = self.self_ref.clone();
        let period = self.jittered_refresh_interval();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else { break };
                if manager.generation() != generation {
                    break;
                }
                manager.refresh_tick().await;
            }
        })
    }

    fn spawn_timeout_timer(&self) -> JoinHandle<()> {
        let manager = self.self_ref.clone();
        let timeout = self.config.session_timeout();
        tokio::spawn(async move {
            sleep(timeout).await;
            if let Some(manager) = manager.upgrade() {
                manager.on_session_expired().await;
            }
        })
    }

    /// Run `f` on its own task and wait for it.
    async fn detached<F, Fut>(&self, f: F)
    where
        F: FnOnce(Arc<SessionManager>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(manager) = self.self_ref.upgrade() else {
            return;
        };
        if let Err(error) = tokio::spawn(f(manager)).await {
            if error.is_panic() {
                tracing::error!(%error, "Session task panicked");
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let timers = self.timers.get_mut();
        for handle in [timers.refresh.take(), timers.timeout.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}
