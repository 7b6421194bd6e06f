//! Wiring for a dashboard client process.

use crate::config::Config;
use crate::metrics::RuntimeMetrics;
use crate::performance::{PerformanceBudget, PerformanceEntrySource, PerformanceMonitor};
use crate::rate_limit::RateLimiters;
use crate::session::{
    track_user_activity, AuthApi, AuthStore, HttpAuthApi, Navigator, PlatformEventBus,
    SessionManager, Subscription,
};
use std::sync::Arc;

/// Every long-lived component, built from one [`Config`] and sharing one
/// [`RuntimeMetrics`].
pub struct Runtime {
    pub config: Arc<Config>,
    pub metrics: Arc<RuntimeMetrics>,
    pub rate_limiters: RateLimiters,
    pub session: Arc<SessionManager>,
    pub budget: Arc<PerformanceBudget>,
    pub performance: Arc<PerformanceMonitor>,
    pub events: PlatformEventBus,
    subscriptions: Vec<Subscription>,
}

impl Runtime {
    pub fn new(
        config: Config,
        api: Arc<dyn AuthApi>,
        store: Arc<dyn AuthStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let config = Arc::new(config);
        let metrics = Arc::new(RuntimeMetrics::new());

        let rate_limiters = RateLimiters::from_config(&config.rate_limits, Arc::clone(&metrics));
        let session = SessionManager::new(
            config.session.clone(),
            api,
            store,
            navigator,
            Arc::clone(&metrics),
        );
        let budget = Arc::new(PerformanceBudget::from_config(
            &config.performance,
            Some(Arc::clone(&metrics)),
        ));
        let performance = Arc::new(PerformanceMonitor::new(
            config.performance.clone(),
            Some(Arc::clone(&budget)),
            Arc::clone(&metrics),
        ));
        let events = PlatformEventBus::new(config.session.event_channel_capacity);

        Self {
            config,
            metrics,
            rate_limiters,
            session,
            budget,
            performance,
            events,
            subscriptions: Vec::new(),
        }
    }

    /// Build a runtime that talks to the configured backend over HTTP.
    pub fn with_http_api(
        config: Config,
        store: Arc<dyn AuthStore>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let api = HttpAuthApi::from_config(&config.session)?;
        Ok(Self::new(config, Arc::new(api), store, navigator))
    }

    /// Attach session listeners and start the performance monitor.
    pub async fn start(&mut self, entries: &dyn PerformanceEntrySource) {
        if self.subscriptions.is_empty() {
            self.subscriptions
                .push(self.session.attach_platform_events(&self.events));
            self.subscriptions
                .push(track_user_activity(&self.session, &self.events));
        }
        self.performance.start(entries);

        if self.session.should_monitor_session().await {
            self.session.login().await;
        }
        tracing::info!(
            buckets = self.rate_limiters.iter().count(),
            "Runtime started"
        );
    }

    /// Stop listeners, timers and the monitor. The auth store is left as is.
    pub async fn shutdown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.session.stop_monitoring().await;
        self.performance.destroy();
        tracing::info!("Runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::performance::ChannelEntrySource;
    use crate::session::{
        InMemoryAuthStore, InMemoryNavigator, PlatformEvent, SessionState, TokenPair,
    };

    fn runtime(store: InMemoryAuthStore) -> Runtime {
        Runtime::with_http_api(
            Config::default(),
            Arc::new(store),
            Arc::new(InMemoryNavigator::new("/dashboard")),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn start_resumes_monitoring_for_signed_in_user() {
        let mut runtime = runtime(InMemoryAuthStore::with_tokens(TokenPair::new("a", "r")));
        runtime.start(&ChannelEntrySource::all(8)).await;

        assert_eq!(runtime.session.state().await, SessionState::Monitoring);
        assert!(runtime.performance.is_running());
        assert_eq!(runtime.events.subscriber_count(), 2);

        runtime.shutdown().await;
        assert_eq!(runtime.session.state().await, SessionState::Idle);
        assert!(!runtime.performance.is_running());
        assert_eq!(runtime.metrics.active_refresh_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_user_is_not_monitored() {
        let mut runtime = runtime(InMemoryAuthStore::new());
        runtime.start(&ChannelEntrySource::all(8)).await;
        runtime.events.emit(PlatformEvent::FocusGained);
        tokio::task::yield_now().await;

        assert_eq!(runtime.session.state().await, SessionState::Idle);
        runtime.shutdown().await;
    }
}
