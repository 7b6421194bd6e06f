use super::manager::SessionManager;
use super::platform::{PlatformEvent, PlatformEventBus, Subscription};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Extend the session whenever the user does something.
///
/// Every [`ActivityKind`](super::platform::ActivityKind) published on `bus`
/// pushes the absolute timeout back. The returned [`Subscription`] stops the
/// listener when unsubscribed or dropped.
pub fn track_user_activity(manager: &Arc<SessionManager>, bus: &PlatformEventBus) -> Subscription {
    let mut events = bus.subscribe();
    let manager = Arc::downgrade(manager);

    Subscription::new(tokio::spawn(async move {
        loop {
            let activity = match events.recv().await {
                Ok(PlatformEvent::UserActivity(kind)) => Some(kind),
                Ok(_) => continue,
                // Dropped events were still activity.
                Err(RecvError::Lagged(_)) => None,
                Err(RecvError::Closed) => break,
            };
            let Some(manager) = manager.upgrade() else { break };
            if manager.extend_session().await {
                tracing::trace!(activity = ?activity, "User activity extended session");
            }
        }
    }))
}
