//! Session lifecycle: periodic token refresh, absolute inactivity timeout,
//! and teardown to the login route.
//!
//! The manager is driven by three collaborators supplied by the host: an
//! [`AuthApi`] that talks to the backend, an [`AuthStore`] holding tokens,
//! and a [`Navigator`] for the current route and redirects. Platform signals
//! (focus, visibility, connectivity, user input) arrive on a
//! [`PlatformEventBus`].

pub mod activity;
pub mod api;
pub mod http;
pub mod manager;
pub mod navigator;
pub mod platform;
pub mod store;

pub use activity::track_user_activity;
pub use api::{AuthApi, AuthApiError, RefreshResult, TokenPair, UserProfile};
pub use http::HttpAuthApi;
pub use manager::{RefreshOutcome, SessionManager, SessionState, TeardownReason, ValidityCheck};
pub use navigator::{InMemoryNavigator, Navigator};
pub use platform::{ActivityKind, PlatformEvent, PlatformEventBus, Subscription};
pub use store::{AuthState, AuthStore, FileAuthStore, InMemoryAuthStore, StoreError};
