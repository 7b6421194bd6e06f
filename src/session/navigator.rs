use std::sync::{Mutex, PoisonError};

/// Where the user currently is, and how to send them somewhere else.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> String;
    /// Hard redirect. Any in-progress view state is abandoned.
    fn redirect(&self, route: &str);
}

/// Navigator that records redirects instead of performing them.
#[derive(Debug)]
pub struct InMemoryNavigator {
    inner: Mutex<NavigatorState>,
}

#[derive(Debug)]
struct NavigatorState {
    current: String,
    redirects: Vec<String>,
}

impl InMemoryNavigator {
    pub fn new(initial_route: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(NavigatorState {
                current: initial_route.into(),
                redirects: Vec::new(),
            }),
        }
    }

    /// Move to `route` without counting it as a redirect.
    pub fn navigate(&self, route: impl Into<String>) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).current = route.into();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .redirects
            .clone()
    }
}

impl Default for InMemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for InMemoryNavigator {
    fn current_route(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn redirect(&self, route: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.current = route.to_string();
        inner.redirects.push(route.to_string());
    }
}

/// True when `route` is `login_route`, ignoring any query string or fragment.
pub fn is_on_route(route: &str, login_route: &str) -> bool {
    let path = route
        .split(['?', '#'])
        .next()
        .unwrap_or(route)
        .trim_end_matches('/');
    path == login_route.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_are_recorded() {
        let nav = InMemoryNavigator::new("/dashboard");
        nav.navigate("/employees");
        nav.redirect("/login");

        assert_eq!(nav.current_route(), "/login");
        assert_eq!(nav.redirects(), vec!["/login".to_string()]);
    }

    #[test]
    fn login_route_matching() {
        assert!(is_on_route("/login", "/login"));
        assert!(is_on_route("/login?next=/leave", "/login"));
        assert!(is_on_route("/login/", "/login"));
        assert!(!is_on_route("/login-help", "/login"));
        assert!(!is_on_route("/dashboard", "/login"));
    }
}
