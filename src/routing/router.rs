//! Route lookup.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Enforce a single default route
//! - Look up the route serving a request path
//!
//! # Design Decisions
//! - `RouteTable` is the mutable builder; `Router` is the frozen form
//! - O(n) scan (route counts are tiny)
//! - Explicit `None` when nothing matches and no default exists

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dispatch::handler::Handler;
use crate::routing::matcher::{MatchOutcome, Matcher};

/// Route table configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("a default handler is already registered")]
    DuplicateDefault,
}

/// A (matcher, handler) pair.
#[derive(Clone)]
pub struct Route {
    matcher: Matcher,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(matcher: Matcher, handler: Arc<dyn Handler>) -> Self {
        Self { matcher, handler }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> String {
        self.matcher.to_string()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("matcher", &self.matcher).finish_non_exhaustive()
    }
}

/// Ordered, still-mutable route list.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    default: Option<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Earlier registrations win when several match.
    ///
    /// A `Matcher::Wildcard` registration is a default registration.
    pub fn register(&mut self, matcher: Matcher, handler: Arc<dyn Handler>) -> Result<(), RouteError> {
        if matcher.is_wildcard() {
            return self.register_default(handler);
        }
        tracing::debug!(route = %matcher, position = self.routes.len(), "Route registered");
        self.routes.push(Route::new(matcher, handler));
        Ok(())
    }

    /// Register the fallback handler. Fails if one is already present.
    pub fn register_default(&mut self, handler: Arc<dyn Handler>) -> Result<(), RouteError> {
        if self.default.is_some() {
            return Err(RouteError::DuplicateDefault);
        }
        tracing::debug!("Default route registered");
        self.default = Some(Route::new(Matcher::Wildcard, handler));
        Ok(())
    }

    /// Number of non-default routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.default.is_none()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Freeze into an immutable router.
    pub fn freeze(self) -> Router {
        Router {
            routes: self.routes,
            default: self.default,
        }
    }
}

/// Immutable route list used while serving.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
    default: Option<Route>,
}

/// The route chosen for a request.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub route: &'a Route,
    pub outcome: MatchOutcome,
}

impl Router {
    /// Find the first matching route, falling back to the default.
    pub fn resolve(&self, path: &str) -> Option<Resolved<'_>> {
        self.routes
            .iter()
            .find_map(|route| {
                route
                    .matcher
                    .matches(path)
                    .map(|outcome| Resolved { route, outcome })
            })
            .or_else(|| {
                self.default.as_ref().map(|route| Resolved {
                    route,
                    outcome: MatchOutcome::Default,
                })
            })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len() + usize::from(self.default.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agi::CallSession;
    use crate::dispatch::handler::{CallContext, HandlerError};
    use async_trait::async_trait;

    struct Nop;

    #[async_trait]
    impl Handler for Nop {
        async fn handle(&self, _: &mut dyn CallSession, _: &CallContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn nop() -> Arc<dyn Handler> {
        Arc::new(Nop)
    }

    #[test]
    fn first_registration_wins() {
        let first = nop();
        let second = nop();
        let mut table = RouteTable::new();
        table.register(Matcher::prefix("de"), first.clone()).unwrap();
        table.register(Matcher::exact("demo"), second.clone()).unwrap();
        let router = table.freeze();

        let resolved = router.resolve("demo").unwrap();
        assert!(Arc::ptr_eq(resolved.route.handler(), &first));
        assert_eq!(resolved.outcome, MatchOutcome::Prefix { rest: "mo".into() });
    }

    #[test]
    fn default_used_when_nothing_matches() {
        let default = nop();
        let mut table = RouteTable::new();
        table.register(Matcher::exact("demo"), nop()).unwrap();
        table.register_default(default.clone()).unwrap();
        let router = table.freeze();

        let resolved = router.resolve("xyz").unwrap();
        assert!(Arc::ptr_eq(resolved.route.handler(), &default));
        assert_eq!(resolved.outcome, MatchOutcome::Default);
        assert_eq!(router.route_count(), 2);
    }

    #[test]
    fn default_is_evaluated_last() {
        let specific = nop();
        let mut table = RouteTable::new();
        table.register_default(nop()).unwrap();
        table.register(Matcher::exact("demo"), specific.clone()).unwrap();
        let router = table.freeze();

        assert!(Arc::ptr_eq(router.resolve("demo").unwrap().route.handler(), &specific));
    }

    #[test]
    fn second_default_rejected() {
        let mut table = RouteTable::new();
        table.register_default(nop()).unwrap();
        assert_eq!(table.register_default(nop()), Err(RouteError::DuplicateDefault));
        assert_eq!(table.register(Matcher::Wildcard, nop()), Err(RouteError::DuplicateDefault));
    }

    #[test]
    fn wildcard_registration_counts_as_default() {
        let mut table = RouteTable::new();
        table.register(Matcher::Wildcard, nop()).unwrap();
        assert!(table.has_default());
        assert_eq!(table.len(), 0);
        assert_eq!(table.register_default(nop()), Err(RouteError::DuplicateDefault));
    }

    #[test]
    fn no_match_without_default() {
        let mut table = RouteTable::new();
        table.register(Matcher::exact("demo"), nop()).unwrap();
        assert!(table.freeze().resolve("other").is_none());
    }
}
