use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::monitor::{Interceptor, MethodIdentity};

/// Per-controller state for [`monitor_requests`].
///
/// Install with `route_layer` so the matched route template is known:
///
/// ```ignore
/// Router::new()
///     .route("/api/users/:id", get(get_user))
///     .route_layer(from_fn_with_state(
///         RouteMonitor::new(interceptor, "UserController"),
///         monitor_requests,
///     ))
/// ```
#[derive(Debug, Clone)]
pub struct RouteMonitor {
    interceptor: Arc<Interceptor>,
    controller: &'static str,
}

impl RouteMonitor {
    pub fn new(interceptor: Arc<Interceptor>, controller: &'static str) -> Self {
        Self {
            interceptor,
            controller,
        }
    }

    /// `Controller` / `"GET /api/users/:id"` / number of path parameters.
    ///
    /// Built from the route template, never the concrete path, so the set
    /// of timers stays bounded by the set of routes.
    pub fn identity(&self, method: &str, route: &str) -> MethodIdentity {
        MethodIdentity::new(
            module_path!(),
            self.controller,
            format!("{method} {route}"),
            path_params(route),
        )
    }
}

/// Times each request to a monitored route. Responses pass through as-is;
/// no headers are added.
pub async fn monitor_requests(
    State(route): State<RouteMonitor>,
    req: Request,
    next: Next,
) -> Response {
    if !route.interceptor.policy().matches_http(req.method()) {
        return next.run(req).await;
    }
    // Without a matched path (e.g. installed with `layer`) there is no
    // stable identity to time under.
    let Some(path) = req.extensions().get::<MatchedPath>().cloned() else {
        return next.run(req).await;
    };

    let identity = route.identity(req.method().as_str(), path.as_str());
    route
        .interceptor
        .intercept_async(&identity, next.run(req))
        .await
}

fn path_params(route: &str) -> usize {
    route
        .split('/')
        .filter(|seg| seg.starts_with(':') || seg.starts_with('*') || seg.starts_with('{'))
        .count()
}
