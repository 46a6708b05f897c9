//! Method-name router
//!
//! The production [`Dispatcher`]: a map from method name to [`Handler`].
//! Unknown methods answer -32601, handler errors are converted as described in
//! [`crate::handler`]. Cloning a router is cheap and shares the handlers.
//!
//! ```rust
//! use mink_server::{from_fn, Router};
//!
//! let mut router = Router::new();
//! router.register("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }));
//! router.register("echo", from_fn(|params| async move { Ok(params.unwrap_or_default()) }));
//! assert!(router.has_method("ping"));
//! ```

use crate::dispatch::Dispatcher;
use crate::handler::Handler;
use async_trait::async_trait;
use mink_core::{Envelope, Error, Result, RpcError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes requests to handlers by method name
#[derive(Clone, Default)]
pub struct Router {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl Router {
    /// Empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same method
    pub fn register(&mut self, method: impl Into<String>, handler: Box<dyn Handler>) {
        Arc::make_mut(&mut self.handlers).insert(method.into(), Arc::from(handler));
    }

    /// Handler registered for `method`
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    /// Whether `method` is registered
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Whether no method is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `method`
    pub async fn route(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let handler = self
            .get(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;
        handler.handle(params).await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.methods())
            .finish()
    }
}

#[async_trait]
impl Dispatcher for Router {
    async fn dispatch(&self, envelope: &Envelope) -> std::result::Result<Value, RpcError> {
        tracing::debug!(method = %envelope.method, "Routing request");
        self.route(&envelope.method, envelope.params.clone())
            .await
            .map_err(RpcError::from)
    }
}

/// Fluent construction of a [`Router`]
#[derive(Default)]
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a method
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Finish
    pub fn build(self) -> Router {
        self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::respond;
    use crate::handler::{from_fn, from_typed_fn};
    use mink_core::{ErrorCode, Id};
    use serde_json::json;

    #[tokio::test]
    async fn test_router_basic() {
        let mut router = Router::new();
        router.register("test", from_fn(|_| async { Ok(json!({"status": "ok"})) }));

        assert!(router.has_method("test"));
        assert!(!router.has_method("unknown"));

        let result = router.route("test", None).await.unwrap();
        assert_eq!(result, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_router_method_not_found() {
        let router = Router::new();
        assert!(matches!(
            router.route("unknown", None).await,
            Err(Error::MethodNotFound(m)) if m == "unknown"
        ));
    }

    #[tokio::test]
    async fn test_router_builder() {
        let router = RouterBuilder::new()
            .handler("b", from_fn(|_| async { Ok(json!(2)) }))
            .handler("a", from_fn(|_| async { Ok(json!(1)) }))
            .build();

        assert_eq!(router.methods(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(router.route("a", None).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_dispatch_error_codes() {
        #[derive(serde::Deserialize)]
        struct Params {
            n: u32,
        }

        let router = RouterBuilder::new()
            .handler("square", from_typed_fn(|p: Params| async move { Ok(p.n * p.n) }))
            .handler(
                "fail",
                from_fn(|_| async { Err(Error::Internal("disk on fire".into())) }),
            )
            .build();

        let ok = respond(
            &router,
            &Envelope::new("square", Some(json!({"n": 7})), Some(Id::from(1i64))),
        )
        .await;
        assert_eq!(ok.result, Some(json!(49)));

        let missing = respond(&router, &Envelope::new("nope", None, Some(Id::from(2i64)))).await;
        assert_eq!(missing.error_code(), Some(ErrorCode::METHOD_NOT_FOUND));
        assert_eq!(missing.id, Id::from(2i64));

        let bad = respond(
            &router,
            &Envelope::new("square", Some(json!({"n": "x"})), Some(Id::from(3i64))),
        )
        .await;
        assert_eq!(bad.error_code(), Some(ErrorCode::INVALID_PARAMS));

        let failed = respond(&router, &Envelope::new("fail", None, Some(Id::from("f")))).await;
        assert_eq!(failed.error_code(), Some(ErrorCode::INTERNAL_ERROR));
        assert_eq!(failed.id, Id::from("f"));
    }
}
