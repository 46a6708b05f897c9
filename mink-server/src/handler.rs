//! Method handlers for the [`Router`](crate::Router)
//!
//! A handler receives the request's `params` (or `None` when the member was
//! absent) and resolves to a JSON result or a `mink_core::Error`. The router
//! turns errors into wire errors:
//!
//! - `Error::InvalidParams` → -32602
//! - `Error::MethodNotFound` → -32601
//! - `Error::Rpc(e)` → `e` unchanged
//! - anything else → -32603
//!
//! ```rust
//! use mink_server::{from_fn, from_typed_fn};
//! use serde::Deserialize;
//!
//! let ping = from_fn(|_params| async { Ok(serde_json::json!("pong")) });
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! let add = from_typed_fn(|p: AddParams| async move { Ok(p.a + p.b) });
//! ```

use mink_core::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`Handler::handle`]
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A single method implementation
pub trait Handler: Send + Sync {
    /// Run the method with the request's params
    fn handle(&self, params: Option<Value>) -> HandlerResult;
}

/// Adapts an async closure over raw params into a [`Handler`]
pub struct AsyncHandler<F> {
    func: F,
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn handle(&self, params: Option<Value>) -> HandlerResult {
        Box::pin((self.func)(params))
    }
}

/// Handler from an async closure over raw JSON params
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(AsyncHandler { func })
}

/// Handler from an async closure with typed params and result
///
/// Params that do not deserialize into `P` fail with `Error::InvalidParams`.
/// A request without `params` is deserialized from `null`, so `()` and
/// `Option<_>` parameter types accept it.
///
/// ```rust
/// use mink_server::from_typed_fn;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct Greet { name: String }
///
/// #[derive(Serialize)]
/// struct Greeting { text: String }
///
/// let handler = from_typed_fn(|p: Greet| async move {
///     Ok(Greeting { text: format!("hello {}", p.name) })
/// });
/// ```
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn(move |params: Option<Value>| {
        let func = Arc::clone(&func);
        async move {
            let params: P = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| Error::InvalidParams(e.to_string()))?;

            let result = func(params).await?;
            serde_json::to_value(result).map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}
