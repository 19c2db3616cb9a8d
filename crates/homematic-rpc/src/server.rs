// ── Callback server ───────────────────────────────────────────────────
//
// Embedded XML-RPC server the controller pushes events to. The listener is
// bound eagerly so the port is known before registration; serving starts
// and stops independently of the bind.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::envelope::{Fault, Request, Response};
use crate::error::Error;
use crate::value::Value;

/// How long `stop` waits for in-flight requests before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Fault code for request bodies that do not decode.
pub const PARSE_ERROR_CODE: i32 = -32700;

/// Answers method calls received by the callback server.
///
/// `system.listMethods` and `system.multicall` are handled by the server
/// itself; every other method, including each call inside a multicall,
/// reaches the handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Fault>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(String, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Value>, Fault>> + Send + 'static,
{
    async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Fault> {
        (self)(method.to_owned(), params).await
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// Route one decoded request to the built-ins or the handler.
pub async fn dispatch(handler: &dyn Handler, request: Request) -> Response {
    debug!(method = %request.method, params = request.params.len(), "dispatch");
    match request.method.as_str() {
        "system.listMethods" => Response::success(vec![Value::Array(vec!["event".into()])]),
        "system.multicall" => multicall(handler, request.params).await,
        _ => match handler.handle(&request.method, request.params).await {
            Ok(params) => Response::success(params),
            Err(fault) => Response::fault(fault),
        },
    }
}

async fn multicall(handler: &dyn Handler, params: Vec<Value>) -> Response {
    let Some(first) = params.into_iter().next() else {
        return Response::fault(Fault::new(1, "parameter missing"));
    };
    let Value::Array(calls) = first else {
        return Response::fault(Fault::new(1, "invalid call list"));
    };

    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        results.push(Value::Array(run_call(handler, call).await));
    }
    Response::success(results)
}

/// One multicall descriptor. Failures are folded into the result slot.
async fn run_call(handler: &dyn Handler, call: Value) -> Vec<Value> {
    let Value::Struct(mut members) = call else {
        return vec![Fault::new(2, "invalid function call").to_value()];
    };
    let Some(Value::String(method)) = members.remove("methodName") else {
        return vec![Fault::new(3, "methodName missing").to_value()];
    };
    let Some(Value::Array(params)) = members.remove("params") else {
        return vec![Fault::new(3, "params missing").to_value()];
    };

    match handler.handle(&method, params).await {
        Ok(result) => result,
        Err(fault) => vec![fault.to_value()],
    }
}

/// Per-serve state shared with every request.
#[derive(Clone)]
struct Serving {
    handler: Arc<dyn Handler>,
    /// Cancelled once the shutdown grace period has run out.
    abort: CancellationToken,
}

async fn serve_rpc(State(serving): State<Serving>, body: Bytes) -> impl IntoResponse {
    let response = match Request::parse(&body) {
        Ok(request) => {
            tokio::select! {
                response = dispatch(serving.handler.as_ref(), request) => response,
                () = serving.abort.cancelled() => {
                    Response::fault(Fault::new(-1, "server stopped"))
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "undecodable callback request");
            Response::fault(Fault::new(PARSE_ERROR_CODE, format!("parse error: {e}")))
        }
    };
    ([(header::CONTENT_TYPE, "text/xml")], response.to_xml())
}

// ── Server lifecycle ─────────────────────────────────────────────────

enum ServeState {
    Stopped,
    Running {
        cancel: CancellationToken,
        abort: CancellationToken,
        task: JoinHandle<()>,
    },
}

/// XML-RPC server bound to a local port, serving on demand.
pub struct CallbackServer {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    handler: Arc<dyn Handler>,
    state: Mutex<ServeState>,
}

impl CallbackServer {
    /// Bind `addr` (port 0 picks a free port) without serving yet.
    pub fn bind(addr: SocketAddr, handler: Arc<dyn Handler>) -> Result<Self, Error> {
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        debug!(%local_addr, "callback server bound");
        Ok(Self {
            listener,
            local_addr,
            handler,
            state: Mutex::new(ServeState::Stopped),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state.lock(), ServeState::Running { task, .. } if !task.is_finished())
    }

    /// Begin serving. A no-op while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        if matches!(&*state, ServeState::Running { task, .. } if !task.is_finished()) {
            return Ok(());
        }

        let std_listener = self.listener.try_clone()?;
        std_listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;

        let abort = CancellationToken::new();
        let app = Router::new().fallback(serve_rpc).with_state(Serving {
            handler: Arc::clone(&self.handler),
            abort: abort.clone(),
        });

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let addr = self.local_addr;
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(%addr, error = %e, "callback server terminated");
            }
        });

        info!(addr = %self.local_addr, "callback server listening");
        *state = ServeState::Running {
            cancel,
            abort,
            task,
        };
        Ok(())
    }

    /// Stop serving, waiting up to [`SHUTDOWN_GRACE`] for in-flight requests.
    /// A no-op when not running.
    ///
    /// Requests still running when the grace period ends have their handler
    /// future dropped and are answered with a fault; the handler is not
    /// resumed.
    pub async fn stop(&self) -> Result<(), Error> {
        let previous = std::mem::replace(&mut *self.state.lock(), ServeState::Stopped);
        let ServeState::Running {
            cancel,
            abort,
            mut task,
        } = previous
        else {
            return Ok(());
        };

        cancel.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => return Err(Error::Server(e.to_string())),
            Err(_) => {
                warn!(addr = %self.local_addr, "graceful shutdown timed out, aborting");
                abort.cancel();
                task.abort();
            }
        }
        info!(addr = %self.local_addr, "callback server stopped");
        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let ServeState::Running { cancel, abort, .. } = &*self.state.lock() {
            cancel.cancel();
            abort.cancel();
        }
    }
}

impl std::fmt::Debug for CallbackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Fault> {
            match method {
                "event" => Ok(vec!["111".into(), Value::Int(222)]),
                "fail" => Err(Fault::new(-1, "nope")),
                _ => Ok(params),
            }
        }
    }

    fn call(method: &str, params: Vec<Value>) -> Value {
        Value::structure([
            ("methodName", Value::from(method)),
            ("params", Value::Array(params)),
        ])
    }

    #[tokio::test]
    async fn list_methods_is_answered_by_the_server() {
        let response = dispatch(&Echo, Request::new("system.listMethods", vec![])).await;
        assert_eq!(response.params, vec![Value::Array(vec!["event".into()])]);
        assert!(response.fault.is_none());
    }

    #[tokio::test]
    async fn plain_methods_reach_the_handler() {
        let response = dispatch(&Echo, Request::new("event", vec!["aaa".into()])).await;
        assert_eq!(response.params, vec!["111".into(), Value::Int(222)]);

        let response = dispatch(&Echo, Request::new("fail", vec![])).await;
        assert_eq!(response.fault, Some(Fault::new(-1, "nope")));
    }

    #[tokio::test]
    async fn multicall_isolates_faults_per_descriptor() {
        let calls = Value::Array(vec![
            call("event", vec!["aaa".into(), "bbb".into()]),
            "aaa".into(),
            Value::structure(Vec::<(String, Value)>::new()),
            Value::structure([("methodName", Value::from("event"))]),
            call("fail", vec![]),
        ]);
        let response = dispatch(&Echo, Request::new("system.multicall", vec![calls])).await;

        assert!(response.fault.is_none());
        assert_eq!(
            response.params,
            vec![
                Value::Array(vec!["111".into(), Value::Int(222)]),
                Value::Array(vec![Fault::new(2, "invalid function call").to_value()]),
                Value::Array(vec![Fault::new(3, "methodName missing").to_value()]),
                Value::Array(vec![Fault::new(3, "params missing").to_value()]),
                Value::Array(vec![Fault::new(-1, "nope").to_value()]),
            ]
        );
    }

    #[tokio::test]
    async fn multicall_requires_a_call_list() {
        let response = dispatch(&Echo, Request::new("system.multicall", vec![])).await;
        assert_eq!(response.fault, Some(Fault::new(1, "parameter missing")));

        let response =
            dispatch(&Echo, Request::new("system.multicall", vec!["x".into()])).await;
        assert_eq!(response.fault, Some(Fault::new(1, "invalid call list")));
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let server = CallbackServer::bind("127.0.0.1:0".parse().unwrap(), Arc::new(Echo)).unwrap();
        assert_ne!(server.port(), 0);
        assert!(!server.is_running());

        server.start().unwrap();
        server.start().unwrap();
        assert!(server.is_running());

        server.stop().await.unwrap();
        server.stop().await.unwrap();
        assert!(!server.is_running());

        server.start().unwrap();
        assert!(server.is_running());
        server.stop().await.unwrap();
    }
}
