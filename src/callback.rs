//! One-shot loopback listener that receives the consent redirect.

use std::future::IntoFuture;
use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::{Query, State};
use axum::{routing, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};

pub const SUCCESS_MESSAGE: &str =
    "The authentication flow has completed. You may close this window.";
pub const FAILURE_MESSAGE: &str =
    "The authentication flow did not complete. You may close this window.";

#[derive(Clone)]
struct AppState {
    expected_state: String,
    outcome_tx: mpsc::UnboundedSender<Result<String>>,
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CallbackParam {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CallbackParam {
    /// Extracts the authorization code, checking `state` against the one
    /// sent with the consent request.
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        let Self { code, state, error } = self;
        if let Some(error) = error {
            return Err(Error::AuthorizationDenied(error));
        }
        if state.as_deref() != Some(expected_state) {
            return Err(Error::StateMismatch);
        }
        match code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(Error::AuthorizationDenied(
                "missing authorization code".to_string(),
            )),
        }
    }
}

pub fn make_router(
    expected_state: String,
    outcome_tx: mpsc::UnboundedSender<Result<String>>,
) -> Router {
    let state = AppState {
        expected_state,
        outcome_tx,
    };
    let layer = tower::ServiceBuilder::new().layer(TraceLayer::new_for_http());
    Router::new()
        .route("/", routing::get(callback))
        .with_state(state)
        .layer(layer)
}

#[tracing::instrument(skip_all)]
async fn callback(
    State(state): State<AppState>,
    Query(param): Query<CallbackParam>,
) -> (http::StatusCode, &'static str) {
    let outcome = param.into_code(&state.expected_state);
    let response = match &outcome {
        Ok(_) => {
            tracing::info!("received authorization code");
            (http::StatusCode::OK, SUCCESS_MESSAGE)
        }
        Err(e) => {
            tracing::warn!(%e, "redirect did not carry a usable code");
            (http::StatusCode::BAD_REQUEST, FAILURE_MESSAGE)
        }
    };
    let Ok(()) = state.outcome_tx.send(outcome) else {
        tracing::error!("mpsc channel error");
        return (http::StatusCode::INTERNAL_SERVER_ERROR, "channel error");
    };
    response
}

/// A bound loopback listener waiting for exactly one redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Binds `127.0.0.1:port`. Port `0` lets the OS choose.
    #[tracing::instrument]
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::PortUnavailable { port, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| Error::PortUnavailable { port, source })?
            .port();
        tracing::info!("listening on {addr}");
        Ok(Self { listener, port })
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until the first redirect arrives, then shuts the listener
    /// down and returns the authorization code it carried.
    ///
    /// Waits without a timeout.
    #[tracing::instrument(skip_all, fields(port = self.port))]
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        let Self { listener, .. } = self;
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let router = make_router(expected_state.to_string(), outcome_tx);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            match shutdown_rx.await {
                Ok(()) => {}
                Err(e) => tracing::error!(%e, "shutdown signal error"),
            }
        });
        let serve = tokio::spawn(serve.into_future());

        let outcome = outcome_rx.recv().await;
        if let Err(()) = shutdown_tx.send(()) {
            tracing::debug!("listener already stopped");
        }
        serve
            .await
            .map_err(|e| Error::io("callback listener crashed", std::io::Error::other(e)))?
            .map_err(|e| Error::io("callback listener failed", e))?;
        outcome.unwrap_or_else(|| {
            Err(Error::AuthorizationDenied(
                "listener closed before any redirect arrived".to_string(),
            ))
        })
    }
}
