use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::Dispatcher;
use super::envelope;

/// `POST /` with a form-encoded body. Always answers 200.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", post(handle))
        .with_state(dispatcher)
}

async fn handle(
    State(dispatcher): State<Arc<Dispatcher>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Json<Value> {
    match form {
        Ok(Form(params)) => Json(dispatcher.handle(params).await),
        Err(rejection) => {
            warn!(error = %rejection, "unreadable request body");
            Json(envelope::error(rejection.body_text()))
        }
    }
}

/// Serves until ctrl-c.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "training server listening");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler unavailable");
            }
            info!("shutdown requested");
        })
        .await
        .context("training server failed")
}
