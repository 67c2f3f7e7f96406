//! Per-request database transaction.
//!
//! A transaction is opened before the request is handled and stored in
//! the request extensions; handlers borrow it as their executor. After
//! the response is produced, the transaction is committed for success
//! statuses and rolled back for any status of 400 or above, so failed
//! requests leave no writes behind.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::error;

use crate::AppState;
use crate::error::AppError;

/// The request's transaction slot. `None` once taken for completion.
pub type RequestTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

pub async fn transaction(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let tx = state
        .pool
        .begin()
        .await
        .map_err(|e| AppError::internal(format!("failed to begin transaction: {e}")))?;

    let slot: RequestTx = Arc::new(Mutex::new(Some(tx)));
    request.extensions_mut().insert(slot.clone());

    let response = next.run(request).await;

    let Some(tx) = slot.lock().await.take() else {
        return Ok(response);
    };
    if response.status().as_u16() >= 400 {
        if let Err(e) = tx.rollback().await {
            error!(error = %e, "failed to roll back request transaction");
        }
    } else {
        tx.commit()
            .await
            .map_err(|e| AppError::internal(format!("failed to commit transaction: {e}")))?;
    }

    Ok(response)
}
