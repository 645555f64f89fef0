//! Application service transaction endpoint.
//!
//! The homeserver pushes events with
//! `PUT /_matrix/app/v1/transactions/{txn_id}`. Each event is handed to Event
//! Ingress in the order it appears in the transaction; ingress failures never
//! fail the transaction, so the homeserver does not retry it.
//!
//! A transaction id is remembered only once all of its events were handled. A
//! retry of an attempt the homeserver gave up on is processed again, and a
//! retry arriving while the first attempt still runs gets `409`.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};
use serde_json::{Value, json};

use crate::{
    domain::ProtocolEvent,
    infrastructure::dto::appservice::{AccessTokenQuery, TransactionDto},
    ui::state::{AppState, TransactionStart},
};

type MatrixErrorResponse = (StatusCode, Json<Value>);

fn matrix_error(status: StatusCode, errcode: &str, error: &str) -> MatrixErrorResponse {
    (status, Json(json!({"errcode": errcode, "error": error})))
}

/// Token from `Authorization: Bearer ...`, falling back to `?access_token=`
fn presented_token<'a>(headers: &'a HeaderMap, query: &'a AccessTokenQuery) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or(query.access_token.as_deref())
}

pub async fn push_transaction(
    State(state): State<Arc<AppState>>,
    Path(txn_id): Path<String>,
    Query(query): Query<AccessTokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, MatrixErrorResponse> {
    match presented_token(&headers, &query) {
        None => {
            tracing::warn!("Transaction '{}' rejected: missing token", txn_id);
            return Err(matrix_error(
                StatusCode::UNAUTHORIZED,
                "M_UNAUTHORIZED",
                "Missing access token",
            ));
        }
        Some(token) if token != state.hs_token => {
            tracing::warn!("Transaction '{}' rejected: invalid token", txn_id);
            return Err(matrix_error(
                StatusCode::FORBIDDEN,
                "M_FORBIDDEN",
                "Invalid access token",
            ));
        }
        Some(_) => {}
    }

    let transaction: TransactionDto = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Transaction '{}' has invalid body: {}", txn_id, e);
        matrix_error(StatusCode::BAD_REQUEST, "M_NOT_JSON", "Invalid transaction body")
    })?;

    let guard = match state.transactions.begin(&txn_id) {
        TransactionStart::Started(guard) => guard,
        TransactionStart::Completed => {
            tracing::debug!("Transaction '{}' already processed", txn_id);
            return Ok(Json(json!({})));
        }
        TransactionStart::InProgress => {
            tracing::warn!("Transaction '{}' is already being processed", txn_id);
            return Err(matrix_error(
                StatusCode::CONFLICT,
                "M_UNKNOWN",
                "Transaction is already being processed",
            ));
        }
    };

    tracing::debug!(
        "Processing transaction '{}' with {} event(s)",
        txn_id,
        transaction.events.len()
    );
    for event in transaction.events {
        match ProtocolEvent::try_from(event) {
            Ok(event) => {
                state.handle_protocol_event_usecase.execute(event).await;
            }
            Err(e) => {
                tracing::warn!("Skipping event in transaction '{}': {}", txn_id, e);
            }
        }
    }
    // 全イベントを処理し終えてから記録する（途中で中断された試行は再送で処理し直す）
    guard.complete();

    Ok(Json(json!({})))
}
