//! Actions endpoints for the counter program.
//!
//! `GET /action/counter` describes the increment action; `/action/counter/tx`
//! returns an unsigned increment transaction for the caller's wallet to sign.

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{error, info};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use counter_client::{build_unsigned, RpcError};

use crate::server::AppState;

pub const ACTION_TITLE: &str = "Increment Counter";
pub const ACTION_DESCRIPTION: &str =
    "Builds a transaction to call `increment` on the counter program.";
pub const ACTION_ICON: &str = "https://avatars.githubusercontent.com/u/35608259?s=200&v=4";
pub const APPROVE_MESSAGE: &str = "Approve to increment the counter.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionMetadata {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub links: ActionLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionLinks {
    pub actions: Vec<LinkedAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedAction {
    pub label: String,
    pub href: String,
    pub parameters: Vec<ActionParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionParameter {
    pub name: String,
    pub label: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionTransaction {
    /// Base64 of the bincode-serialized unsigned transaction.
    pub transaction: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CounterQuery {
    pub counter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionBody {
    /// Wallet that will pay for the transaction.
    pub account: Option<String>,
    pub counter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Missing `counter` (public key of the counter account)")]
    MissingCounter,
    #[error("Invalid public key for `{field}`: {value}")]
    InvalidPubkey { field: &'static str, value: String },
    #[error("{0}")]
    Rpc(#[from] RpcError),
    #[error("failed to serialize transaction: {0}")]
    Serialize(#[from] bincode::Error),
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = match &self {
            ActionError::MissingCounter | ActionError::InvalidPubkey { .. } => {
                StatusCode::BAD_REQUEST
            }
            ActionError::Rpc(_) | ActionError::Serialize(_) => {
                error!("Action transaction failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Metadata for an increment action, optionally bound to a counter.
pub fn metadata(counter: Option<&str>) -> ActionMetadata {
    let href = match counter {
        Some(counter) => format!("/action/counter/tx?counter={}", counter),
        None => "/action/counter/tx".to_string(),
    };
    ActionMetadata {
        title: ACTION_TITLE.to_string(),
        description: ACTION_DESCRIPTION.to_string(),
        icon: ACTION_ICON.to_string(),
        links: ActionLinks {
            actions: vec![LinkedAction {
                label: "Increment".to_string(),
                href,
                parameters: vec![ActionParameter {
                    name: "counter".to_string(),
                    label: "Counter account (Pubkey)".to_string(),
                    required: counter.is_none(),
                }],
            }],
        },
    }
}

pub async fn get_metadata(Query(query): Query<CounterQuery>) -> Json<ActionMetadata> {
    let counter = query.counter.as_deref().filter(|c| !c.is_empty());
    Json(metadata(counter))
}

/// Handles `GET` and `POST` on `/action/counter/tx`.
///
/// `GET` takes the counter from the query. `POST` prefers the JSON body and
/// falls back to the query; its `account` becomes the fee payer.
pub async fn build_transaction(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<CounterQuery>,
    body: Option<Json<ActionBody>>,
) -> Result<Json<ActionTransaction>, ActionError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let counter = if method == Method::GET {
        query.counter
    } else {
        body.counter.or(query.counter)
    };
    let counter = counter
        .filter(|c| !c.is_empty())
        .ok_or(ActionError::MissingCounter)?;
    let counter = parse_pubkey("counter", &counter)?;
    let fee_payer = body
        .account
        .as_deref()
        .map(|account| parse_pubkey("account", account))
        .transpose()?;

    let ix = state.program.increment(&counter);
    let transaction = build_unsigned(state.rpc.as_ref(), ix, fee_payer).await?;
    let encoded = STANDARD.encode(bincode::serialize(&transaction)?);

    info!(
        "Built increment transaction for counter {} (fee payer {:?})",
        counter, fee_payer
    );
    Ok(Json(ActionTransaction {
        transaction: encoded,
        message: APPROVE_MESSAGE.to_string(),
    }))
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ActionError> {
    Pubkey::from_str(value).map_err(|_| ActionError::InvalidPubkey {
        field,
        value: value.to_string(),
    })
}
