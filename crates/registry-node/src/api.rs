use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hex::FromHex;
use registry_core::constants::HASH_HEX_SIZE;
use registry_core::{
    Block, Chain, Clock, DecodeError, Ed25519Verifier, Hash, Star, StarClaim, SubmissionError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

pub type SharedChain<C> = Arc<Chain<Ed25519Verifier, C>>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: i64,
}

#[derive(Serialize)]
struct Validation {
    valid: bool,
    findings: Vec<String>,
}

#[derive(Deserialize)]
struct ValidationRequest {
    address: String,
}

#[derive(Deserialize)]
struct StarSubmission {
    address: String,
    message: String,
    signature: String,
    star: Star,
}

/// Failure reported to HTTP clients as `{ "error": ... }`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        let status = match &err {
            SubmissionError::MalformedMessage(_)
            | SubmissionError::AddressMismatch { .. }
            | SubmissionError::FromTheFuture { .. } => StatusCode::BAD_REQUEST,
            SubmissionError::Expired { .. } => StatusCode::REQUEST_TIMEOUT,
            SubmissionError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            SubmissionError::Append(e) => {
                error!("append failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        error!("stored block could not be decoded: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

pub fn router<C: Clock + 'static>(chain: SharedChain<C>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain/head", get(head::<C>))
        .route("/chain/validate", get(validate::<C>))
        .route("/block/height/{height}", get(block_by_height::<C>))
        .route("/block/hash/{hash}", get(block_by_hash::<C>))
        .route("/requestValidation", post(request_validation::<C>))
        .route("/submitstar", post(submit_star::<C>))
        .route("/blocks/{address}", get(stars_by_address::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(chain)
}

async fn head<C: Clock>(State(chain): State<SharedChain<C>>) -> Json<Head> {
    Json(Head {
        height: chain.height(),
    })
}

async fn validate<C: Clock>(State(chain): State<SharedChain<C>>) -> Json<Validation> {
    let findings: Vec<String> = chain
        .validate_chain()
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(Validation {
        valid: findings.is_empty(),
        findings,
    })
}

async fn block_by_height<C: Clock>(
    State(chain): State<SharedChain<C>>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    chain
        .block_by_height(height)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("block"))
}

async fn block_by_hash<C: Clock>(
    State(chain): State<SharedChain<C>>,
    Path(hash): Path<String>,
) -> Result<Json<Block>, ApiError> {
    if hash.len() != HASH_HEX_SIZE {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("block hash must be {HASH_HEX_SIZE} hex characters"),
        ));
    }
    let hash = <Hash as FromHex>::from_hex(&hash)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("bad block hash: {e}")))?;
    chain
        .block_by_hash(&hash)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("block"))
}

async fn request_validation<C: Clock>(
    State(chain): State<SharedChain<C>>,
    Json(req): Json<ValidationRequest>,
) -> Result<Json<String>, ApiError> {
    if req.address.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "address is required"));
    }
    Ok(Json(chain.request_ownership_message(&req.address)))
}

async fn submit_star<C: Clock>(
    State(chain): State<SharedChain<C>>,
    Json(req): Json<StarSubmission>,
) -> Result<Json<Block>, ApiError> {
    let appended = chain.submit_star(&req.address, &req.message, &req.signature, req.star)?;
    Ok(Json(appended.block))
}

async fn stars_by_address<C: Clock>(
    State(chain): State<SharedChain<C>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<StarClaim>>, ApiError> {
    Ok(Json(chain.stars_by_wallet_address(&address)?))
}
