//! REST API server for a powledger node
//!
//! Exposes the collaborator operations over HTTP: submitting transactions,
//! mining, reading the chain, registering peers and triggering consensus.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::node::Node;
use crate::transaction::{parse_submission, Transaction};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(ChainError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BlockchainError(ChainError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Node is shutting down".to_string())
            }
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
pub struct MinedBlockResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<Block> for MinedBlockResponse {
    fn from(block: Block) -> Self {
        MinedBlockResponse {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

#[derive(Serialize)]
struct RegisterResponse {
    message: String,
    total_nodes: Vec<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware. Logs method, path, status and duration.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/transactions/new", post(new_transaction))
        .route("/mine", get(mine))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: tokio::net::TcpListener, node: Arc<Node>, shutdown: F) -> Result<(), ChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(node);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

/// Bind the configured address and serve the API.
pub async fn run_api_server<F>(node: Arc<Node>, shutdown: F) -> Result<(), ChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = format!("{}:{}", node.config.node.bind_address, node.config.node.api_port);
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| ChainError::Config(format!("Invalid bind address {}: {}", bind, e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, node_id = %node.node_id(), "API server listening");

    serve(listener, node, shutdown).await
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn new_transaction(State(node): State<Arc<Node>>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    // The body is parsed as JSON whatever Content-Type the client sent.
    let values: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidInput("Missing values".to_string()))?;
    let tx = parse_submission(&values).map_err(|_| ApiError::InvalidInput("Missing values".to_string()))?;

    let index = node.submit_transaction(tx).await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MinedBlockResponse>, ApiError> {
    if node.is_shutting_down() {
        return Err(ApiError::Unavailable("Node is shutting down".to_string()));
    }
    let block = node.mine().await?;
    Ok(Json(block.into()))
}

async fn full_chain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(node.full_chain().await)
}

async fn register_nodes(State(node): State<Arc<Node>>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::InvalidInput("Error: Please supply a valid list of nodes".to_string());

    let values: Value = serde_json::from_slice(&body).map_err(|_| invalid())?;
    let nodes = values.get("nodes").and_then(Value::as_array).ok_or_else(invalid)?;
    let addresses = nodes
        .iter()
        .map(|n| n.as_str().ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;

    let total_nodes = node.register_peers(addresses)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added".to_string(),
            total_nodes,
        }),
    ))
}

async fn consensus(State(node): State<Arc<Node>>) -> Result<Json<Value>, ApiError> {
    let (replaced, chain) = node.resolve_conflicts().await?;

    Ok(Json(if replaced {
        json!({
            "message": "Our chain was replaced",
            "new_chain": chain
        })
    } else {
        json!({
            "message": "Our chain is authoritative",
            "chain": chain
        })
    }))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let snapshot = node.full_chain().await;
    let (status, label) = if node.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "stopping")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        status,
        Json(json!({
            "status": label,
            "node_id": node.node_id(),
            "length": snapshot.length,
            "pending": node.pending_count().await,
            "peers": node.peers().len(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
