//! HTTP server layer for the image gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │              GET /v1/image/{name}?texts=..|url=..               │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (dispatch)  │  │ (x-api-key) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::auth_middleware;
pub use handlers::{
    health_handler, operations_handler, AppState, ErrorResponse, HealthResponse, OperationInfo,
    OperationsResponse, IMAGE_CONTENT_TYPE, OPERATION_PREFIX,
};
pub use routes::{create_router, RouterConfig};
