//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /tiles/{z}/{x}/{y}        template CRUD + /health       │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error bodies) │  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    create_template_handler, delete_template_handler, health_handler, index_handler,
    list_templates_handler, tile_handler, update_template_handler, AppState,
    CreateTemplateRequest, ErrorResponse, HealthResponse, MessageResponse, TilePathParams,
    DEFAULT_TEMPLATE_CHANNEL,
};
pub use routes::{create_router, RouterConfig};
