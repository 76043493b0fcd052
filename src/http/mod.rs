//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, limits, identity)
//!     → deadline.rs (whole-request budget shared by every outbound call)
//!     → request.rs (request id, RequestContext from the inbound parts)
//!     → proxy forwarder (service mounts) or aggregated.rs (composite views)
//!     → response.rs (success envelope) / GatewayError (error envelope)
//!     → Send to client
//! ```

pub mod aggregated;
pub mod deadline;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_context, RequestIdExt, X_REQUEST_ID};
pub use response::SuccessEnvelope;
pub use server::{AppState, HttpServer};
