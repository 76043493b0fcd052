//! Proxy forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (method, path, query, headers, body, context, identity)
//!     → method.rs (closed method enum, 400 for anything else)
//!     → body.rs (drop body for GET/DELETE, apply invalid-JSON policy)
//!     → security::headers (outbound header set)
//!     → client.rs (retry loop → breaker → deadline → hyper)
//!     → response.rs (status verbatim, header subset, body re-interpreted)
//! ```
//!
//! # Design Decisions
//! - Errors are classified once, where they happen, into `GatewayError`
//! - The client is shared with the aggregation layer so both go through the
//!   same breakers

pub mod body;
pub mod client;
pub mod forwarder;
pub mod method;
pub mod request;
pub mod response;

pub use client::{OutboundRequest, ResilientClient, UpstreamReply};
pub use forwarder::ProxyForwarder;
pub use method::ProxyMethod;
pub use request::{ProxyRequest, RequestContext};
pub use response::{ProxyResponse, ResponseBody};
