//! HTTP surface for the asynchronous job pipeline: analytics job and report
//! creation, status polling, artifact download, and cancellation.
//!
//! Authentication and tenancy are owned by an upstream layer; it injects the
//! caller's identity as `X-Factory-Id` / `X-User-Id` headers, which the
//! handlers require.

pub mod api;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
