//! Core orchestration library for the RentFlow rental marketplace.
//!
//! The crate owns the rental lease lifecycle: tenant applications, landlord
//! decisions, lease creation, gateway-backed rent collection with dual-path
//! idempotent confirmation, revenue-split bookkeeping, signature capture with
//! gated document finalization, and time-based lease expiry. Persistence,
//! payments, notifications, the property catalog, and document rendering are
//! collaborator traits so the orchestration can be exercised in isolation.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod telemetry;
