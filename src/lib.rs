//! Storefront Orders
//!
//! E-commerce order backend focused on the part that has to be right:
//! placing an order validates a batch of lines against live inventory,
//! reserves stock and persists the order with its lines in one atomic unit
//! of work, computes exact-decimal totals, and publishes a best-effort
//! lifecycle event after commit. Cancellation restocks and flips the order
//! status under the same guarantees.
//!
//! ## Layout
//! - `domain` - products, orders, order lines, lifecycle events
//! - `store` - transactional storage seam with Postgres and in-memory backends
//! - `service` - the placement/cancellation engines and thin catalog ops
//! - `publisher` / `worker` - NATS event publication and consumption
//! - `http` - axum surface for the above

pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod publisher;
pub mod service;
pub mod store;
pub mod worker;

pub use error::{OrderError, Result};
