//! Observability endpoints.

pub mod health;

pub use health::{observability_router, HealthState};
