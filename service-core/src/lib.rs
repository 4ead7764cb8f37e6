//! service-core: Shared infrastructure for the card status service.
pub mod config;
pub mod error;
pub mod observability;
