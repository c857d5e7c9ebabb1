//! Domain layer for the cadre orchestration core
//!
//! This module contains the fleet's data model, its error taxonomy and the
//! ports that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainResult, OrchestrationError};
