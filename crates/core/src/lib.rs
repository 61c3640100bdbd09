//! Shared domain model, error taxonomy, and configuration for resetline.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::intent::{IntentDecision, ToolCallRequest};
pub use domain::outcome::ResetOutcome;
pub use errors::{ApplicationError, InputError, IntegrationError};
