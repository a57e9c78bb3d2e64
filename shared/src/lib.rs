//! Shared types for the smsgate admin console
//!
//! This crate contains the records exchanged with the gateway:
//! - Resource models (connectors, routes, users, groups, sessions, stats)
//! - API message types (request payloads, patches, login responses)
//! - Form types with client-side validation

pub mod forms;
pub mod messages;
pub mod models;

pub use forms::*;
pub use messages::*;
pub use models::*;
