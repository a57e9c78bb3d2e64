//! smsgate Library
//!
//! Client-side modules of the smsgate admin console: the gateway API
//! client, the session store, per-entity state containers and the shell
//! that renders them.

pub mod client;
pub mod config;
pub mod console;
pub mod poll;
pub mod rbac;
pub mod scope;
pub mod session;
pub mod shell;
pub mod store;

pub use console::Console;
