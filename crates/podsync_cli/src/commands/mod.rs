//! CLI command implementations.

pub mod action;
pub mod compact;
pub mod list;
pub mod status;
pub mod subscribe;
pub mod sync;
