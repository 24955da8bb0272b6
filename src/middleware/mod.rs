//! Middleware module
//!
//! Contains middleware for authentication and quota metering.

pub mod auth;
pub mod quota;
