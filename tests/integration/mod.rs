//! Integration tests for the usage gate
//!
//! This module contains integration tests that verify the complete request/response
//! flow through the service, including authentication, quota metering, and the
//! storage backends.

mod health;
mod quota;
