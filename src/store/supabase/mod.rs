//! Supabase integration
//!
//! Subscription records and usage events over PostgREST, plus session
//! validation against Supabase Auth.

pub mod client;
pub mod models;

pub use client::SupabaseClient;
pub use models::AuthUser;
