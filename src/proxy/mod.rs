//! Proxy module
//!
//! Forwards metered feature requests to the upstream feature service.

pub mod headers;
pub mod upstream;

pub use upstream::FeatureUpstream;
