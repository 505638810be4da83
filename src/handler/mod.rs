//! Request handler module
//!
//! Routing, static assets, the upload gateway and the debug endpoint.

mod debug;
mod form;
mod gateway;
pub mod router;
pub mod static_files;

pub use router::handle_request;
