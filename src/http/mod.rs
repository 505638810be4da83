//! HTTP protocol layer module
//!
//! Response builders, the JSON envelope and MIME resolution, kept apart
//! from routing so handlers only decide *what* to answer.

pub mod envelope;
pub mod mime;
pub mod response;

pub use envelope::{EnvelopeData, ResponseEnvelope};
pub use response::{
    build_404_response, build_413_response, build_asset_response, build_json_response,
    build_preflight_response, build_text_response,
};
