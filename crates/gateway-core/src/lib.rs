//! Pure translation library between the Anthropic-shape chat API and an
//! OpenAI-shape upstream: request/response mapping, streaming
//! transformation, schema sanitization, and id/signature derivation.
//!
//! This crate performs no I/O; the gateway binary owns the HTTP shell.

pub mod id_minter;
pub mod models;
pub mod request_converter;
pub mod response_converter;
pub mod sanitizer;
pub mod stream_transformer;

pub use models::*;
pub use request_converter::convert_request;
pub use response_converter::convert_response;
pub use stream_transformer::{AnthropicSseEvent, StreamTransformer};
