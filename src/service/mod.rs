//! Generation service: request validation, voice resolution and the HTTP
//! endpoints in front of the model runtime.

mod error;
mod generation;
mod routes;

pub use error::{ErrorKind, ServiceError};
pub use generation::{GenerationService, Synthesis};
pub use routes::{MAX_JSON_BYTES, MAX_UPLOAD_BYTES, handle_rejection, routes};
