//! Client orchestration: health gate, generation into the local cache and
//! voice management on the server.

mod speaker;

pub use speaker::{ClientError, Speaker};
