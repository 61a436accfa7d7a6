//! Voice registry for cloning reference profiles.
//!
//! Each profile lives in its own directory keyed by a short random id and
//! holds the reference recording plus a JSON metadata record.

mod registry;

pub use registry::{METADATA_FILE, REFERENCE_FILE, VoiceError, VoiceProfile, VoiceRegistry};
