// crates/vidcast-core/src/lib.rs
//
// Plain data shared by vidcast-media and the front-end. No ffmpeg here:
// everything in this crate can be built and tested without libav.

pub mod admission;
pub mod helpers;
pub mod media_types;
pub mod outcome;

pub use admission::{AdmitError, SUPPORTED_EXTENSIONS};
pub use media_types::{CodecKind, MediaDescriptor, ProgressSink, RgbImage, StreamTarget};
pub use outcome::{PushError, PushOutcome};
