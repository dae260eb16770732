// crates/vidcast-media/src/helpers/mod.rs
//
// Internal helper modules for vidcast-media.
// Not re-exported from lib.rs; these are libav plumbing shared by the probe,
// decode and push paths, not part of the public API.

pub mod rgb;
pub mod source;
