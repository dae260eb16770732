// crates/vidcast-core/src/admission.rs
//
// Rules that decide whether a file may become a push session.
//
// The extension check runs on the path alone, before anything opens the
// file. The codec gate runs on a finished probe. Refusal reasons are meant to
// be shown to the operator as-is.

use std::path::Path;

use thiserror::Error;

use crate::media_types::MediaDescriptor;

/// Container extensions accepted for streaming (compared ASCII case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["ts", "mp4", "h264", "h265", "flv", "avi"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdmitError {
    #[error("not a video file: {0}")]
    UnsupportedExtension(String),
    #[error("no usable video stream: {0}")]
    NoVideoStream(String),
    #[error("unsupported video codec ({codec}): {file}")]
    UnsupportedCodec { codec: String, file: String },
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Path-only check. Never touches the filesystem.
pub fn check_extension(path: &Path) -> Result<(), AdmitError> {
    if has_supported_extension(path) {
        Ok(())
    } else {
        Err(AdmitError::UnsupportedExtension(file_label(path)))
    }
}

/// Codec gate applied to a probe result.
pub fn check_descriptor(path: &Path, desc: &MediaDescriptor) -> Result<(), AdmitError> {
    if !desc.is_usable() {
        return Err(AdmitError::NoVideoStream(file_label(path)));
    }
    if !desc.codec_kind.is_streamable() {
        return Err(AdmitError::UnsupportedCodec {
            codec: desc.codec_kind.label().to_string(),
            file:  file_label(path),
        });
    }
    Ok(())
}
