//! Binary preview-frame decoding.
//!
//! Alongside JSON control events the backend streams in-progress render
//! previews as binary WebSocket frames: a 4-byte big-endian frame type,
//! then for previews a 4-byte big-endian image format selector, then the
//! raw image bytes.

use serde::Serialize;

/// Binary frame type carrying a preview image.
pub const PREVIEW_FRAME_TYPE: u32 = 1;

/// Image format of a preview artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    Jpeg,
    Png,
}

impl PreviewKind {
    /// MIME type for HTTP delivery.
    pub fn mime(&self) -> &'static str {
        match self {
            PreviewKind::Jpeg => "image/jpeg",
            PreviewKind::Png => "image/png",
        }
    }
}

/// A decoded preview image.
#[derive(Debug, Clone)]
pub struct PreviewArtifact {
    pub kind: PreviewKind,
    pub bytes: Vec<u8>,
}

/// Why a binary frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Shorter than the fixed header it claims to carry.
    #[error("binary frame truncated at {len} bytes")]
    Truncated { len: usize },

    /// The leading frame-type word matches nothing this build decodes.
    #[error("unknown binary frame type {0}")]
    UnknownFrameType(u32),
}

/// Decode a binary WebSocket frame into a preview artifact.
///
/// Layout: bytes 0..4 are the big-endian frame type, bytes 4..8 the
/// big-endian format selector (`1` JPEG, `2` PNG, anything else falls
/// back to JPEG), bytes 8.. the image payload. Unknown frame types are
/// an error so callers can log them instead of guessing.
pub fn decode_binary_frame(bytes: &[u8]) -> Result<PreviewArtifact, FrameError> {
    if bytes.len() < 4 {
        return Err(FrameError::Truncated { len: bytes.len() });
    }
    let frame_type = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if frame_type != PREVIEW_FRAME_TYPE {
        return Err(FrameError::UnknownFrameType(frame_type));
    }
    if bytes.len() < 8 {
        return Err(FrameError::Truncated { len: bytes.len() });
    }
    let format = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let kind = match format {
        2 => PreviewKind::Png,
        // 1 is JPEG; so is anything unrecognized.
        _ => PreviewKind::Jpeg,
    };
    Ok(PreviewArtifact {
        kind,
        bytes: bytes[8..].to_vec(),
    })
}

/// Latest-only holder for the most recent preview.
///
/// Each new preview replaces the previous one; nothing is retained once
/// a consumer takes it. Previews are transient by nature, so losing one
/// to a newer frame is correct behavior, not a bug.
#[derive(Debug, Default)]
pub struct PreviewSlot {
    latest: Option<PreviewArtifact>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held artifact with a newer one.
    pub fn store(&mut self, artifact: PreviewArtifact) {
        self.latest = Some(artifact);
    }

    /// Hand the artifact to the caller, leaving the slot empty.
    pub fn take(&mut self) -> Option<PreviewArtifact> {
        self.latest.take()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn frame(frame_type: u32, format: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.extend_from_slice(&frame_type.to_be_bytes());
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn decode_png_preview() {
        let artifact = decode_binary_frame(&frame(1, 2, b"png-bytes")).unwrap();
        assert_eq!(artifact.kind, PreviewKind::Png);
        assert_eq!(artifact.bytes, b"png-bytes");
    }

    #[test]
    fn decode_jpeg_preview() {
        let artifact = decode_binary_frame(&frame(1, 1, b"jpeg-bytes")).unwrap();
        assert_eq!(artifact.kind, PreviewKind::Jpeg);
        assert_eq!(artifact.bytes, b"jpeg-bytes");
    }

    #[test]
    fn unrecognized_format_falls_back_to_jpeg() {
        let artifact = decode_binary_frame(&frame(1, 99, b"mystery")).unwrap();
        assert_eq!(artifact.kind, PreviewKind::Jpeg);
        assert_eq!(artifact.bytes, b"mystery");
    }

    #[test]
    fn empty_payload_is_valid() {
        let artifact = decode_binary_frame(&frame(1, 2, b"")).unwrap();
        assert!(artifact.bytes.is_empty());
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        let err = decode_binary_frame(&frame(7, 1, b"whatever")).unwrap_err();
        assert_matches!(err, FrameError::UnknownFrameType(7));
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert_matches!(
            decode_binary_frame(&[0, 0]),
            Err(FrameError::Truncated { len: 2 })
        );
        // Valid frame type but the format word is cut off.
        assert_matches!(
            decode_binary_frame(&[0, 0, 0, 1, 0, 0]),
            Err(FrameError::Truncated { len: 6 })
        );
    }

    #[test]
    fn mime_types() {
        assert_eq!(PreviewKind::Jpeg.mime(), "image/jpeg");
        assert_eq!(PreviewKind::Png.mime(), "image/png");
    }

    #[test]
    fn slot_keeps_only_the_latest() {
        let mut slot = PreviewSlot::new();
        slot.store(decode_binary_frame(&frame(1, 1, b"first")).unwrap());
        slot.store(decode_binary_frame(&frame(1, 2, b"second")).unwrap());

        let artifact = slot.take().expect("slot should hold an artifact");
        assert_eq!(artifact.bytes, b"second");
        assert_eq!(artifact.kind, PreviewKind::Png);

        // Ownership moved to the caller; the slot is empty again.
        assert!(slot.take().is_none());
        assert!(slot.is_empty());
    }
}
