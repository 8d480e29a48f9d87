//! Camera and microphone capture seam.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// MIME type of a browser-style capture, and the default for unknown files.
pub const RECORDING_MIME_TYPE: &str = "video/webm";

/// A finished capture held in memory until it is uploaded or discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub duration: Duration,
}

impl Recording {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension for the stored object, from the MIME type.
    #[must_use]
    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "video/mp4" => "mp4",
            "video/quicktime" => "mov",
            "video/x-matroska" => "mkv",
            "video/ogg" => "ogv",
            "video/x-msvideo" => "avi",
            _ => "webm",
        }
    }
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Recording")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("duration", &self.duration)
            .finish()
    }
}

/// Something that can start a combined camera and microphone capture.
pub trait MediaDevice: Send + Sync {
    type Capture: Capture;

    /// Acquire the device. Fails with [`crate::Error::Device`] when access is denied
    /// or no device exists.
    fn open(&self) -> impl Future<Output = Result<Self::Capture>> + Send;
}

/// A live capture. Dropping it must release the underlying device.
pub trait Capture: Send {
    /// Stop capturing, release the device, and hand back what was captured.
    fn finish(self) -> impl Future<Output = Result<Recording>> + Send;
}
