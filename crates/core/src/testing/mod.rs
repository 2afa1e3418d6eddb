//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the external tools (`you-get`, `ffmpeg`, the browser
//! driver) so pipelines and sessions can be exercised without them.
//!
//! # Example
//!
//! ```rust,ignore
//! use musicdl_core::testing::{MockConverter, MockDownloader, MockTagger};
//!
//! let downloader = MockDownloader::new();
//! downloader.fail_times("BV1xx", 2);
//!
//! // Build an ItemPipeline with the mocks...
//! ```

mod mock_automation;
mod mock_catalog;
mod mock_converter;
mod mock_downloader;
mod mock_tagger;

pub use mock_automation::MockAutomationDriver;
pub use mock_catalog::MockCatalog;
pub use mock_converter::MockConverter;
pub use mock_downloader::MockDownloader;
pub use mock_tagger::MockTagger;

use std::path::Path;

/// A 1x1 transparent PNG.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, no padding.
const MP3_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
const MP3_FRAME_LEN: usize = 417;
const MP3_FRAMES: usize = 20;

/// Bytes of a short silent MP3 stream without tags.
pub fn silent_mp3_bytes() -> Vec<u8> {
    let mut data = Vec::with_capacity(MP3_FRAME_LEN * MP3_FRAMES);
    for _ in 0..MP3_FRAMES {
        data.extend_from_slice(&MP3_FRAME_HEADER);
        data.resize(data.len() + MP3_FRAME_LEN - MP3_FRAME_HEADER.len(), 0);
    }
    data
}

/// Writes a short silent MP3 to `path`. Panics on I/O errors.
pub fn write_silent_mp3(path: &Path) {
    std::fs::write(path, silent_mp3_bytes()).expect("failed to write test mp3");
}

/// Writes a 1x1 PNG to `path`. Panics on I/O errors.
pub fn write_png(path: &Path) {
    std::fs::write(path, PNG_1X1).expect("failed to write test png");
}
