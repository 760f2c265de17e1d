use super::IngestError;
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::info;
use serde::{ Deserialize, Serialize };
use std::io::Cursor;

pub const MAX_DIMENSION: u32 = 1024;
pub const JPEG_QUALITY: u8 = 85;

/// Re-encoded image ready to be embedded in a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// Base64 JPEG bytes.
    pub data: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// Decodes an uploaded png/jpeg/webp file, converts it to RGB, shrinks it to fit
/// `MAX_DIMENSION` on both sides and re-encodes it as JPEG.
pub fn encode_image(bytes: &[u8]) -> Result<EncodedImage, IngestError> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = if decoded.width() > MAX_DIMENSION || decoded.height() > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        decoded
    };
    let rgb = resized.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(&rgb)?;
    let jpeg = buffer.into_inner();

    info!(
        "Encoded image {}x{} ({} bytes JPEG)",
        rgb.width(),
        rgb.height(),
        jpeg.len()
    );

    Ok(EncodedImage {
        data: STANDARD.encode(&jpeg),
        mime: "image/jpeg".to_string(),
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Same as [`encode_image`] for a client-side base64 upload.
pub fn encode_base64_upload(data: &str) -> Result<EncodedImage, IngestError> {
    let bytes = STANDARD.decode(data.trim())?;
    encode_image(&bytes)
}

/// Human readable size, e.g. `1.50 MB`.
pub fn format_size_mb(len: usize) -> String {
    format!("{:.2} MB", (len as f64) / (1024.0 * 1024.0))
}
