pub mod image;
pub mod pdf;

use thiserror::Error;

/// Unreadable or unsupported uploaded file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("PDF 읽기 오류: {0}")]
    Pdf(String),
    #[error("이미지 인코딩 오류: {0}")]
    Image(#[from] ::image::ImageError),
    #[error("잘못된 base64 데이터: {0}")]
    Encoding(#[from] base64::DecodeError),
}
