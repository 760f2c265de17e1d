pub mod docx;
pub mod export;
pub mod markdown;
pub mod table;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("DOCX 파일 생성 오류: {0}")]
    Docx(String),
    #[error("파일 저장 오류: {0}")]
    Io(#[from] std::io::Error),
}
