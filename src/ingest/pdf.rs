use super::IngestError;
use log::info;

/// Plain text of every page, trimmed.
pub fn extract_text(bytes: &[u8]) -> Result<String, IngestError> {
    let text = pdf_extract
        ::extract_text_from_mem(bytes)
        .map_err(|e| IngestError::Pdf(e.to_string()))?;
    let text = text.trim().to_string();
    info!("Extracted {} characters from PDF ({} bytes)", text.chars().count(), bytes.len());
    Ok(text)
}

/// Rough page estimate used for display, one page per 2000 characters.
pub fn estimate_pages(text: &str) -> usize {
    (text.chars().count() / 2000).max(1)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
