use super::ReportError;
use chrono::{ DateTime, Local };
use docx_rs::{ AlignmentType, Docx, Paragraph, Run };
use std::io::Cursor;
use std::path::Path;

pub const PREVIEW_CHARS: usize = 500;
const DEFAULT_STEM: &str = "문서요약";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

fn heading(text: &str, level: usize) -> Paragraph {
    let size = match level {
        0 => 40,
        1 => 32,
        _ => 26,
    };
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(size))
}

fn paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

/// First `PREVIEW_CHARS` characters of the source text, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

pub fn summary_filename(source_name: &str, now: DateTime<Local>) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STEM);
    format!("{}_요약_{}.docx", stem, now.format("%Y%m%d_%H%M%S"))
}

/// Builds the summary report: title, generation info, summary, source length and preview.
pub fn summary_document(
    original_text: &str,
    summary_text: &str,
    source_name: &str,
    now: DateTime<Local>
) -> Result<SummaryDocument, ReportError> {
    let docx = Docx::new()
        .add_paragraph(heading("문서 요약 보고서", 0).align(AlignmentType::Center))
        .add_paragraph(paragraph(&format!("생성 일시: {}", now.format("%Y년 %m월 %d일 %H:%M:%S"))))
        .add_paragraph(paragraph(&format!("원본 파일: {}", source_name)))
        .add_paragraph(paragraph(&"=".repeat(50)))
        .add_paragraph(heading("📋 요약 내용", 1))
        .add_paragraph(paragraph(summary_text))
        .add_paragraph(heading("📄 원본 텍스트 정보", 1))
        .add_paragraph(paragraph(&format!("원본 텍스트 길이: {} 자", original_text.chars().count())))
        .add_paragraph(heading("📖 원본 텍스트 미리보기", 2))
        .add_paragraph(paragraph(&preview(original_text)));

    let mut buffer = Cursor::new(Vec::new());
    docx
        .build()
        .pack(&mut buffer)
        .map_err(|e| ReportError::Docx(e.to_string()))?;

    Ok(SummaryDocument {
        bytes: buffer.into_inner(),
        filename: summary_filename(source_name, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 21, 9, 0, 0).unwrap()
    }

    #[test]
    fn document_is_a_zip_container() {
        let doc = summary_document("원문", "요약", "report.pdf", fixed_time()).unwrap();
        assert_eq!(&doc.bytes[..2], b"PK");
        assert_eq!(doc.filename, "report_요약_20251021_090000.docx");
    }

    #[test]
    fn filename_defaults_when_source_is_unnamed() {
        assert_eq!(summary_filename("", fixed_time()), "문서요약_요약_20251021_090000.docx");
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "가".repeat(PREVIEW_CHARS + 10);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("짧은 글"), "짧은 글");
    }
}
