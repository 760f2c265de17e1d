use chrono::{ DateTime, Local };

pub const RESULT_HEADING: &str = "## 📊 차이점 분석 결과";

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub markdown: String,
    pub filename: String,
    pub table: String,
}

impl AnalysisReport {
    /// Table section only, as shown in the chat surface.
    pub fn table_section(&self) -> &str {
        match self.markdown.split_once(RESULT_HEADING) {
            Some((_, rest)) => rest.split("\n---\n").next().unwrap_or(rest).trim(),
            None => &self.markdown,
        }
    }
}

pub fn analysis_report(table: &str, image_count: usize, now: DateTime<Local>) -> AnalysisReport {
    let markdown = format!(
        "# 이미지 차이점 분석 보고서

**생성 일시:** {generated}\x20\x20
**분석된 이미지 수:** {image_count}개

{RESULT_HEADING}

{table}

---
*멀티모달 컨텍스트 비교 에이전트로 생성됨*
",
        generated = now.format("%Y년 %m월 %d일 %H:%M:%S")
    );

    AnalysisReport {
        markdown,
        filename: format!("이미지_차이점_분석_{}.md", now.format("%Y%m%d_%H%M%S")),
        table: table.to_string(),
    }
}
