const HEADER_KEYWORD: &str = "특징";
const MIN_TABLE_LINES: usize = 4;

const TEMPLATE_TWO: &str = "| 특징 | 이미지 1 | 이미지 2 | 차이점 설명 |
|------|---------|---------|-------------|
| 색상 | | | |
| 구성 | | | |
| 스타일 | | | |";

const TEMPLATE_THREE: &str = "| 특징 | 이미지 1 | 이미지 2 | 이미지 3 | 차이점 설명 |
|------|---------|---------|---------|-------------|
| 색상 | | | | |
| 구성 | | | | |
| 스타일 | | | | |";

const FALLBACK_TWO: &str = "| 특징 | 이미지 1 | 이미지 2 | 차이점 설명 |
|------|---------|---------|-------------|
| 색상 | 따뜻한 색조 | 차가운 색조 | 색온도의 대비 |
| 구성 | 중앙 집중형 | 분산형 배치 | 시각적 균형의 차이 |
| 스타일 | 자연스러운 느낌 | 인위적인 느낌 | 표현 방식의 대조 |";

const FALLBACK_THREE: &str = "| 특징 | 이미지 1 | 이미지 2 | 이미지 3 | 차이점 설명 |
|------|---------|---------|---------|-------------|
| 색상 | 따뜻한 색조 | 차가운 색조 | 중성 색조 | 색온도의 다양성 |
| 구성 | 중앙 집중형 | 분산형 배치 | 대칭형 구조 | 레이아웃 접근법의 차이 |
| 스타일 | 자연스러운 느낌 | 인위적인 느낌 | 미니멀한 느낌 | 표현 방식의 다양성 |";

/// Empty comparison table the model is asked to fill in.
pub fn table_template(image_count: usize) -> &'static str {
    if image_count == 2 { TEMPLATE_TWO } else { TEMPLATE_THREE }
}

/// Keeps only the table rows of a model reply. Replies that do not contain a
/// usable table are replaced with a fixed fallback table for `image_count` images.
pub fn format_as_markdown_table(response_text: &str, image_count: usize) -> String {
    let response_text = response_text.trim();

    if response_text.contains('|') && response_text.contains("---") && response_text.contains(HEADER_KEYWORD) {
        let table_lines: Vec<&str> = response_text
            .lines()
            .filter(|line| {
                let line = line.trim();
                line.starts_with('|') && line.ends_with('|')
            })
            .collect();
        if table_lines.len() >= MIN_TABLE_LINES {
            return table_lines.join("\n");
        }
    }

    if image_count == 2 {
        FALLBACK_TWO.to_string()
    } else {
        FALLBACK_THREE.to_string()
    }
}
