use log::info;

/// Case-insensitive substring check of `text` against each blocked term, used verbatim.
/// Blank terms never match.
pub fn reject<S: AsRef<str>>(text: &str, blocked_terms: &[S]) -> bool {
    let haystack = text.to_lowercase();
    blocked_terms
        .iter()
        .map(AsRef::as_ref)
        .filter(|term| !term.trim().is_empty())
        .any(|term| haystack.contains(&term.to_lowercase()))
}

#[derive(Debug, Clone, Default)]
pub struct KeywordPolicy {
    terms: Vec<String>,
}

impl KeywordPolicy {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list such as `FORBIDDEN_KEYWORDS=투자, 주식,`.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(',').map(str::to_string).collect())
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_blocked(&self, text: &str) -> bool {
        let blocked = reject(text, &self.terms);
        if blocked {
            info!("Message rejected by keyword policy");
        }
        blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_korean_term_inside_sentence() {
        assert!(reject("주식 투자 상담 해주세요", &["투자", "주식"]));
    }

    #[test]
    fn empty_term_list_allows_everything() {
        let none: [&str; 0] = [];
        assert!(!reject("hello", &none));
    }

    #[test]
    fn matching_ignores_case() {
        assert!(reject("Tell me about BITCOIN", &["bitcoin"]));
        assert!(reject("tell me about bitcoin", &["BitCoin"]));
    }

    #[test]
    fn terms_are_matched_without_trimming() {
        assert!(!reject("xb", &[" b"]));
        assert!(reject("x b", &[" b"]));
        assert!(!reject("anything", &["  "]));
    }

    #[test]
    fn no_match_without_substring() {
        assert!(!reject("I want investment advice", &["투자", "주식"]));
    }

    #[test]
    fn csv_parsing_trims_and_skips_blanks() {
        let policy = KeywordPolicy::from_csv(" 투자 , 주식,, ,코인 ");
        assert_eq!(policy.terms(), &["투자", "주식", "코인"]);
        assert!(policy.is_blocked("코인 시세 알려줘"));
        assert!(!policy.is_blocked("피싱 메일 구별법"));
    }

    #[test]
    fn empty_csv_yields_permissive_policy() {
        let policy = KeywordPolicy::from_csv("");
        assert!(policy.is_empty());
        assert!(!policy.is_blocked("anything"));
    }
}
