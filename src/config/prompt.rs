use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

use crate::models::options::{ SummaryLanguage, SummaryLength };

const REQUIRED_INSTRUCTIONS: [&str; 7] = [
    "assistant",
    "chat",
    "vision",
    "table_completion",
    "summary_ko",
    "summary_en",
    "few_shot",
];
const REQUIRED_TEMPLATES: [&str; 4] = [
    "table_instruction",
    "summary_request",
    "image_notice",
    "chat_error",
];
const REQUIRED_MESSAGES: [&str; 4] = ["refusal", "greeting", "vision_greeting", "short_document"];

#[derive(Debug)]
pub enum PromptError {
    InstructionNotFound(String),
    TemplateNotFound(String),
    MessageNotFound(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::InstructionNotFound(key) =>
                write!(f, "System instruction '{}' not found", key),
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::MessageNotFound(key) => write!(f, "Canned message '{}' not found", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FewShotExample {
    pub user: String,
    pub assistant: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_instructions: HashMap<String, String>,
    pub templates: HashMap<String, String>,
    pub messages: HashMap<String, String>,
    pub length_instructions: HashMap<String, String>,
    #[serde(default)]
    pub few_shot_examples: Vec<FewShotExample>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl PromptConfig {
    pub fn from_json(raw: &str) -> Result<Self, PromptError> {
        let mut config: PromptConfig = serde_json::from_str(raw)?;
        config.validate()?;
        config.last_loaded = Some(SystemTime::now());
        Ok(config)
    }

    fn validate(&self) -> Result<(), PromptError> {
        for key in REQUIRED_INSTRUCTIONS {
            if !self.system_instructions.contains_key(key) {
                return Err(PromptError::InstructionNotFound(key.to_string()));
            }
        }
        for key in REQUIRED_TEMPLATES {
            if !self.templates.contains_key(key) {
                return Err(PromptError::TemplateNotFound(key.to_string()));
            }
        }
        for key in REQUIRED_MESSAGES {
            if !self.messages.contains_key(key) {
                return Err(PromptError::MessageNotFound(key.to_string()));
            }
        }
        for length in [SummaryLength::Short, SummaryLength::Normal, SummaryLength::Detailed] {
            if !self.length_instructions.contains_key(length.key()) {
                return Err(
                    PromptError::TemplateNotFound(format!("length_instructions:{}", length.key()))
                );
            }
        }
        Ok(())
    }

    pub fn examples(&self) -> impl Iterator<Item = (&str, &str)> {
        self.few_shot_examples.iter().map(|ex| (ex.user.as_str(), ex.assistant.as_str()))
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read prompts file '{}': {}", path, e))?;
    let config = PromptConfig
        ::from_json(&file_content)
        .map_err(|e| format!("Failed to parse prompts file '{}': {}", path, e))?;
    info!("Loaded prompt catalogue from {}", path);
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;
    let path_str = path.as_ref().to_string_lossy();

    if let Ok(modified) = metadata.modified() {
        let stale = match current_config.last_loaded {
            Some(last_loaded) => modified > last_loaded,
            None => true,
        };
        if stale {
            info!("Prompts file changed, reloading...");
            let content = fs::read_to_string(&path)?;
            let new_config = PromptConfig::from_json(&content)?;
            info!("Reloaded prompt catalogue from {}", path_str);
            return Ok(Some(Arc::new(new_config)));
        }
    }
    Ok(None)
}

pub fn get_system_instruction<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.system_instructions
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::InstructionNotFound(key.to_string()))
}

fn get_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("templates:{}", key)))
}

pub fn get_message<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.messages
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::MessageNotFound(key.to_string()))
}

pub fn get_table_prompt(config: &PromptConfig, table_template: &str) -> Result<String, PromptError> {
    let template = get_template(config, "table_instruction")?;
    Ok(template.replace("{table_template}", table_template))
}

pub fn get_summary_system_prompt(
    config: &PromptConfig,
    length: SummaryLength,
    language: SummaryLanguage
) -> Result<String, PromptError> {
    let template = get_system_instruction(config, language.instruction_key())?;
    let length_instruction = config.length_instructions
        .get(length.key())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("length_instructions:{}", length.key())))?;
    Ok(template.replace("{length_instruction}", length_instruction))
}

pub fn get_summary_request(config: &PromptConfig, text: &str) -> Result<String, PromptError> {
    let template = get_template(config, "summary_request")?;
    Ok(template.replace("{text}", text))
}

pub fn get_image_notice(config: &PromptConfig, count: usize) -> Result<String, PromptError> {
    let template = get_template(config, "image_notice")?;
    Ok(template.replace("{count}", &count.to_string()))
}

pub fn get_chat_error(config: &PromptConfig, error: &str) -> Result<String, PromptError> {
    let template = get_template(config, "chat_error")?;
    Ok(template.replace("{error}", error))
}

#[cfg(test)]
pub(crate) fn shipped() -> PromptConfig {
    PromptConfig::from_json(include_str!("../../json/prompts.json")).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn shipped_catalogue_is_valid() {
        let config = shipped();
        assert!(config.last_loaded.is_some());
        assert_eq!(config.examples().count(), 3);
    }

    #[test]
    fn missing_instruction_fails_validation() {
        let mut raw: serde_json::Value = serde_json
            ::from_str(include_str!("../../json/prompts.json"))
            .unwrap();
        raw["system_instructions"].as_object_mut().unwrap().remove("vision");
        let err = PromptConfig::from_json(&raw.to_string()).unwrap_err();
        assert!(matches!(err, PromptError::InstructionNotFound(key) if key == "vision"));
    }

    #[test]
    fn summary_prompt_substitutes_length_and_language() {
        let config = shipped();
        let ko = get_summary_system_prompt(&config, SummaryLength::Short, SummaryLanguage::Korean).unwrap();
        assert!(ko.contains("3-4문장으로 핵심만 간단하게 한국어로"));
        let en = get_summary_system_prompt(&config, SummaryLength::Detailed, SummaryLanguage::English).unwrap();
        assert!(en.contains("3-4개 단락으로 상세하게 in English"));
    }

    #[test]
    fn templates_render_placeholders() {
        let config = shipped();
        assert_eq!(
            get_image_notice(&config, 2).unwrap(),
            "2개의 이미지가 컨텍스트에 저장되었습니다. 이제 질문하세요."
        );
        assert_eq!(get_summary_request(&config, "본문").unwrap(), "다음 텍스트를 요약해주세요:\n\n본문");
        assert!(get_table_prompt(&config, "| 특징 |").unwrap().contains("\n| 특징 |\n"));
        assert_eq!(get_chat_error(&config, "boom").unwrap(), "오류가 발생했습니다: boom");
    }

    #[test]
    fn reload_picks_up_unseen_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(include_str!("../../json/prompts.json").as_bytes()).unwrap();
        let mut stale = shipped();
        stale.last_loaded = None;
        let reloaded = reload_prompts_if_changed(file.path(), &Arc::new(stale)).unwrap();
        assert!(reloaded.is_some());
    }

    #[test]
    fn reload_skips_unchanged_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(include_str!("../../json/prompts.json").as_bytes()).unwrap();
        let current = Arc::new(shipped());
        assert!(reload_prompts_if_changed(file.path(), &current).unwrap().is_none());
    }
}
