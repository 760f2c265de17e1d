use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

/// Temperature presets offered to chat users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Creativity {
    Creative,
    #[default]
    Balanced,
    Conservative,
}

impl Creativity {
    pub fn temperature(&self) -> f32 {
        match self {
            Creativity::Creative => 1.0,
            Creativity::Balanced => 0.7,
            Creativity::Conservative => 0.2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Creativity::Creative => "창의적 (높음)",
            Creativity::Balanced => "균형 (보통)",
            Creativity::Conservative => "보수적 (낮음)",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseOptionError {
    message: String,
}

impl fmt::Display for ParseOptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseOptionError {}

impl FromStr for Creativity {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "creative" | "high" => Ok(Creativity::Creative),
            "balanced" | "normal" => Ok(Creativity::Balanced),
            "conservative" | "low" => Ok(Creativity::Conservative),
            _ =>
                Err(ParseOptionError {
                    message: format!("Invalid creativity level: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryLength {
    Short,
    #[default]
    Normal,
    Detailed,
}

impl SummaryLength {
    pub fn key(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Normal => "normal",
            SummaryLength::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryLanguage {
    #[default]
    Korean,
    English,
}

impl SummaryLanguage {
    /// Key of the system instruction used for this language.
    pub fn instruction_key(&self) -> &'static str {
        match self {
            SummaryLanguage::Korean => "summary_ko",
            SummaryLanguage::English => "summary_en",
        }
    }
}
