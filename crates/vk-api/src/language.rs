//! Response language

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages accepted in the `lang` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    Uk,
    Be,
    En,
    Es,
    Fi,
    De,
    It,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Uk => "uk",
            Language::Be => "be",
            Language::En => "en",
            Language::Es => "es",
            Language::Fi => "fi",
            Language::De => "de",
            Language::It => "it",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Language::Ru),
            "uk" | "ua" => Ok(Language::Uk),
            "be" => Ok(Language::Be),
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            "fi" => Ok(Language::Fi),
            "de" => Ok(Language::De),
            "it" => Ok(Language::It),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}
