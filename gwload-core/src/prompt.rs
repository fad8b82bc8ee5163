//! Prompt file parsing.
//!
//! A prompt file carries two keys, `llm_prompt=` and `img_prompt=`. A value runs to the end of
//! its line, or up to the next key if both keys share a line. Values are trimmed.

use std::path::{Path, PathBuf};

pub const LLM_PROMPT_KEY: &str = "llm_prompt";
pub const IMG_PROMPT_KEY: &str = "img_prompt";

const KEY_MARKERS: [&str; 2] = ["llm_prompt=", "img_prompt="];

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt file is missing the `{0}=` key")]
    MissingKey(&'static str),

    #[error("prompt file has an empty value for `{0}=`")]
    EmptyValue(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub llm_prompt: String,
    pub img_prompt: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            llm_prompt: "Write a short story about a lighthouse keeper who finds a message in a bottle.".to_string(),
            img_prompt: "A photorealistic lighthouse on a rocky coast at sunset, dramatic clouds".to_string(),
        }
    }
}

impl Prompts {
    pub fn parse(text: &str) -> Result<Self, PromptError> {
        Ok(Self {
            llm_prompt: find_value(text, LLM_PROMPT_KEY)?,
            img_prompt: find_value(text, IMG_PROMPT_KEY)?,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, PromptError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PromptError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }
}

/// First occurrence of `key=` wins.
fn find_value(text: &str, key: &'static str) -> Result<String, PromptError> {
    let marker = format!("{key}=");

    for line in text.lines() {
        let Some(start) = line.find(&marker) else {
            continue;
        };

        let rest = &line[start + marker.len()..];
        let end = KEY_MARKERS
            .iter()
            .filter_map(|m| rest.find(m))
            .min()
            .unwrap_or(rest.len());

        let value = rest[..end].trim();
        if value.is_empty() {
            return Err(PromptError::EmptyValue(key));
        }
        return Ok(value.to_string());
    }

    Err(PromptError::MissingKey(key))
}
