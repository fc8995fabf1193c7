/*!
 * System prompt construction for chunk translation.
 */

use crate::chunking::{ChunkDna, StyleCategory};
use crate::language_utils;

/// Placeholder used when neither the request nor the chunk names a source language
const UNKNOWN_SOURCE: &str = "the source language";

const FORMATTING_INSTRUCTION: &str = "Preserve the original formatting exactly: keep line breaks, \
markdown markup, list markers, table layout and code blocks unchanged, and do not translate code.";

/// System prompt template with `{source_language}` / `{target_language}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template with display names for both languages.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }

    /// Full system prompt for one chunk.
    ///
    /// The source language falls back to the chunk's detected language.
    pub fn for_chunk(
        &self,
        source_language: Option<&str>,
        target_language: &str,
        dna: Option<&ChunkDna>,
        preserve_formatting: bool,
    ) -> String {
        let source = source_language
            .or_else(|| dna.map(|d| d.language.as_str()))
            .map(display_name)
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        let target = display_name(target_language);

        let mut prompt = self.render(&source, &target);

        if let Some(dna) = dna {
            if let Some(hint) = style_hint(dna) {
                prompt.push(' ');
                prompt.push_str(&hint);
            }
        }

        if preserve_formatting {
            prompt.push(' ');
            prompt.push_str(FORMATTING_INSTRUCTION);
        }

        prompt
    }
}

/// English name for an ISO code, or the code itself when unknown
fn display_name(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

fn style_hint(dna: &ChunkDna) -> Option<String> {
    let register = match dna.style {
        StyleCategory::Technical => "The text is technical; keep terminology precise and consistent.",
        StyleCategory::Academic => "The text is academic; keep a formal register and leave citations untouched.",
        StyleCategory::Narrative => "The text is narrative prose; keep the voice and rhythm of the original.",
        StyleCategory::General => return None,
    };

    if dna.entities.is_empty() {
        Some(register.to_string())
    } else {
        Some(format!(
            "{} Keep these names as written unless they have an established translation: {}.",
            register,
            dna.entities.join(", ")
        ))
    }
}
