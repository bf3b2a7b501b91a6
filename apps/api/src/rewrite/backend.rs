//! Rewrite backends: pluggable, trait-based text transformation.
//!
//! Default: `LlmRewriter` (Claude via `LlmClient`).
//! Degraded: `IdentityRewriter` when no API key is configured. It returns
//! every section unchanged and never fails, so callers see the same shapes.
//! It cannot typeset a LaTeX resume and returns an empty document instead.
//!
//! `AppState` holds an `Arc<dyn RewriteBackend>`, built once at startup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm_client::prompts::{
    fill_template, LATEX_PRESERVATION_INSTRUCTION, MARKUP_ONLY_INSTRUCTION,
};
use crate::llm_client::{LlmClient, LlmError, MODEL};
use crate::rewrite::prompts::{
    COVER_LETTER_PROMPT_TEMPLATE, DEFAULT_COVER_LETTER, LATEX_GENERATION_PROMPT_TEMPLATE,
    REWRITE_SYSTEM, SECTION_REWRITE_PROMPT_TEMPLATE,
};

/// Name used for the section prompt when a heading had no title.
const FALLBACK_SECTION_NAME: &str = "Resume Section";

/// The rewrite backend trait. Implement this to swap backends without touching
/// the dispatcher, pipeline, or handlers.
#[async_trait]
pub trait RewriteBackend: Send + Sync {
    /// Short identifier for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Rewrites one section's content for the target role described by `context`.
    async fn rewrite_section(
        &self,
        section_name: &str,
        content: &str,
        context: &str,
    ) -> Result<String, LlmError>;

    async fn write_cover_letter(&self, resume_text: &str, context: &str)
        -> Result<String, LlmError>;

    /// Typesets a plain-text resume into `template`. An empty result means
    /// the backend cannot generate LaTeX.
    async fn generate_latex(&self, resume_text: &str, template: &str) -> Result<String, LlmError>;
}

/// Builds the backend from configuration: the LLM when a key is present,
/// the identity rewriter otherwise.
pub fn build_backend(config: &Config) -> Result<Arc<dyn RewriteBackend>, LlmError> {
    match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("Rewrite backend: LLM (model: {})", MODEL);
            Ok(Arc::new(LlmRewriter(llm)))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; rewriting disabled, documents pass through unchanged");
            Ok(Arc::new(IdentityRewriter))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmRewriter
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmRewriter(pub LlmClient);

#[async_trait]
impl RewriteBackend for LlmRewriter {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn rewrite_section(
        &self,
        section_name: &str,
        content: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let prompt = build_section_prompt(section_name, content, context);
        let rewritten = self.0.call_text(&prompt, REWRITE_SYSTEM).await?;
        info!("Rewrote resume section: {}", section_name);
        Ok(rewritten)
    }

    async fn write_cover_letter(
        &self,
        resume_text: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let prompt = fill_template(
            COVER_LETTER_PROMPT_TEMPLATE,
            &[
                ("resume_text", resume_text),
                ("full_context", context),
                ("output_instruction", MARKUP_ONLY_INSTRUCTION),
            ],
        );
        let letter = self.0.call_text(&prompt, REWRITE_SYSTEM).await?;
        info!("Generated cover letter");
        Ok(letter)
    }

    async fn generate_latex(&self, resume_text: &str, template: &str) -> Result<String, LlmError> {
        let prompt = fill_template(
            LATEX_GENERATION_PROMPT_TEMPLATE,
            &[("template_content", template), ("resume_text", resume_text)],
        );
        let latex = self.0.call_text(&prompt, REWRITE_SYSTEM).await?;
        info!("Generated LaTeX resume ({} chars)", latex.len());
        Ok(latex)
    }
}

fn build_section_prompt(section_name: &str, content: &str, context: &str) -> String {
    let section_name = if section_name.trim().is_empty() {
        FALLBACK_SECTION_NAME
    } else {
        section_name
    };
    fill_template(
        SECTION_REWRITE_PROMPT_TEMPLATE,
        &[
            ("section_name", section_name),
            ("full_context", context),
            ("section_content", content),
            ("latex_instruction", LATEX_PRESERVATION_INSTRUCTION),
            ("output_instruction", MARKUP_ONLY_INSTRUCTION),
        ],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// IdentityRewriter (degraded mode)
// ────────────────────────────────────────────────────────────────────────────

/// Returns every input unchanged. Used when no LLM credential is configured.
pub struct IdentityRewriter;

#[async_trait]
impl RewriteBackend for IdentityRewriter {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn rewrite_section(
        &self,
        _section_name: &str,
        content: &str,
        _context: &str,
    ) -> Result<String, LlmError> {
        Ok(content.to_string())
    }

    async fn write_cover_letter(
        &self,
        _resume_text: &str,
        _context: &str,
    ) -> Result<String, LlmError> {
        Ok(DEFAULT_COVER_LETTER.to_string())
    }

    async fn generate_latex(&self, _resume_text: &str, _template: &str) -> Result<String, LlmError> {
        warn!("LaTeX generation disabled; returning an empty document");
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::prompts::DEFAULT_LATEX_TEMPLATE;

    #[tokio::test]
    async fn test_identity_rewriter_returns_input() {
        let backend = IdentityRewriter;
        let out = backend
            .rewrite_section("Experience", "  \\item Built X\n", "ctx")
            .await
            .unwrap();
        assert_eq!(out, "  \\item Built X\n");
    }

    #[tokio::test]
    async fn test_identity_rewriter_default_cover_letter() {
        let letter = IdentityRewriter
            .write_cover_letter("resume", "ctx")
            .await
            .unwrap();
        assert!(letter.starts_with("Dear Hiring Manager"));
    }

    #[tokio::test]
    async fn test_identity_rewriter_cannot_generate_latex() {
        let latex = IdentityRewriter
            .generate_latex("Jane Doe", DEFAULT_LATEX_TEMPLATE)
            .await
            .unwrap();
        assert!(latex.is_empty());
    }

    #[test]
    fn test_latex_prompt_embeds_template_and_resume() {
        let prompt = fill_template(
            LATEX_GENERATION_PROMPT_TEMPLATE,
            &[("template_content", DEFAULT_LATEX_TEMPLATE), ("resume_text", "Jane Doe")],
        );
        assert!(prompt.contains("\\section*{Experience}"));
        assert!(prompt.contains("<resume>\nJane Doe\n</resume>"));
        assert!(!prompt.contains("{template_content}"));
    }

    #[test]
    fn test_build_backend_without_key_is_identity() {
        let config = Config::from_lookup(|_| None).unwrap();
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "identity");
    }

    #[test]
    fn test_build_backend_with_key_is_llm() {
        let config = Config::from_lookup(|key| {
            (key == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "llm");
    }

    #[test]
    fn test_section_prompt_embeds_inputs_once() {
        let prompt = build_section_prompt("Skills", "Rust, Go", "Need {section_content} Rust");
        assert!(prompt.contains("Section: Skills"));
        assert!(prompt.contains("Need {section_content} Rust"));
        assert_eq!(prompt.matches("Rust, Go").count(), 1);
        assert!(prompt.contains("Never add \\section commands"));
    }

    #[test]
    fn test_section_prompt_falls_back_for_blank_name() {
        let prompt = build_section_prompt(" ", "x", "y");
        assert!(prompt.contains("Section: Resume Section"));
    }
}
