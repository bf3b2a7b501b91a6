//! Per-request orchestration of the tailoring flow.
//!
//! LaTeX resume: scan → dispatch → reconstruct.
//! PDF resume: the extracted text is one "Complete Resume" section, rewritten
//! as a whole; there is no markup to splice back into.
//! Both paths can then produce a cover letter from the final resume text, and
//! a tailored PDF resume can be typeset into a LaTeX template.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::RewriteContext;
use crate::latex::{scan, to_plain_text, tokenizer, ParseError};
use crate::models::sections::{SectionKey, SectionMap};
use crate::reconstruct::{reconstruct, Reconstruction, ReconstructionWarning};
use crate::rewrite::{Dispatcher, Eligibility, FailurePolicy, RewriteError, RewriteErrorKind};

/// Section name given to a plain-text resume.
pub const PLAIN_TEXT_SECTION: &str = "Complete Resume";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to parse resume: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("cover letter generation failed: {0}")]
    CoverLetter(#[source] RewriteErrorKind),

    #[error("LaTeX generation failed: {0}")]
    LatexGeneration(#[source] RewriteErrorKind),

    #[error("generated LaTeX does not parse: {0}")]
    GeneratedLatex(#[source] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeFormat {
    Latex,
    Pdf,
}

/// A section whose rewrite failed while the policy kept its original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionFailure {
    pub section: SectionKey,
    pub message: String,
}

impl From<&RewriteError> for SectionFailure {
    fn from(e: &RewriteError) -> Self {
        Self {
            section: e.section.clone(),
            message: e.kind.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TailoredResume {
    pub format: ResumeFormat,
    /// Sections as found in the source.
    pub sections: SectionMap,
    pub rewritten_sections: SectionMap,
    /// The final document text.
    pub document: String,
    /// True if reconstruction discarded every edit.
    pub reverted: bool,
    pub warnings: Vec<ReconstructionWarning>,
    pub failures: Vec<SectionFailure>,
}

impl TailoredResume {
    /// Plain text of the final resume, used as cover-letter input.
    pub fn plain_text(&self) -> String {
        match self.format {
            ResumeFormat::Pdf => self.document.clone(),
            ResumeFormat::Latex => to_plain_text(&self.document).unwrap_or_else(|e| {
                warn!("Could not flatten tailored resume ({}); using raw LaTeX", e);
                self.document.clone()
            }),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    dispatcher: Dispatcher,
    policy: FailurePolicy,
}

impl Pipeline {
    pub fn new(dispatcher: Dispatcher, policy: FailurePolicy) -> Self {
        Self { dispatcher, policy }
    }

    pub async fn tailor_latex(
        &self,
        document: &str,
        context: &RewriteContext,
    ) -> Result<TailoredResume, PipelineError> {
        let sections = scan(document)?;
        info!("Scanned {} section(s) from LaTeX resume", sections.len());

        let (rewritten, failures) = self.rewrite(&self.dispatcher, &sections, context).await?;
        let outcome = reconstruct(document, &sections, &rewritten);
        let reverted = outcome.is_reverted();
        if let Reconstruction::Reverted { reason, .. } = &outcome {
            warn!("Tailored resume reverted to the original: {}", reason);
        }
        let warnings = outcome.warnings().to_vec();

        Ok(TailoredResume {
            format: ResumeFormat::Latex,
            sections,
            rewritten_sections: rewritten,
            document: outcome.into_document(),
            reverted,
            warnings,
            failures,
        })
    }

    pub async fn tailor_plain_text(
        &self,
        text: &str,
        context: &RewriteContext,
    ) -> Result<TailoredResume, PipelineError> {
        let mut sections = SectionMap::new();
        let key = sections.push(PLAIN_TEXT_SECTION, text.trim());

        let dispatcher = self.dispatcher.with_eligibility(Eligibility::All);
        let (rewritten, failures) = self.rewrite(&dispatcher, &sections, context).await?;
        let document = rewritten.get(&key).unwrap_or(text.trim()).to_string();

        Ok(TailoredResume {
            format: ResumeFormat::Pdf,
            sections,
            rewritten_sections: rewritten,
            document,
            reverted: false,
            warnings: Vec::new(),
            failures,
        })
    }

    pub async fn cover_letter(
        &self,
        resume: &TailoredResume,
        context: &RewriteContext,
    ) -> Result<String, PipelineError> {
        let resume_text = resume.plain_text();
        let timeout = self.dispatcher.options().call_timeout;
        let call = self
            .dispatcher
            .backend()
            .write_cover_letter(&resume_text, context.as_str());

        let letter = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(letter)) => letter,
            Ok(Err(e)) => return Err(PipelineError::CoverLetter(RewriteErrorKind::Backend(e))),
            Err(_) => return Err(PipelineError::CoverLetter(RewriteErrorKind::Timeout(timeout))),
        };

        let letter = letter.trim();
        if letter.is_empty() {
            return Err(PipelineError::CoverLetter(RewriteErrorKind::EmptyOutput));
        }
        info!("Cover letter ready ({} chars)", letter.len());
        Ok(letter.to_string())
    }

    /// Typesets the tailored resume text into `template`. `Ok(None)` when the
    /// backend has no LaTeX generator (it returned nothing).
    pub async fn generate_latex(
        &self,
        resume: &TailoredResume,
        template: &str,
    ) -> Result<Option<String>, PipelineError> {
        let resume_text = resume.plain_text();
        let timeout = self.dispatcher.options().call_timeout;
        let call = self.dispatcher.backend().generate_latex(&resume_text, template);

        let latex = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(latex)) => latex,
            Ok(Err(e)) => return Err(PipelineError::LatexGeneration(RewriteErrorKind::Backend(e))),
            Err(_) => {
                return Err(PipelineError::LatexGeneration(RewriteErrorKind::Timeout(timeout)))
            }
        };

        let latex = latex.trim();
        if latex.is_empty() {
            info!("No LaTeX document generated");
            return Ok(None);
        }
        tokenizer::parse(latex).map_err(PipelineError::GeneratedLatex)?;
        info!("LaTeX resume ready ({} chars)", latex.len());
        Ok(Some(latex.to_string()))
    }

    async fn rewrite(
        &self,
        dispatcher: &Dispatcher,
        sections: &SectionMap,
        context: &RewriteContext,
    ) -> Result<(SectionMap, Vec<SectionFailure>), RewriteError> {
        match self.policy {
            FailurePolicy::Abort => Ok((dispatcher.dispatch(sections, context).await?, Vec::new())),
            FailurePolicy::KeepOriginal => {
                let outcome = dispatcher.dispatch_isolated(sections, context).await;
                let failures = outcome.failures.iter().map(SectionFailure::from).collect();
                Ok((outcome.sections, failures))
            }
        }
    }
}
