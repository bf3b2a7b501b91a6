//! Rewrite Dispatcher: sends each eligible section through the backend.
//!
//! Flow: filter by eligibility → spawn one task per eligible section on a
//! `JoinSet` (bounded by a semaphore) → join barrier → assemble a new map.
//!
//! Results are written into the rewritten map only after a task completes, so
//! a section is either fully rewritten or still holds its original content.
//! Dropping the dispatch future drops the `JoinSet`, which aborts in-flight
//! calls.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RewriteContext;
use crate::llm_client::LlmError;
use crate::models::sections::{SectionKey, SectionMap};
use crate::rewrite::backend::RewriteBackend;

/// Section names (lowercased substrings) that are worth rewriting by default.
pub const DEFAULT_ELIGIBLE_KEYWORDS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "education",
    "skills",
    "technical skills",
    "projects",
    "achievements",
    "accomplishments",
    "summary",
    "objective",
];

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

// ────────────────────────────────────────────────────────────────────────────
// Policy types
// ────────────────────────────────────────────────────────────────────────────

/// Which sections get sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Eligible if the lowercased section name contains any keyword.
    Keywords(Vec<String>),
    /// Every section is eligible (plain-text resumes treated as one section).
    All,
}

impl Eligibility {
    pub fn default_keywords() -> Self {
        Self::Keywords(
            DEFAULT_ELIGIBLE_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        )
    }

    pub fn is_eligible(&self, section_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Keywords(keywords) => {
                let name = section_name.to_lowercase();
                keywords.iter().any(|k| name.contains(&k.to_lowercase()))
            }
        }
    }
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::default_keywords()
    }
}

/// What the caller wants when one section's rewrite fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole request on the first section error.
    #[default]
    Abort,
    /// Keep the original content for failed sections and report them.
    KeepOriginal,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "keep_original" | "keep-original" => Ok(Self::KeepOriginal),
            other => Err(format!(
                "unknown failure policy '{other}' (expected 'abort' or 'keep_original')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub eligibility: Eligibility,
    /// Maximum number of backend calls in flight at once.
    pub max_concurrency: usize,
    /// Per-call deadline.
    pub call_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            eligibility: Eligibility::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RewriteErrorKind {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error("backend returned empty content")]
    EmptyOutput,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rewrite task failed: {0}")]
    TaskFailed(String),
}

/// A single section's rewrite failed. Carries the section it belongs to.
#[derive(Debug, Error)]
#[error("rewrite of section '{section}' failed: {kind}")]
pub struct RewriteError {
    pub section: SectionKey,
    #[source]
    pub kind: RewriteErrorKind,
}

/// Result of `dispatch_isolated`: every section was attempted.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Same key set and order as the input; failed sections keep their
    /// original content.
    pub sections: SectionMap,
    pub failures: Vec<RewriteError>,
}

type TaskOutput = (usize, Result<String, RewriteErrorKind>);

// ────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn RewriteBackend>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn RewriteBackend>, options: DispatchOptions) -> Self {
        Self { backend, options }
    }

    /// Same backend and limits, different eligibility.
    pub fn with_eligibility(&self, eligibility: Eligibility) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            options: DispatchOptions {
                eligibility,
                ..self.options.clone()
            },
        }
    }

    pub fn backend(&self) -> &Arc<dyn RewriteBackend> {
        &self.backend
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Rewrites every eligible section. The first failure aborts the
    /// remaining calls and is returned with its section attached.
    pub async fn dispatch(
        &self,
        sections: &SectionMap,
        context: &RewriteContext,
    ) -> Result<SectionMap, RewriteError> {
        let (mut tasks, pending) = self.spawn_rewrites(sections, context);
        let mut rewritten = sections.clone();
        let mut done = vec![false; pending.len()];

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(output) => output,
                Err(e) => {
                    warn!("Rewrite task did not complete: {}", e);
                    continue;
                }
            };
            let key = &pending[index];
            match result {
                Ok(content) => {
                    rewritten.replace_content(key, content);
                    done[index] = true;
                }
                Err(kind) => {
                    warn!("Rewrite of section '{}' failed: {}; aborting", key, kind);
                    tasks.abort_all();
                    return Err(RewriteError {
                        section: key.clone(),
                        kind,
                    });
                }
            }
        }

        if let Some(index) = done.iter().position(|ok| !ok) {
            return Err(RewriteError {
                section: pending[index].clone(),
                kind: RewriteErrorKind::TaskFailed("task panicked or was cancelled".to_string()),
            });
        }

        info!("Rewrote {} of {} section(s)", pending.len(), sections.len());
        Ok(rewritten)
    }

    /// Rewrites every eligible section, letting each call finish regardless
    /// of the others. Failed sections keep their original content.
    pub async fn dispatch_isolated(
        &self,
        sections: &SectionMap,
        context: &RewriteContext,
    ) -> DispatchOutcome {
        let (mut tasks, pending) = self.spawn_rewrites(sections, context);
        let mut rewritten = sections.clone();
        let mut results: Vec<Option<Result<String, RewriteErrorKind>>> =
            (0..pending.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("Rewrite task did not complete: {}", e),
            }
        }

        let mut failures = Vec::new();
        for (key, result) in pending.into_iter().zip(results) {
            match result {
                Some(Ok(content)) => {
                    rewritten.replace_content(&key, content);
                }
                Some(Err(kind)) => {
                    warn!("Rewrite of section '{}' failed: {}; keeping original", key, kind);
                    failures.push(RewriteError { section: key, kind });
                }
                None => failures.push(RewriteError {
                    section: key,
                    kind: RewriteErrorKind::TaskFailed(
                        "task panicked or was cancelled".to_string(),
                    ),
                }),
            }
        }

        info!(
            "Rewrote sections with {} failure(s) out of {} section(s)",
            failures.len(),
            sections.len()
        );
        DispatchOutcome {
            sections: rewritten,
            failures,
        }
    }

    /// Spawns one task per eligible section. Returns the task set and the
    /// keys of the spawned sections, indexed by the task's slot.
    fn spawn_rewrites(
        &self,
        sections: &SectionMap,
        context: &RewriteContext,
    ) -> (JoinSet<TaskOutput>, Vec<SectionKey>) {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let context: Arc<str> = Arc::from(context.as_str());
        let timeout = self.options.call_timeout;

        let mut tasks = JoinSet::new();
        let mut pending = Vec::new();

        for section in sections {
            if !self.options.eligibility.is_eligible(&section.key.name) {
                debug!("Section '{}' not eligible; passing through", section.key);
                continue;
            }
            if section.content.trim().is_empty() {
                debug!("Section '{}' is empty; passing through", section.key);
                continue;
            }

            let index = pending.len();
            pending.push(section.key.clone());
            debug!("Dispatching rewrite for section '{}'", section.key);

            let backend = Arc::clone(&self.backend);
            let semaphore = Arc::clone(&semaphore);
            let context = Arc::clone(&context);
            let name = section.key.name.clone();
            let content = section.content.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        index,
                        Err(RewriteErrorKind::TaskFailed("rewrite pool closed".to_string())),
                    );
                };

                let call = backend.rewrite_section(&name, &content, &context);
                let result = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(text)) => {
                        let text = text.trim();
                        if text.is_empty() {
                            Err(RewriteErrorKind::EmptyOutput)
                        } else {
                            Ok(text.to_string())
                        }
                    }
                    Ok(Err(e)) => Err(RewriteErrorKind::Backend(e)),
                    Err(_) => Err(RewriteErrorKind::Timeout(timeout)),
                };
                (index, result)
            });
        }

        (tasks, pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::backend::IdentityRewriter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upper-cases content; fails for sections named in `fail_on`.
    struct ShoutingBackend {
        fail_on: Vec<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ShoutingBackend {
        fn new() -> Self {
            Self {
                fail_on: vec![],
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(10),
            }
        }
    }

    #[async_trait]
    impl RewriteBackend for ShoutingBackend {
        fn name(&self) -> &'static str {
            "shouting"
        }

        async fn rewrite_section(
            &self,
            section_name: &str,
            content: &str,
            _context: &str,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.iter().any(|f| *f == section_name) {
                return Err(LlmError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(format!("  {}\n", content.to_uppercase()))
        }

        async fn write_cover_letter(&self, _: &str, _: &str) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn generate_latex(&self, _: &str, _: &str) -> Result<String, LlmError> {
            Ok(String::new())
        }
    }

    fn sections(names: &[&str]) -> SectionMap {
        let mut map = SectionMap::new();
        for name in names {
            map.push(*name, format!("{} content", name.to_lowercase()));
        }
        map
    }

    fn ctx() -> RewriteContext {
        RewriteContext::from_pieces(vec!["Job: Rust engineer".to_string()])
    }

    #[tokio::test]
    async fn test_only_eligible_sections_are_rewritten() {
        let backend = Arc::new(ShoutingBackend::new());
        let dispatcher = Dispatcher::new(backend.clone(), DispatchOptions::default());
        let input = sections(&["Education", "Hobbies"]);

        let out = dispatcher.dispatch(&input, &ctx()).await.unwrap();

        assert_eq!(out.get_by_name("Education"), Some("EDUCATION CONTENT"));
        assert_eq!(out.get_by_name("Hobbies"), Some("hobbies content"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_output_keeps_key_set_and_order() {
        let dispatcher = Dispatcher::new(Arc::new(ShoutingBackend::new()), DispatchOptions::default());
        let input = sections(&["Summary", "Hobbies", "Projects", "Projects", "Skills"]);

        let out = dispatcher.dispatch(&input, &ctx()).await.unwrap();

        let before: Vec<_> = input.keys().cloned().collect();
        let after: Vec<_> = out.keys().cloned().collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_backend_output_is_trimmed() {
        let dispatcher = Dispatcher::new(Arc::new(ShoutingBackend::new()), DispatchOptions::default());
        let out = dispatcher.dispatch(&sections(&["Skills"]), &ctx()).await.unwrap();
        assert_eq!(out.get_by_name("Skills"), Some("SKILLS CONTENT"));
    }

    #[tokio::test]
    async fn test_identity_backend_is_transparent() {
        let dispatcher = Dispatcher::new(Arc::new(IdentityRewriter), DispatchOptions::default());
        let input = sections(&["Experience", "Education", "Hobbies"]);
        let out = dispatcher.dispatch(&input, &ctx()).await.unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_empty_sections_are_not_sent_to_backend() {
        let backend = Arc::new(ShoutingBackend::new());
        let dispatcher = Dispatcher::new(backend.clone(), DispatchOptions::default());
        let mut input = SectionMap::new();
        input.push("Summary", "");
        input.push("Skills", "  \n");
        input.push("Experience", "built x");

        let out = dispatcher.dispatch(&input, &ctx()).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.get_by_name("Summary"), Some(""));
        assert_eq!(out.get_by_name("Skills"), Some("  \n"));
        assert_eq!(out.get_by_name("Experience"), Some("BUILT X"));
    }

    #[tokio::test]
    async fn test_rewrite_all_mode() {
        let dispatcher = Dispatcher::new(Arc::new(ShoutingBackend::new()), DispatchOptions::default())
            .with_eligibility(Eligibility::All);
        let out = dispatcher.dispatch(&sections(&["Hobbies"]), &ctx()).await.unwrap();
        assert_eq!(out.get_by_name("Hobbies"), Some("HOBBIES CONTENT"));
    }

    #[tokio::test]
    async fn test_failure_identifies_section() {
        let mut backend = ShoutingBackend::new();
        backend.fail_on = vec!["Skills"];
        let dispatcher = Dispatcher::new(Arc::new(backend), DispatchOptions::default());

        let err = dispatcher
            .dispatch(&sections(&["Education", "Skills"]), &ctx())
            .await
            .unwrap_err();

        assert_eq!(err.section, SectionKey::first("Skills"));
        assert!(matches!(err.kind, RewriteErrorKind::Backend(LlmError::Api { status: 500, .. })));
        assert!(err.to_string().contains("'Skills'"));
    }

    #[tokio::test]
    async fn test_isolated_failures_do_not_affect_other_sections() {
        let mut backend = ShoutingBackend::new();
        backend.fail_on = vec!["Skills"];
        let dispatcher = Dispatcher::new(Arc::new(backend), DispatchOptions::default());
        let input = sections(&["Education", "Skills", "Projects"]);

        let outcome = dispatcher.dispatch_isolated(&input, &ctx()).await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].section, SectionKey::first("Skills"));
        assert_eq!(outcome.sections.get_by_name("Skills"), Some("skills content"));
        assert_eq!(outcome.sections.get_by_name("Education"), Some("EDUCATION CONTENT"));
        assert_eq!(outcome.sections.get_by_name("Projects"), Some("PROJECTS CONTENT"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let backend = Arc::new(ShoutingBackend::new());
        let options = DispatchOptions {
            eligibility: Eligibility::All,
            max_concurrency: 2,
            ..DispatchOptions::default()
        };
        let dispatcher = Dispatcher::new(backend.clone(), options);
        let names: Vec<String> = (0..8).map(|i| format!("S{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        dispatcher.dispatch(&sections(&refs), &ctx()).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 8);
        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let mut backend = ShoutingBackend::new();
        backend.delay = Duration::from_secs(600);
        let options = DispatchOptions {
            call_timeout: Duration::from_secs(5),
            ..DispatchOptions::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(backend), options);

        let err = dispatcher
            .dispatch(&sections(&["Experience"]), &ctx())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, RewriteErrorKind::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_empty_backend_output_is_an_error() {
        struct Blank;

        #[async_trait]
        impl RewriteBackend for Blank {
            fn name(&self) -> &'static str {
                "blank"
            }
            async fn rewrite_section(&self, _: &str, _: &str, _: &str) -> Result<String, LlmError> {
                Ok("   \n".to_string())
            }
            async fn write_cover_letter(&self, _: &str, _: &str) -> Result<String, LlmError> {
                Ok(String::new())
            }
            async fn generate_latex(&self, _: &str, _: &str) -> Result<String, LlmError> {
                Ok(String::new())
            }
        }

        let dispatcher = Dispatcher::new(Arc::new(Blank), DispatchOptions::default());
        let err = dispatcher
            .dispatch(&sections(&["Summary"]), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err.kind, RewriteErrorKind::EmptyOutput));
    }

    #[test]
    fn test_eligibility_is_case_insensitive_substring() {
        let eligibility = Eligibility::default();
        assert!(eligibility.is_eligible("WORK EXPERIENCE"));
        assert!(eligibility.is_eligible("Selected Projects"));
        assert!(!eligibility.is_eligible("Hobbies"));
        assert!(!eligibility.is_eligible("Unnamed"));
        assert!(Eligibility::All.is_eligible("Hobbies"));
    }

    #[test]
    fn test_failure_policy_parses() {
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert_eq!(
            "Keep_Original".parse::<FailurePolicy>(),
            Ok(FailurePolicy::KeepOriginal)
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
