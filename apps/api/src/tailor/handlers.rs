use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::{aggregate, extract::extract_bytes, SupportedFormat};
use crate::errors::AppError;
use crate::latex::{scan_with, DEFAULT_HEADING};
use crate::models::sections::SectionMap;
use crate::pipeline::{ResumeFormat, SectionFailure, TailoredResume};
use crate::reconstruct::ReconstructionWarning;
use crate::rewrite::prompts::DEFAULT_LATEX_TEMPLATE;
use crate::rewrite::FailurePolicy;
use crate::state::AppState;
use crate::tailor::upload::{self, StagedUpload};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub document: String,
    /// Heading command without the backslash, e.g. "subsection".
    pub heading: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub count: usize,
    pub sections: SectionMap,
}

#[derive(Debug, Serialize)]
pub struct TailorResponse {
    pub request_id: Uuid,
    pub resume_format: ResumeFormat,
    pub sections: SectionMap,
    pub rewritten_sections: SectionMap,
    pub document: String,
    pub reverted: bool,
    pub warnings: Vec<ReconstructionWarning>,
    pub failures: Vec<SectionFailure>,
    pub cover_letter: Option<String>,
    /// LaTeX rendering of a tailored PDF resume, when the backend can produce one.
    pub latex_document: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// POST /api/v1/sections
pub async fn handle_scan_sections(
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    let heading = req.heading.as_deref().unwrap_or(DEFAULT_HEADING);
    if heading.is_empty() || !heading.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "heading must be a command name made of letters, got '{heading}'"
        )));
    }

    let sections = scan_with(&req.document, heading)?;
    Ok(Json(ScanResponse {
        count: sections.len(),
        sections,
    }))
}

/// POST /api/v1/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TailorResponse>, AppError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("tailor", %request_id);

    async move {
        let upload = upload::receive(multipart, &state.http).await?;
        let response = tailor(&state, request_id, &upload).await?;
        // `upload` drops here, deleting the staging directory
        Ok::<_, AppError>(Json(response))
    }
    .instrument(span)
    .await
}

async fn tailor(
    state: &AppState,
    request_id: Uuid,
    upload: &StagedUpload,
) -> Result<TailorResponse, AppError> {
    if !upload.has_job_description() {
        warn!("No job description supplied; rewriting against supporting files only");
    }
    let context = aggregate(upload.staging_dir()).await?;

    let pipeline = state.pipeline();
    let resume = &upload.resume;
    let tailored = match resume.format {
        SupportedFormat::Tex => {
            let document = std::str::from_utf8(&resume.bytes).map_err(|_| {
                AppError::Validation(format!("resume '{}' is not valid UTF-8", resume.file_name))
            })?;
            pipeline.tailor_latex(document, &context).await?
        }
        _ => {
            let text = extract_bytes(
                Path::new(&resume.file_name),
                resume.format,
                resume.bytes.to_vec(),
            )
            .await?;
            if text.trim().is_empty() {
                return Err(AppError::UnprocessableEntity(format!(
                    "no text could be extracted from resume '{}'",
                    resume.file_name
                )));
            }
            pipeline.tailor_plain_text(&text, &context).await?
        }
    };

    let keep_going = state.config.failure_policy == FailurePolicy::KeepOriginal;
    let cover_letter = match pipeline.cover_letter(&tailored, &context).await {
        Ok(letter) => Some(letter),
        Err(e) if keep_going => {
            warn!("Cover letter skipped: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let latex_document = match tailored.format {
        ResumeFormat::Pdf => {
            let template = upload
                .latex_template
                .as_deref()
                .unwrap_or(DEFAULT_LATEX_TEMPLATE);
            match pipeline.generate_latex(&tailored, template).await {
                Ok(latex) => latex,
                Err(e) if keep_going => {
                    warn!("LaTeX resume skipped: {}", e);
                    None
                }
                Err(e) => return Err(e.into()),
            }
        }
        ResumeFormat::Latex => {
            if upload.latex_template.is_some() {
                warn!("LaTeX template ignored; the resume is already LaTeX");
            }
            None
        }
    };

    info!(
        "Tailored resume: {} section(s), reverted={}, {} warning(s), {} failure(s)",
        tailored.sections.len(),
        tailored.reverted,
        tailored.warnings.len(),
        tailored.failures.len()
    );
    Ok(build_response(request_id, tailored, cover_letter, latex_document))
}

fn build_response(
    request_id: Uuid,
    tailored: TailoredResume,
    cover_letter: Option<String>,
    latex_document: Option<String>,
) -> TailorResponse {
    TailorResponse {
        request_id,
        resume_format: tailored.format,
        sections: tailored.sections,
        rewritten_sections: tailored.rewritten_sections,
        document: tailored.document,
        reverted: tailored.reverted,
        warnings: tailored.warnings,
        failures: tailored.failures,
        cover_letter,
        latex_document,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::build_router;
    use crate::rewrite::backend::IdentityRewriter;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "tailor-test-boundary";

    const RESUME: &str = "\\documentclass{article}\n\\begin{document}\n\\section{Experience}\nBuilt X using Y\n\\section{Hobbies}\nChess\n\\end{document}\n";

    fn app() -> Router {
        build_router(AppState {
            config: Config::from_lookup(|_| None).unwrap(),
            backend: Arc::new(IdentityRewriter),
            http: reqwest::Client::new(),
        })
    }

    enum Part<'a> {
        File(&'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, file_name, contents) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(contents);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/tailor")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_tailor_latex_in_degraded_mode_returns_original() {
        let request = multipart_request(&[
            Part::File("resume", "cv.tex", RESUME.as_bytes()),
            Part::Text("jd_text", "We need a Rust engineer."),
            Part::File("readme", "project.md", b"# Tailor\nA Rust service."),
        ]);

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["resume_format"], "latex");
        assert_eq!(body["document"], RESUME);
        assert_eq!(body["reverted"], false);
        assert_eq!(body["sections"][0]["name"], "Experience");
        assert_eq!(body["sections"][0]["content"], "Built X using Y");
        assert_eq!(body["sections"][1]["ordinal"], 0);
        assert!(body["cover_letter"]
            .as_str()
            .unwrap()
            .starts_with("Dear Hiring Manager"));
        assert!(body["latex_document"].is_null());
    }

    #[tokio::test]
    async fn test_latex_template_is_accepted_and_ignored_for_latex_resume() {
        let request = multipart_request(&[
            Part::File("resume", "cv.tex", RESUME.as_bytes()),
            Part::File("latex_template", "template.tex", b"\\documentclass{article}"),
        ]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["document"], RESUME);
        assert!(body["latex_document"].is_null());
    }

    #[tokio::test]
    async fn test_latex_template_must_be_tex() {
        let request = multipart_request(&[
            Part::File("resume", "cv.tex", RESUME.as_bytes()),
            Part::File("latex_template", "template.md", b"# template"),
        ]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_second_latex_template_is_rejected() {
        let request = multipart_request(&[
            Part::File("resume", "cv.tex", RESUME.as_bytes()),
            Part::File("latex_template", "a.tex", b"\\documentclass{article}"),
            Part::File("latex_template", "b.tex", b"\\documentclass{article}"),
        ]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_resume_is_bad_request() {
        let request = multipart_request(&[Part::Text("jd_text", "Rust role")]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_wrong_resume_extension_is_bad_request() {
        let request = multipart_request(&[Part::File("resume", "cv.docx", b"PK")]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_experience_txt_is_rejected() {
        let request = multipart_request(&[
            Part::File("resume", "cv.tex", RESUME.as_bytes()),
            Part::File("experience", "notes.txt", b"Built things"),
        ]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparseable_resume_is_unprocessable() {
        let request = multipart_request(&[Part::File(
            "resume",
            "cv.tex",
            b"\\section{Experience}\n\\textbf{oops",
        )]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_scan_sections_endpoint() {
        let Json(response) = handle_scan_sections(Json(ScanRequest {
            document: RESUME.to_string(),
            heading: None,
        }))
        .await
        .unwrap();
        assert_eq!(response.count, 2);
        assert_eq!(response.sections.get_by_name("Hobbies"), Some("Chess"));
    }

    #[tokio::test]
    async fn test_scan_sections_rejects_bad_heading() {
        let err = handle_scan_sections(Json(ScanRequest {
            document: RESUME.to_string(),
            heading: Some("sec tion".to_string()),
        }))
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["service"], "tailor-api");
    }
}
