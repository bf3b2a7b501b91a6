//! Multipart intake for `POST /api/v1/tailor`.
//!
//! The resume and an optional LaTeX template are kept in memory. Supporting files and job-description inputs
//! are written into a per-request staging directory, which the Context
//! Aggregator then reads. The directory is removed when `StagedUpload` drops.

use std::path::Path;
use std::time::Duration;

use axum::extract::Multipart;
use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::context::SupportedFormat;
use crate::errors::AppError;

const RESUME_EXTENSIONS: &[&str] = &["pdf", "tex"];
const EXPERIENCE_EXTENSIONS: &[&str] = &["pdf", "docx", "md", "tex"];
const SUPPORTING_EXTENSIONS: &[&str] = &["pdf", "docx", "md", "tex", "txt"];
const TEMPLATE_EXTENSIONS: &[&str] = &["tex"];

pub const JD_TEXT_FILE: &str = "job_description_text.txt";
pub const JD_URL_FILE: &str = "job_description_url.txt";
const JD_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct UploadedResume {
    pub file_name: String,
    pub format: SupportedFormat,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct StagedUpload {
    pub resume: UploadedResume,
    /// Template a PDF resume is typeset into.
    pub latex_template: Option<String>,
    /// File names written into the staging directory, in arrival order.
    pub staged: Vec<String>,
    staging: TempDir,
}

impl StagedUpload {
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    pub fn has_job_description(&self) -> bool {
        self.staged.iter().any(|name| name.starts_with("job_description"))
    }
}

/// Reads every multipart field, validating extensions and staging files.
pub async fn receive(
    mut multipart: Multipart,
    http: &reqwest::Client,
) -> Result<StagedUpload, AppError> {
    let staging = TempDir::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create staging dir: {e}")))?;
    let mut resume = None;
    let mut latex_template = None;
    let mut staged = Vec::new();
    let mut counter = 0usize;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match name.as_str() {
            "resume" | "experience" | "readme" | "jd_file" => {
                let Some(file_name) = file_name.filter(|f| !f.trim().is_empty()) else {
                    // Browsers send an empty part for an unused file input
                    continue;
                };
                let bytes = field.bytes().await?;

                if name == "resume" {
                    if resume.is_some() {
                        return Err(AppError::Validation(
                            "exactly one resume file is allowed".to_string(),
                        ));
                    }
                    let format = check_extension(&file_name, RESUME_EXTENSIONS, "resume")?;
                    debug!("Received resume {} ({} bytes)", file_name, bytes.len());
                    resume = Some(UploadedResume {
                        file_name,
                        format,
                        bytes,
                    });
                    continue;
                }

                let (allowed, prefix) = match name.as_str() {
                    "experience" => (EXPERIENCE_EXTENSIONS, "experience"),
                    "readme" => (SUPPORTING_EXTENSIONS, "readme"),
                    _ => (SUPPORTING_EXTENSIONS, "job_description_file"),
                };
                check_extension(&file_name, allowed, &name)?;
                counter += 1;
                let staged_name = staged_file_name(counter, prefix, &file_name);
                write_staged(staging.path(), &staged_name, &bytes).await?;
                staged.push(staged_name);
            }
            "latex_template" => {
                let Some(file_name) = file_name.filter(|f| !f.trim().is_empty()) else {
                    continue;
                };
                if latex_template.is_some() {
                    return Err(AppError::Validation(
                        "at most one LaTeX template is allowed".to_string(),
                    ));
                }
                check_extension(&file_name, TEMPLATE_EXTENSIONS, "latex_template")?;
                let template = String::from_utf8(field.bytes().await?.to_vec()).map_err(|_| {
                    AppError::Validation(format!("template '{file_name}' is not valid UTF-8"))
                })?;
                debug!("Received LaTeX template {} ({} bytes)", file_name, template.len());
                latex_template = Some(template);
            }
            "jd_text" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    write_staged(staging.path(), JD_TEXT_FILE, text.as_bytes()).await?;
                    staged.push(JD_TEXT_FILE.to_string());
                }
            }
            "jd_url" => {
                let url = field.text().await?;
                if !url.trim().is_empty() {
                    let body = fetch_job_description(http, url.trim()).await?;
                    write_staged(staging.path(), JD_URL_FILE, body.as_bytes()).await?;
                    staged.push(JD_URL_FILE.to_string());
                }
            }
            other => {
                return Err(AppError::Validation(format!("unexpected form field '{other}'")));
            }
        }
    }

    let resume =
        resume.ok_or_else(|| AppError::Validation("a resume file (.tex or .pdf) is required".to_string()))?;
    info!(
        "Staged {} supporting file(s) for resume {}",
        staged.len(),
        resume.file_name
    );

    Ok(StagedUpload {
        resume,
        latex_template,
        staged,
        staging,
    })
}

fn check_extension(
    file_name: &str,
    allowed: &[&str],
    field: &str,
) -> Result<SupportedFormat, AppError> {
    SupportedFormat::from_path(Path::new(file_name))
        .filter(|format| allowed.contains(&format.extension()))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "invalid {field} file type: {file_name} (allowed: {})",
                allowed.join(", ")
            ))
        })
}

/// Keeps only the final path component and replaces anything outside
/// `[A-Za-z0-9._-]`, so an uploaded name can never leave the staging dir.
/// Staged name of the `counter`-th supporting file. The zero-padded counter
/// leads, so sorting by name keeps upload order.
fn staged_file_name(counter: usize, prefix: &str, file_name: &str) -> String {
    format!("{counter:04}_{prefix}_{}", sanitize_file_name(file_name))
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

async fn write_staged(dir: &Path, name: &str, contents: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(dir.join(name), contents)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to stage {name}: {e}")))?;
    debug!("Staged {}", name);
    Ok(())
}

/// Fetches a job posting. The raw response body is used as-is.
async fn fetch_job_description(http: &reqwest::Client, url: &str) -> Result<String, AppError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| AppError::Validation(format!("invalid jd_url '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "jd_url must be http or https, got '{}'",
            parsed.scheme()
        )));
    }

    let upstream = |e: reqwest::Error| {
        AppError::Upstream(format!("failed to fetch job description from URL: {e}"))
    };
    let body = http
        .get(parsed)
        .timeout(JD_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(upstream)?
        .error_for_status()
        .map_err(upstream)?
        .text()
        .await
        .map_err(upstream)?;

    if body.trim().is_empty() {
        return Err(AppError::Upstream(
            "job description URL returned an empty page".to_string(),
        ));
    }
    info!("Fetched job description from {} ({} bytes)", url, body.len());
    Ok(body)
}
