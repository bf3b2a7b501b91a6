use std::path::{Path, PathBuf};

use tracing::info;

use super::extract::extract_text;
use super::{ExtractionError, RewriteContext};

/// Extracts every supported file directly inside `dir` and joins the texts
/// in file-name order. Subdirectories and unsupported files are skipped; the
/// first extraction failure aborts the whole aggregation.
pub async fn aggregate(dir: &Path) -> Result<RewriteContext, ExtractionError> {
    let read_dir_error = |source| ExtractionError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_dir_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
        let file_type = entry.file_type().await.map_err(read_dir_error)?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }

    aggregate_files(files).await
}

/// Same as [`aggregate`] for an explicit list of files.
pub async fn aggregate_files(
    paths: impl IntoIterator<Item = PathBuf>,
) -> Result<RewriteContext, ExtractionError> {
    let mut paths: Vec<PathBuf> = paths.into_iter().collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut texts = Vec::with_capacity(paths.len());
    for path in &paths {
        if let Some(text) = extract_text(path).await? {
            texts.push(text);
        }
    }

    let extracted = texts.len();
    let context = RewriteContext::from_pieces(texts);
    info!(
        "Aggregated context from {} file(s): {} chars",
        extracted,
        context.len()
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::docx::tests::build_docx;

    #[tokio::test]
    async fn test_aggregate_joins_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_notes.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a_project.md"), "first\n").unwrap();
        std::fs::write(dir.path().join("c_role.docx"), build_docx(&["third"])).unwrap();
        std::fs::write(dir.path().join("d_logo.png"), [0u8; 4]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("0_hidden.md"), "nope").unwrap();

        let context = aggregate(dir.path()).await.unwrap();

        assert_eq!(context.as_str(), "first\n\nsecond\n\nthird");
    }

    #[tokio::test]
    async fn test_empty_directory_gives_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let context = aggregate(dir.path()).await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_one_bad_file_fails_the_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "fine").unwrap();
        std::fs::write(dir.path().join("b.docx"), "not a zip").unwrap();

        let err = aggregate(dir.path()).await.unwrap_err();

        assert!(matches!(err, ExtractionError::Docx { .. }));
        assert!(err.path().ends_with("b.docx"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let err = aggregate(Path::new("/nonexistent/tailor/staging"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ReadDir { .. }));
    }

    #[tokio::test]
    async fn test_aggregate_files_sorts_by_name_not_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("zzz");
        std::fs::create_dir(&sub).unwrap();
        let first = sub.join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&first, "alpha").unwrap();
        std::fs::write(&second, "beta").unwrap();

        let context = aggregate_files(vec![second, first]).await.unwrap();
        assert_eq!(context.as_str(), "alpha\n\nbeta");
    }
}
