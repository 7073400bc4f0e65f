//! PDF directory loader: one [`SourceDocument`] per page.

use std::path::{Path, PathBuf};

use lopdf::Document;
use serde::{Deserialize, Serialize};

use super::ingest::IngestionError;

/// The text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path of the PDF the page came from.
    pub source_path: String,
    /// 0-based page number.
    pub page_number: u32,
    pub raw_text: String,
}

/// Loads every `*.pdf` under `dir` in sorted path order.
pub async fn load_directory(
    dir: &Path,
    recursive: bool,
) -> Result<Vec<SourceDocument>, IngestionError> {
    if !dir.is_dir() {
        return Err(IngestionError::DirectoryNotFound(dir.to_path_buf()));
    }

    let files = collect_pdf_paths(dir, recursive)?;
    if files.is_empty() {
        return Err(IngestionError::NoDocuments(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    for path in files {
        let task_path = path.clone();
        let pages = tokio::task::spawn_blocking(move || extract_pages(&task_path))
            .await
            .map_err(|err| IngestionError::Task(err.to_string()))??;
        tracing::info!(path = %path.display(), pages = pages.len(), "loaded PDF");
        documents.extend(pages);
    }

    Ok(documents)
}

fn collect_pdf_paths(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, IngestionError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| IngestionError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| IngestionError::Io {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_pdf(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn extract_pages(path: &Path) -> Result<Vec<SourceDocument>, IngestionError> {
    let doc = Document::load(path).map_err(|e| IngestionError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let source_path = path.display().to_string();
    let mut documents = Vec::new();

    // get_pages is keyed by 1-based page number.
    for (page_num, _page_id) in doc.get_pages() {
        let raw_text = match doc.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %source_path, page = page_num, "no extractable text: {}", e);
                String::new()
            }
        };
        documents.push(SourceDocument {
            source_path: source_path.clone(),
            page_number: page_num.saturating_sub(1),
            raw_text,
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_pdf;

    #[tokio::test]
    async fn loads_pages_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(&dir.path().join("b.pdf"), &["Second file"]);
        write_pdf(&dir.path().join("a.PDF"), &["Alpha page one", "Alpha page two"]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = load_directory(dir.path(), false).await.unwrap();

        assert_eq!(docs.len(), 3);
        assert!(docs[0].source_path.ends_with("a.PDF"));
        assert_eq!(docs[0].page_number, 0);
        assert_eq!(docs[1].page_number, 1);
        assert!(docs[1].raw_text.contains("Alpha page two"));
        assert!(docs[2].source_path.ends_with("b.pdf"));
    }

    #[tokio::test]
    async fn nested_directories_need_recursive_flag() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write_pdf(&nested.join("deep.pdf"), &["Deep text"]);

        let err = load_directory(dir.path(), false).await.unwrap_err();
        assert!(matches!(err, IngestionError::NoDocuments(_)));

        let docs = load_directory(dir.path(), true).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_and_broken_pdf_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_directory(&dir.path().join("absent"), false).await.unwrap_err();
        assert!(matches!(err, IngestionError::DirectoryNotFound(_)));

        std::fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();
        let err = load_directory(dir.path(), false).await.unwrap_err();
        assert!(matches!(err, IngestionError::Pdf { .. }));
        assert!(err.to_string().contains("broken.pdf"));
    }
}
