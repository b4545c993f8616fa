//! Document loading: text files are one page, PDFs yield one page per PDF page.

use std::path::Path;

/// Raw text of one page before chunking
#[derive(Debug, Clone)]
pub struct PageText {
    pub content: String,
    /// File name the text came from
    pub source: String,
    /// 1-based page number for PDFs, `None` for plain text
    pub page: Option<i64>,
}

/// File types accepted for ingestion
pub const SUPPORTED_TYPES: &[&str] = &["pdf", "txt"];

pub fn is_supported(file_type: &str) -> bool {
    SUPPORTED_TYPES.contains(&file_type.to_lowercase().as_str())
}

/// Load a document as pages of text
pub fn load_document(path: &Path, file_type: &str) -> Result<Vec<PageText>, String> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match file_type.to_lowercase().as_str() {
        "txt" => {
            let bytes = std::fs::read(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            Ok(vec![PageText {
                content: String::from_utf8_lossy(&bytes).to_string(),
                source,
                page: None,
            }])
        }
        "pdf" => {
            let pages = pdf_extract::extract_text_by_pages(path)
                .map_err(|e| format!("Failed to extract PDF text: {}", e))?;
            Ok(pages
                .into_iter()
                .enumerate()
                .map(|(i, content)| PageText {
                    content,
                    source: source.clone(),
                    page: Some(i as i64 + 1),
                })
                .collect())
        }
        other => Err(format!("Unsupported file type: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_text_file_is_single_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facts.txt");
        std::fs::write(&path, "The sky is blue.\nGrass is green.").unwrap();

        let pages = load_document(&path, "TXT").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, "facts.txt");
        assert_eq!(pages[0].page, None);
        assert!(pages[0].content.contains("Grass"));
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        std::fs::write(&path, "a,b").unwrap();

        let err = load_document(&path, "csv").unwrap_err();
        assert_eq!(err, "Unsupported file type: csv");
        assert!(is_supported("PDF"));
        assert!(!is_supported("docx"));
    }
}
