//! Knowledge document source: a JSON file or a directory of text documents.

use std::path::{Path, PathBuf};

use concierge_core::error::{ConciergeError, Result};
use serde::Deserialize;

/// A titled document with optional metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub title: String,
    #[serde(default, alias = "url")]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(alias = "content")]
    pub body: String,
}

const TEXT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Load documents from `path`.
///
/// - missing path → no documents
/// - `.json` file → array of `{title, canonical_url?, updated_at?, body|content}`
/// - any other file → a single text document
/// - directory → every `.md` / `.markdown` / `.txt` file, sorted by path
///
/// Documents with a blank body are skipped.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    if !path.exists() {
        tracing::warn!("⚠️ Knowledge source {} not found, using empty index", path.display());
        return Ok(Vec::new());
    }

    let docs = if path.is_dir() {
        let mut files = Vec::new();
        collect_text_files(path, &mut files)?;
        files.sort();
        files
            .iter()
            .map(|f| read_text_document(f))
            .collect::<Result<Vec<_>>>()?
    } else if has_extension(path, "json") {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str::<Vec<Document>>(&content).map_err(|e| {
            ConciergeError::Config(format!("Invalid knowledge file {}: {e}", path.display()))
        })?
    } else {
        vec![read_text_document(path)?]
    };

    let total = docs.len();
    let docs: Vec<Document> = docs.into_iter().filter(|d| !d.body.trim().is_empty()).collect();
    tracing::debug!(
        "Loaded {} document(s) from {} ({} blank skipped)",
        docs.len(),
        path.display(),
        total - docs.len()
    );
    Ok(docs)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn collect_text_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_text_files(&path, out)?;
        } else if TEXT_EXTENSIONS.iter().any(|ext| has_extension(&path, ext)) {
            out.push(path);
        }
    }
    Ok(())
}

fn read_text_document(path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string();
    Ok(parse_text_document(&raw, &stem))
}

/// Parse optional `---` front matter, then fall back to the first `# ` heading
/// and finally `fallback_title` for the title.
pub fn parse_text_document(raw: &str, fallback_title: &str) -> Document {
    let mut title = None;
    let mut canonical_url = None;
    let mut updated_at = None;
    let mut body = raw;

    let trimmed = raw.trim_start_matches('\u{feff}');
    if let Some(rest) = trimmed.strip_prefix("---\n").or_else(|| trimmed.strip_prefix("---\r\n")) {
        if let Some(end) = find_front_matter_end(rest) {
            for line in rest[..end].lines() {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let value = value.trim().trim_matches('"').to_string();
                if value.is_empty() {
                    continue;
                }
                match key.trim().to_ascii_lowercase().as_str() {
                    "title" => title = Some(value),
                    "canonical_url" | "url" => canonical_url = Some(value),
                    "updated_at" | "updated" => updated_at = Some(value),
                    _ => {}
                }
            }
            body = rest[end..]
                .trim_start_matches("---")
                .trim_start_matches(['\r', '\n']);
        }
    }

    let title = title
        .or_else(|| {
            body.lines()
                .find_map(|l| l.strip_prefix("# "))
                .map(|h| h.trim().to_string())
        })
        .unwrap_or_else(|| fallback_title.to_string());

    Document {
        title,
        canonical_url,
        updated_at,
        body: body.trim().to_string(),
    }
}

/// Byte offset of the closing `---` line inside the front matter block.
fn find_front_matter_end(rest: &str) -> Option<usize> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_empty() {
        let docs = load_documents(Path::new("/definitely/not/here")).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_json_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"[
                {"title": "Hours", "canonical_url": "https://x.com/hours", "updated_at": "2025-05-01", "body": "Open 9-18."},
                {"title": "Blank", "content": "   "},
                {"title": "Parking", "url": "https://x.com/parking", "content": "Free parking."}
            ]"#,
        )
        .unwrap();

        let docs = load_documents(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].canonical_url.as_deref(), Some("https://x.com/hours"));
        assert_eq!(docs[1].title, "Parking");
        assert_eq!(docs[1].body, "Free parking.");
        assert_eq!(docs[1].updated_at, None);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_documents(&path), Err(ConciergeError::Config(_))));
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b-pricing.md"),
            "---\ntitle: Pricing\ncanonical_url: https://x.com/pricing\nupdated_at: 2025-02-10\n---\nPlans start at $10.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("a-faq.md"), "# Frequent questions\n\nWe reply within a day.").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("notes.txt"), "Plain notes.").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = load_documents(dir.path()).unwrap();
        let titles: Vec<_> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Frequent questions", "Pricing", "notes"]);
        assert_eq!(docs[1].canonical_url.as_deref(), Some("https://x.com/pricing"));
        assert_eq!(docs[1].updated_at.as_deref(), Some("2025-02-10"));
        assert_eq!(docs[1].body, "Plans start at $10.");
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let doc = parse_text_document("---\ntitle: x\nno end here", "file");
        assert_eq!(doc.title, "file");
        assert!(doc.body.starts_with("---"));
    }
}
