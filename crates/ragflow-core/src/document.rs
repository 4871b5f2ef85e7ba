use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocumentInput;

/// Extensions picked up when a directory is given as an input.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Resolve an input to `(source_id, text)`.
pub fn read_document(input: &DocumentInput) -> Result<(String, String)> {
    match input {
        DocumentInput::Text { source_id, text } => Ok((source_id.clone(), text.clone())),
        DocumentInput::File(path) => {
            let source_id = input.source_id();
            let text = read_file_content(path).map_err(|cause| Error::DocumentRead { source_id: source_id.clone(), cause })?;
            Ok((source_id, text))
        }
    }
}

/// UTF-8 first; anything else is decoded as Latin-1 so no file is rejected for its encoding.
fn read_file_content(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => Ok(e.into_bytes().iter().map(|&b| char::from(b)).collect()),
    }
}

/// Turn CLI paths into inputs: directories expand to their text files (sorted),
/// everything else is passed through so unreadable paths surface as per-document errors.
pub fn collect_inputs<P: AsRef<Path>>(paths: &[P]) -> Vec<DocumentInput> {
    let mut inputs = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            inputs.extend(list_text_files(path).into_iter().map(DocumentInput::File));
        } else {
            inputs.push(DocumentInput::File(path.to_path_buf()));
        }
    }
    inputs
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}
