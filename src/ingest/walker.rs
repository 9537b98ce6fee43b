use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ProfileGraphError, Result};

/// A payload file found on disk.
#[derive(Debug, Clone)]
pub struct PayloadFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_size: u64,
}

/// Find provider payload files (`.json`, case-insensitive) under `root`.
///
/// A file path is returned as-is. Results are sorted by relative path so
/// imports run in a stable order.
pub fn discover_payloads(root: &Path) -> Result<Vec<PayloadFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }

        let metadata = std::fs::metadata(path)?;
        let relative_path = if path == root {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            path.strip_prefix(root)
                .map_err(|_| {
                    ProfileGraphError::Config(format!("Failed to compute relative path for: {}", path.display()))
                })?
                .to_string_lossy()
                .to_string()
        };

        files.push(PayloadFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            file_size: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::info!("Discovered {} payload files in {}", files.len(), root.display());
    Ok(files)
}
