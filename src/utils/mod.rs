//! Utility functions and helpers

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Characters that are not allowed in emitted chunk file names
static INVALID_FILE_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\x00-\x1F\x7F<>*#"{}|^\[\]`;?:&=+$,]"#).expect("valid file name pattern")
});

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Get relative path from base to target
pub fn relative_path(from: &Path, to: &Path) -> Option<String> {
    pathdiff::diff_paths(to, from)
        .map(|p| path_to_module_id(&p))
}

/// Clean a path by removing . and .. components
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Convert a file path to a module ID
pub fn path_to_module_id(path: &Path) -> String {
    normalize_id(&path.display().to_string())
}

/// Normalize separators of a raw module id
pub fn normalize_id(id: &str) -> String {
    id.replace('\\', "/")
}

/// Check whether `id` is `root` itself or lives below it, on segment boundaries
pub fn is_under(id: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return id.starts_with('/');
    }
    id == root || (id.starts_with(root) && id[root.len()..].starts_with('/'))
}

/// Check whether any `/`-separated segment of `id` equals `segment`
pub fn has_segment(id: &str, segment: &str) -> bool {
    id.split('/').any(|part| part == segment)
}

/// Strip everything up to and including the last `node_modules/`
pub fn without_node_modules(id: &str) -> &str {
    match id.rfind("node_modules/") {
        Some(idx) => &id[idx + "node_modules/".len()..],
        None => id,
    }
}

/// Replace characters that are not safe in output file names
pub fn sanitize_file_name(name: &str) -> String {
    INVALID_FILE_CHARS.replace_all(name, "_").into_owned()
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
