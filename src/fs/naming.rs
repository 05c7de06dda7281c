//! Filename sanitizing.

use std::path::{Path, PathBuf};

/// Longest path component produced from user-visible text, in characters.
pub const MAX_COMPONENT_CHARS: usize = 80;

/// Replace separators and characters reserved on common filesystems with `_`.
fn replace_reserved(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Cap `name` at [`MAX_COMPONENT_CHARS`] without splitting a character.
pub fn truncate_component(name: &str) -> String {
    name.chars().take(MAX_COMPONENT_CHARS).collect()
}

/// Turn free text such as a post title into a safe path component.
///
/// Never fails: dot runs collapse, reserved characters become `_`, and an
/// empty result falls back to `fallback`.
pub fn text_component(text: &str, fallback: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut cleaned = replace_reserved(&collapsed);
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    let truncated = truncate_component(&cleaned);
    // Trailing dots and spaces are stripped by some filesystems.
    let trimmed = truncated.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Return `path` or, if it exists, the first free `name_N.ext` beside it.
pub fn make_unique_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter = 1;
    loop {
        let new_name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };

        let new_path = parent.join(&new_name);
        if !new_path.exists() || counter >= 1000 {
            return new_path;
        }
        counter += 1;
    }
}
