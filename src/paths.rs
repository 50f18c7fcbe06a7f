use std::path::PathBuf;

/// Clean up a path argument as typed or pasted into a shell prompt.
///
/// Drag-and-drop and copy-paste commonly wrap paths in quotes and escape
/// spaces with backslashes; both forms are stripped before the path is used.
pub fn sanitize_location(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches(|c| c == '\'' || c == '"');
    PathBuf::from(trimmed.replace("\\ ", " "))
}
