/// Longest sanitized name we keep, leaving room for a " (n)" suffix.
pub const MAX_NAME_BYTES: usize = 200;

/// Longest tail (from a dot) kept intact when a name is shortened.
pub const MAX_SUFFIX_BYTES: usize = 32;

/// Keeps only alphanumerics, `-`, `.`, `_` and space, then trims surrounding
/// whitespace. Returns an empty string when nothing usable is left; the caller
/// substitutes a random token in that case.
pub fn sanitize_filename(filename: &str) -> String {
    let kept: String = filename
        .chars()
        .filter(|&c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ' '))
        .collect();

    let trimmed = kept.trim();

    // "." and ".." would resolve to the directory itself or its parent
    if trimmed.chars().all(|c| c == '.') {
        return String::new();
    }

    if trimmed.len() > MAX_NAME_BYTES {
        truncate_keeping_suffix(trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Shortens the stem so the extension the allow-list looks at survives.
/// The suffix starts at the first dot within the last `MAX_SUFFIX_BYTES`
/// bytes, so `.tar.gz` and `.txt.exe` are kept whole.
fn truncate_keeping_suffix(name: &str) -> String {
    let tail_start = name.len().saturating_sub(MAX_SUFFIX_BYTES);
    let split = name
        .char_indices()
        .find(|&(i, c)| c == '.' && i > 0 && i >= tail_start)
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    let (stem, suffix) = name.split_at(split);

    // Limit length safely for UTF-8
    let mut end = MAX_NAME_BYTES.saturating_sub(suffix.len()).min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", stem[..end].trim_end(), suffix)
}

/// 16 lowercase hex characters from the thread-local CSPRNG.
pub fn random_token() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// Suffix match against the allow-list, case-insensitive on the name.
/// An empty list permits every name.
pub fn is_extension_allowed(sanitized: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let lower = sanitized.to_lowercase();
    allowed.iter().any(|suffix| lower.ends_with(suffix.as_str()))
}
