//! Naming utilities for generated identifiers

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Get an index name for a table and its columns
pub fn get_index_name(pattern: &str, table_name: &str, columns: &[String]) -> String {
    let columns_str = columns.join("_");

    format_name(pattern, &[("table", table_name), ("columns", &columns_str)])
}

/// Replace characters not allowed in SQL identifiers
pub fn sanitize_identifier(name: &str) -> String {
    let mut sanitized = name.replace(|c: char| !c.is_alphanumeric() && c != '_', "_");

    // Ensure identifier doesn't start with a number
    if sanitized.chars().next().map_or(false, |c| c.is_numeric()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Whether a name can be used as an identifier without any rewriting
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && sanitize_identifier(name) == name
}

/// Shorten an identifier to at most `max_length` bytes, keeping it unique
/// with a hash suffix
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        return name.to_string();
    }

    // Space for the hash (8 bytes) and the underscore (1 byte)
    let keep_length = max_length.saturating_sub(9);
    let hash = format!("{:x}", md5::compute(name.as_bytes()));
    let mut end = keep_length;
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}_{}", &name[..end], &hash[0..8])
}
