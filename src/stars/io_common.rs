use std::path::Path;

/// The lowercase extension of a file name, or an empty string.
pub fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

/// Splits each value on commas and line breaks.
///
/// `["Ava, Rich", "Sam"]` gives `["Ava", " Rich", "Sam"]`. Trimming and removing duplicates is
/// left to the roster.
pub fn split_names<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.as_ref().split(|c| c == ',' || c == '\n' || c == ';'))
        .map(|s| s.to_string())
        .collect()
}
