//! Columnstore file naming conventions.

/// Extension of columnstore files.
pub const COLUMNSTORE_EXT: &str = "cs";

/// Generate the columnstore file name for a segment.
pub fn columnstore_file_name(segment: &str) -> String {
    format!("{}.{}", segment, COLUMNSTORE_EXT)
}

/// Parse a columnstore file name and return its segment name.
///
/// Returns `None` if the name doesn't carry the columnstore extension.
pub fn parse_columnstore_file_name(name: &str) -> Option<&str> {
    let segment = name.strip_suffix(COLUMNSTORE_EXT)?.strip_suffix('.')?;
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}
