//! Canonical scalar encoding for list-valued event fields
//!
//! `tags` and `images` are stored as a single comma-joined column. The
//! encoding is lossy: an element that itself contains a comma splits into
//! several elements on decode, and `[""]` decodes to `[]`. Callers that need
//! such values must not store them in these fields.

/// Separator between elements of an encoded list
pub const LIST_SEPARATOR: char = ',';

/// Comma-join a list. The empty list encodes to `None` (absent column).
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let joined = items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    Some(joined)
}

/// Split an encoded column back into its elements, verbatim (no trimming).
/// Absent and empty scalars both decode to the empty list.
pub fn decode_list(scalar: Option<&str>) -> Vec<String> {
    match scalar {
        None | Some("") => Vec::new(),
        Some(s) => s.split(LIST_SEPARATOR).map(str::to_string).collect(),
    }
}
