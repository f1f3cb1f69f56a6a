/// Drop a leading `N:` group number from a header key (`2:Z scale` -> `Z scale`)
pub fn strip_group(key: &str) -> &str {
    match key.split_once(':') {
        Some((group, name)) if !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => key,
    }
}

/// Remove one pair of surrounding double quotes, if present
pub fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Decode Latin-1 bytes; every byte maps to the code point of the same value
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
