/// Key layout for the fjall partitions
///
/// - `tasks` / `custom_requests`: doc:{id} -> document fields (JSON object)
/// - `preferences`: pref:{key} -> value (UTF-8)

const DOC_PREFIX: &str = "doc:";
const PREF_PREFIX: &str = "pref:";

/// Encode a document key: doc:{id}
pub fn encode_doc_key(id: &str) -> Vec<u8> {
    format!("{DOC_PREFIX}{id}").into_bytes()
}

/// Prefix covering every document in a partition
pub fn doc_prefix() -> &'static [u8] {
    DOC_PREFIX.as_bytes()
}

/// Decode a document key: doc:{id} -> id
pub fn decode_doc_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str
        .strip_prefix(DOC_PREFIX)
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// Encode a preference key: pref:{key}
pub fn encode_pref_key(key: &str) -> Vec<u8> {
    format!("{PREF_PREFIX}{key}").into_bytes()
}
