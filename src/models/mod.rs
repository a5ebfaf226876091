pub mod api_key;
pub mod github;
pub mod job;
pub mod module;
pub mod rating;
pub mod release;

/// Decodes a JSON list column, treating an empty string as an empty list.
pub(crate) fn decode_list<T: serde::de::DeserializeOwned>(
    raw: &str,
    column: &str,
) -> anyhow::Result<Vec<T>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Corrupt JSON in column {column}: {e}"))
}

pub(crate) fn encode_list<T: serde::Serialize>(items: &[T]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(items)?)
}
