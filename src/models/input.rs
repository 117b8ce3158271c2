//! Lenient deserializers for request bodies and query strings.
//!
//! Clients send ids either as JSON numbers or as strings (`"12"`), and query
//! strings always carry them as text. Empty or whitespace-only strings are read
//! as absent so that the `required` rules report them.

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

/// Reads an optional id given as a number or a numeric string.
pub fn optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Int(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid id `{}`", text)))
        }
    }
}

/// Reads an optional string, trimming it and mapping blanks to `None`.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
