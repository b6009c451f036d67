// Serde helpers for model fields that may come from the API in multiple formats.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// Deserializes an identifier that the backend may send as either a JSON string or a number.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = StringOrNumber::deserialize(deserializer)?;
    let id = value.into_string();
    if id.trim().is_empty() {
        return Err(serde::de::Error::custom("identifier must not be empty"));
    }
    Ok(id)
}

/// Deserializes an optional value that may be a string or a number into its display string.
pub fn deserialize_loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(value.map(StringOrNumber::into_string).filter(|s| !s.trim().is_empty()))
}

/// Deserializes an optional value whose shape varies between records. A value that
/// does not fit `T` becomes `None` instead of failing the enclosing record.
pub fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
