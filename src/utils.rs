use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn value_to_clean_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

/// ExifTool prints a list tag with one entry as a plain value and numeric
/// entries as numbers. This accepts all of them as a list of strings.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match helper {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_to_clean_string).collect(),
        Some(other) => vec![value_to_clean_string(&other)],
    })
}
