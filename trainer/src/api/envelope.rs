//! Response envelope.
//!
//! Every reply is a JSON array whose first object carries `status`. Domain
//! failures are reported here, never through the transport status.
use serde_json::{Map, Value, json};

pub const SUCCESS: &str = "SUCCESS";
pub const ERROR: &str = "ERROR";

/// Wraps `payload` in a success envelope.
///
/// A list payload gets the status merged into its first object and an object
/// payload gets it merged in directly. Anything else lands under `data`.
pub fn success(payload: Option<Value>) -> Value {
    match payload {
        None => json!([{ "status": SUCCESS }]),
        Some(Value::Array(items)) if items.is_empty() => json!([{ "status": SUCCESS }]),
        Some(Value::Array(mut items)) => match items.first_mut() {
            Some(Value::Object(first)) => {
                merge_status(first);
                Value::Array(items)
            }
            _ => json!([{ "status": SUCCESS, "data": items }]),
        },
        Some(Value::Object(mut obj)) => {
            merge_status(&mut obj);
            Value::Array(vec![Value::Object(obj)])
        }
        Some(other) => json!([{ "status": SUCCESS, "data": other }]),
    }
}

pub fn error(message: impl AsRef<str>) -> Value {
    json!([{ "status": ERROR, "message": message.as_ref() }])
}

fn merge_status(obj: &mut Map<String, Value>) {
    obj.insert("status".into(), Value::from(SUCCESS));
}
