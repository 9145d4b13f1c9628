use serde_json::Value;

/// Shape of a non-2xx response body, decided once when the body is read
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// JSON object carrying an `error` field
    Remote(String),
    /// Anything else, kept verbatim
    Other(String),
}

impl ErrorBody {
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(mut object)) => match object.remove("error") {
                Some(Value::String(message)) => ErrorBody::Remote(message),
                Some(other) => ErrorBody::Remote(other.to_string()),
                None => ErrorBody::Other(raw.to_string()),
            },
            _ => ErrorBody::Other(raw.to_string()),
        }
    }
}

/// Error reported by the search service itself, e.g.
/// `StringIndexOutOfBoundsException[String index out of range: 0]`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub exception_name: String,
    pub exception_details: Option<String>,
}

impl RemoteError {
    pub fn parse(message: impl Into<String>) -> Self {
        let message = message.into();
        let (exception_name, exception_details) = match split_exception(&message) {
            Some((name, details)) => (name.to_string(), Some(details.to_string())),
            None => (message.clone(), None),
        };

        Self {
            message,
            exception_name,
            exception_details,
        }
    }
}

/// Finds the first `Name[details]` in `message`. Details run to the last `]`.
fn split_exception(message: &str) -> Option<(&str, &str)> {
    let close = message.rfind(']')?;

    for (open, _) in message.match_indices('[') {
        if open + 1 >= close {
            break;
        }

        let name_start = message[..open]
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
            .last()
            .map(|(i, _)| i);

        if let Some(start) = name_start {
            return Some((&message[start..open], &message[open + 1..close]));
        }
    }

    None
}
