use serde_json::Value;

use crate::error::GENERIC_ERROR_MESSAGE;

const MESSAGE_FIELDS: [&str; 3] = ["message", "error", "detail"];
const MAX_PLAIN_TEXT_LEN: usize = 200;

/// Best-effort human message from a failed response body.
///
/// Looks for a `message`, `error` or `detail` string in a JSON object, then a
/// bare JSON string, then a short plain-text body. HTML error pages and empty
/// bodies fall back to a generic message.
#[must_use]
pub fn extract_message(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return GENERIC_ERROR_MESSAGE.into();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => MESSAGE_FIELDS
            .iter()
            .filter_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|text| !text.is_empty())
            .map_or_else(|| GENERIC_ERROR_MESSAGE.into(), str::to_owned),
        Ok(Value::String(text)) if !text.trim().is_empty() => text.trim().to_owned(),
        Ok(_) => GENERIC_ERROR_MESSAGE.into(),
        Err(_) if body.starts_with('<') || body.len() > MAX_PLAIN_TEXT_LEN => {
            GENERIC_ERROR_MESSAGE.into()
        }
        Err(_) => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_message_field_wins() {
        assert_eq!(
            extract_message(r#"{"message":"Course not found","error":"Not Found"}"#),
            "Course not found"
        );
    }

    #[test]
    fn falls_through_to_error_field() {
        assert_eq!(
            extract_message(r#"{"message":"  ","error":"Email already registered"}"#),
            "Email already registered"
        );
    }

    #[test]
    fn plain_text_body_is_used() {
        assert_eq!(extract_message("Invalid credentials\n"), "Invalid credentials");
    }

    #[test]
    fn html_and_empty_bodies_fall_back() {
        assert_eq!(
            extract_message("<html><body>Bad Gateway</body></html>"),
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(extract_message(""), GENERIC_ERROR_MESSAGE);
        assert_eq!(extract_message(r#"{"status":500}"#), GENERIC_ERROR_MESSAGE);
        assert_eq!(extract_message("[1,2]"), GENERIC_ERROR_MESSAGE);
    }
}
