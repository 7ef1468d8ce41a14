use crate::errors::EndpointError;
use async_trait::async_trait;
use http::Method;
use hyper::body::Bytes;
use hyper::header::AUTHORIZATION;
use hyper::{Request, Response};
use serde_json::Value;

/// One server-side function.
///
/// The router answers CORS pre-flights and rejects other methods before
/// `handle` is called, so implementations only see their own method.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Route name, e.g. `opravo-status`.
    fn name(&self) -> &'static str;

    fn method(&self) -> Method;

    async fn handle(&self, request: Request<Bytes>) -> Response<Bytes>;
}

/// Parses a JSON request body. An empty body reads as `{}` so that missing
/// fields surface as validation errors naming the field.
pub fn parse_json_body(body: &Bytes) -> Result<Value, EndpointError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
        .map_err(|e| EndpointError::Validation(format!("Invalid JSON body: {e}")))
}

/// Returns the non-empty string at `pointer`, or a validation error naming
/// `field`. Numbers are accepted and rendered as strings.
pub fn required_str(payload: &Value, pointer: &str, field: &str) -> Result<String, EndpointError> {
    match payload.pointer(pointer) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(EndpointError::Validation(format!(
            "Missing required field: {field}"
        ))),
    }
}

/// Extracts the caller's access token from `Authorization: Bearer <token>`.
pub fn bearer_token<B>(request: &Request<B>) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_body() {
        assert_eq!(parse_json_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(parse_json_body(&Bytes::from(" \n")).unwrap(), json!({}));
        assert_eq!(
            parse_json_body(&Bytes::from(r#"{"a":1}"#)).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            parse_json_body(&Bytes::from("{oops")),
            Err(EndpointError::Validation(_))
        ));
    }

    #[test]
    fn test_required_str() {
        let payload = json!({"sender": "", "record": {"id": 42, "user_id": "u1"}});
        assert_eq!(
            required_str(&payload, "/record/user_id", "record.user_id").unwrap(),
            "u1"
        );
        assert_eq!(required_str(&payload, "/record/id", "record.id").unwrap(), "42");

        let err = required_str(&payload, "/sender", "sender").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: sender");
        assert!(required_str(&payload, "/content", "content").is_err());
    }

    #[test]
    fn test_bearer_token() {
        let request = |value: &str| {
            Request::builder()
                .header(AUTHORIZATION, value)
                .body(())
                .unwrap()
        };
        assert_eq!(bearer_token(&request("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&request("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&request("Basic abc")), None);
        assert_eq!(bearer_token(&request("Bearer ")), None);
        assert_eq!(bearer_token(&Request::new(())), None);
    }
}
