use std::borrow::Cow;
use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use http::{Method, StatusCode};
use http::header::CONTENT_TYPE;
use keel_core::{ErrorCode, HttpError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Bind path parameters, query string and body into `I`
///
/// Sources are merged in that order, later ones overwriting earlier keys.
/// The query string only counts for `GET`, `DELETE` and `HEAD`. Path, query
/// and form values arrive as strings.
pub(crate) async fn bind<I: DeserializeOwned>(request: Request) -> Result<I, HttpError> {
    let (mut parts, body) = request.into_parts();
    let mut fields = Map::new();

    match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
        Ok(Path(params)) => fields.extend(params.into_iter().map(|(k, v)| (k, Value::String(v)))),
        Err(PathRejection::MissingPathParams(_)) => {}
        Err(rejection) => return Err(HttpError::bad_request(rejection.body_text())),
    }

    if binds_query(&parts.method)
        && let Some(query) = parts.uri.query()
    {
        fields.extend(pairs(url::form_urlencoded::parse(query.as_bytes())));
    }

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type);

    let bytes = Bytes::from_request(Request::from_parts(parts, body), &())
        .await
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                HttpError::overridden(ErrorCode::BadRequest, StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
            } else {
                HttpError::bad_request(rejection.body_text())
            }
        })?;

    if !bytes.is_empty() {
        match parse_body(content_type.as_deref(), &bytes)? {
            Value::Object(body) => fields.extend(body),
            other if fields.is_empty() => return deserialize(other),
            _ => return Err(HttpError::bad_request("request body must be a JSON object")),
        }
    }

    deserialize(Value::Object(fields))
}

fn binds_query(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE || *method == Method::HEAD
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse_body(media_type: Option<&str>, bytes: &[u8]) -> Result<Value, HttpError> {
    match media_type {
        Some(m) if m == "application/json" || m.ends_with("+json") => serde_json::from_slice(bytes)
            .map_err(|e| HttpError::bad_request(format!("invalid JSON body: {e}"))),
        Some("application/x-www-form-urlencoded") => Ok(Value::Object(pairs(url::form_urlencoded::parse(bytes)))),
        Some(other) => Err(HttpError::bad_request(format!("unsupported content type '{other}'"))),
        None => Err(HttpError::bad_request("missing content type")),
    }
}

/// Collect key/value pairs; repeated keys become arrays
fn pairs<'a>(source: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Map<String, Value> {
    let mut map = Map::new();

    for (key, value) in source {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }

    map
}

fn deserialize<I: DeserializeOwned>(value: Value) -> Result<I, HttpError> {
    serde_json::from_value(value).map_err(|e| HttpError::bad_request(e.to_string()))
}
