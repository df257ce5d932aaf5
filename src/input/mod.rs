//! Input normalization
//!
//! Every accepted input shape is reduced to one [`FlatMap`] before binding:
//! - `form`: URL-encoded query strings and bodies
//! - `xml`: XML documents
//!
//! | input | handling |
//! |---|---|
//! | request, `GET` | query string, first value per key |
//! | request, `application/json` | body must be a JSON object |
//! | request, `text/xml` / `application/xml` | children of the root element |
//! | request, anything else | form body (if urlencoded) then query, first value per key |
//! | `FlatMap` | passed through |
//! | `HashMap<String, String>` | each value wrapped as a string |
//! | `HashMap<String, Vec<String>>` | first value per key |
//! | JSON object | members converted to values |

mod form;
mod xml;

use std::collections::HashMap;

use http::Method;
use tracing::debug;

use crate::error::{DecodeError, ParseError};
use crate::request::RequestView;
use crate::value::{FlatMap, Value};

pub use form::{parse_form, parse_query};
pub use xml::parse_xml;

const CONTENT_JSON: &str = "application/json";
const CONTENT_XML: &str = "application/xml";
const CONTENT_TEXT_XML: &str = "text/xml";
const CONTENT_FORM: &str = "application/x-www-form-urlencoded";

/// Anything a decode call accepts.
#[derive(Debug)]
pub enum Input<'a> {
    Request(RequestView<'a>),
    Map(FlatMap),
    Strings(HashMap<String, String>),
    Multi(HashMap<String, Vec<String>>),
    Json(serde_json::Value),
}

impl Input<'_> {
    /// Short description used in logs and errors.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Input::Request(_) => "request",
            Input::Map(_) => "value map",
            Input::Strings(_) => "string map",
            Input::Multi(_) => "multi-value map",
            Input::Json(_) => "JSON value",
        }
    }

    /// Reduce to a flat map.
    ///
    /// Parse failures of a request body abort the call.
    pub fn normalize(self) -> Result<FlatMap, DecodeError> {
        debug!(input = self.shape_name(), "normalizing input");
        match self {
            Input::Request(req) => normalize_request(&req),
            Input::Map(map) => Ok(map),
            Input::Strings(map) => Ok(map.into_iter().map(|(k, v)| (k, Value::Str(v))).collect()),
            Input::Multi(map) => Ok(first_values(map)),
            Input::Json(serde_json::Value::Object(obj)) => Ok(obj
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect()),
            Input::Json(other) => Err(DecodeError::UnsupportedInput {
                shape: format!("JSON {}", json_type(&other)),
            }),
        }
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// First value per key; a key with no values maps to an empty string.
fn first_values(map: HashMap<String, Vec<String>>) -> FlatMap {
    map.into_iter()
        .map(|(k, vals)| {
            let first = vals.into_iter().next().unwrap_or_default();
            (k, Value::Str(first))
        })
        .collect()
}

/// Collapse ordered pairs, keeping the first occurrence of each key.
fn first_wins(pairs: impl IntoIterator<Item = (String, String)>, into: &mut FlatMap) {
    for (k, v) in pairs {
        into.entry(k).or_insert(Value::Str(v));
    }
}

fn normalize_request(req: &RequestView<'_>) -> Result<FlatMap, DecodeError> {
    let mut data = FlatMap::new();

    if *req.method == Method::GET {
        first_wins(parse_query(req.query()), &mut data);
        return Ok(data);
    }

    let content_type = req.content_type();
    match content_type {
        CONTENT_JSON => {
            let obj: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(req.body).map_err(ParseError::Json)?;
            data.extend(obj.into_iter().map(|(k, v)| (k, Value::from_json(v))));
        }
        CONTENT_TEXT_XML | CONTENT_XML => {
            data = parse_xml(req.body)?;
        }
        _ => {
            if reads_form_body(req.method) && media_type(content_type) == CONTENT_FORM {
                let body = std::str::from_utf8(req.body)
                    .map_err(|e| ParseError::Form(format!("body is not UTF-8: {e}")))?;
                first_wins(parse_form(body)?, &mut data);
            }
            first_wins(parse_form(req.query())?, &mut data);
        }
    }

    Ok(data)
}

/// Only these methods carry a form body.
fn reads_form_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// `application/x-www-form-urlencoded; charset=utf-8` → `application/x-www-form-urlencoded`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl From<FlatMap> for Input<'_> {
    fn from(map: FlatMap) -> Self {
        Input::Map(map)
    }
}

impl From<HashMap<String, String>> for Input<'_> {
    fn from(map: HashMap<String, String>) -> Self {
        Input::Strings(map)
    }
}

impl From<HashMap<String, Vec<String>>> for Input<'_> {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        Input::Multi(map)
    }
}

impl From<serde_json::Value> for Input<'_> {
    fn from(json: serde_json::Value) -> Self {
        Input::Json(json)
    }
}

impl<'a> From<RequestView<'a>> for Input<'a> {
    fn from(req: RequestView<'a>) -> Self {
        Input::Request(req)
    }
}

impl<'a, B: AsRef<[u8]>> From<&'a http::Request<B>> for Input<'a> {
    fn from(req: &'a http::Request<B>) -> Self {
        Input::Request(RequestView::from(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::Request;
    use serde_json::json;

    fn str_val(map: &FlatMap, key: &str) -> Option<String> {
        map.get(key).and_then(Value::as_str).map(str::to_string)
    }

    #[test]
    fn map_passes_through() {
        let mut map = FlatMap::new();
        map.insert("Age".into(), Value::Int(3));
        let out = Input::from(map.clone()).normalize().unwrap();
        assert_eq!(out, map);
    }

    #[test]
    fn string_map_is_wrapped() {
        let map = HashMap::from([("user".to_string(), "bob".to_string())]);
        let out = Input::from(map).normalize().unwrap();
        assert_eq!(out["user"], Value::from("bob"));
    }

    #[test]
    fn multi_map_keeps_first_value() {
        let map = HashMap::from([
            ("tag".to_string(), vec!["a".to_string(), "b".to_string()]),
            ("none".to_string(), vec![]),
        ]);
        let out = Input::from(map).normalize().unwrap();
        assert_eq!(str_val(&out, "tag").as_deref(), Some("a"));
        assert_eq!(str_val(&out, "none").as_deref(), Some(""));
    }

    #[test]
    fn json_object_is_flattened() {
        let out = Input::from(json!({"user": "bob", "age": 7, "tags": [1]}))
            .normalize()
            .unwrap();
        assert_eq!(out["user"], Value::from("bob"));
        assert_eq!(out["age"], Value::Int64(7));
        assert_eq!(out["tags"], Value::List(vec![Value::Int64(1)]));
    }

    #[test]
    fn json_non_object_is_unsupported() {
        let err = Input::from(json!([1, 2])).normalize().unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedInput { .. }));
        assert_eq!(err.to_string(), "invalid input: JSON array");
    }

    #[test]
    fn get_request_uses_query() {
        let req = Request::get("/login?user=bob&password=b0b&user=eve")
            .body(Vec::<u8>::new())
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert_eq!(str_val(&out, "user").as_deref(), Some("bob"));
        assert_eq!(str_val(&out, "password").as_deref(), Some("b0b"));
    }

    #[test]
    fn get_request_ignores_body_and_bad_escapes() {
        let req = Request::get("/?a=%zz&b=2")
            .header(CONTENT_TYPE, CONTENT_JSON)
            .body(r#"{"b": 3}"#)
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert_eq!(str_val(&out, "b").as_deref(), Some("2"));
        assert!(out.contains_key("a"));
    }

    #[test]
    fn post_json_body() {
        let req = Request::post("/")
            .header(CONTENT_TYPE, CONTENT_JSON)
            .body(r#"{"user":"bob", "password": "b0b"}"#)
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert_eq!(str_val(&out, "password").as_deref(), Some("b0b"));
    }

    #[test]
    fn post_malformed_json_is_parse_failure() {
        let req = Request::post("/")
            .header(CONTENT_TYPE, CONTENT_JSON)
            .body("{\"user\":")
            .unwrap();
        let err = Input::from(&req).normalize().unwrap_err();
        assert!(matches!(err, DecodeError::Parse(ParseError::Json(_))));
    }

    #[test]
    fn post_json_array_body_is_parse_failure() {
        let req = Request::post("/")
            .header(CONTENT_TYPE, CONTENT_JSON)
            .body("[1]")
            .unwrap();
        let err = Input::from(&req).normalize().unwrap_err();
        assert!(matches!(err, DecodeError::Parse(ParseError::Json(_))));
    }

    #[test]
    fn post_xml_body() {
        for ct in [CONTENT_XML, CONTENT_TEXT_XML] {
            let req = Request::post("/")
                .header(CONTENT_TYPE, ct)
                .body("<form><user>bob</user><password>b0b</password></form>")
                .unwrap();
            let out = Input::from(&req).normalize().unwrap();
            assert_eq!(str_val(&out, "user").as_deref(), Some("bob"), "{ct}");
        }
    }

    #[test]
    fn content_type_match_is_exact() {
        // parameters make it fall through to the form path
        let req = Request::post("/?user=q")
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(r#"{"user":"bob"}"#)
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert_eq!(str_val(&out, "user").as_deref(), Some("q"));
    }

    #[test]
    fn post_form_body_wins_over_query() {
        let req = Request::post("/?user=query&extra=1")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
            .body("user=body&password=b%30b")
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert_eq!(str_val(&out, "user").as_deref(), Some("body"));
        assert_eq!(str_val(&out, "password").as_deref(), Some("b0b"));
        assert_eq!(str_val(&out, "extra").as_deref(), Some("1"));
    }

    #[test]
    fn post_other_content_type_reads_only_query() {
        let req = Request::post("/?a=1")
            .header(CONTENT_TYPE, "text/plain")
            .body("b=2")
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert!(out.contains_key("a"));
        assert!(!out.contains_key("b"));
    }

    #[test]
    fn delete_does_not_read_form_body() {
        let req = Request::delete("/")
            .header(CONTENT_TYPE, CONTENT_FORM)
            .body("a=1")
            .unwrap();
        let out = Input::from(&req).normalize().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn post_bad_form_body_is_parse_failure() {
        let req = Request::post("/")
            .header(CONTENT_TYPE, CONTENT_FORM)
            .body("a=%zz")
            .unwrap();
        let err = Input::from(&req).normalize().unwrap_err();
        assert!(matches!(err, DecodeError::Parse(ParseError::Form(_))));
    }

    #[test]
    fn post_non_utf8_form_body_is_parse_failure() {
        let req = Request::post("/")
            .header(CONTENT_TYPE, CONTENT_FORM)
            .body(vec![b'a', b'=', 0xff])
            .unwrap();
        let err = Input::from(&req).normalize().unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn media_type_strips_parameters() {
        assert_eq!(media_type("Application/X-WWW-Form-Urlencoded ; charset=x"), CONTENT_FORM);
        assert_eq!(media_type(""), "");
    }
}
