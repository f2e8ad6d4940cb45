// Wire-format codec for controller request and response bodies.
//
// The controller negotiates a single content type per handler (JSON by
// default, XML nominally). Responses are patched and decoded here;
// decode never fails -- a body that does not parse is handed back to
// the caller as raw text.

use serde_json::{Map, Value};

/// The one naming drift the controller ships with: it reports the
/// external-router attribute with an underscore where the orchestration
/// layer expects a colon. Applied as a literal substring replacement to
/// every inbound payload, even where it would touch unrelated text.
const ROUTER_EXTERNAL_PATCH: (&str, &str) = ("router_external", "router:external");

/// HTTP 204; the body (if any) is passed through undecoded.
const NO_CONTENT: u16 = 204;

/// Wire format for request and response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Xml,
}

impl Format {
    /// The `Content-Type` header value for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }
}

/// A decoded response body.
///
/// Decoding degrades rather than fails: callers receive either the
/// parsed JSON value or the raw (patched) text and must tolerate both.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    /// The payload as a JSON object, if it decoded to one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Look up a top-level attribute, if the payload is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

/// Encode an attribute mapping for transmission.
///
/// Only JSON has an encoder; the XML mode is accepted at the type level
/// for controllers that negotiate it, but no serializer is carried.
pub fn encode(attrs: &Map<String, Value>, format: Format) -> Result<String, crate::Error> {
    match format {
        Format::Json => serde_json::to_string(&Value::Object(attrs.clone()))
            .map_err(|e| crate::Error::Serialize(e.to_string())),
        Format::Xml => Err(crate::Error::UnsupportedFormat("xml")),
    }
}

/// Decode a response body received with the given HTTP status.
///
/// The `router_external` patch is applied unconditionally before
/// anything else. A 204 returns the patched text as-is; otherwise the
/// text is parsed as JSON, falling back to raw on any parse failure
/// (which is also the path every XML body takes).
pub fn decode(raw: &str, status: u16, format: Format) -> Payload {
    let patched = raw.replace(ROUTER_EXTERNAL_PATCH.0, ROUTER_EXTERNAL_PATCH.1);

    if status == NO_CONTENT {
        return Payload::Raw(patched);
    }

    match format {
        Format::Json => match serde_json::from_str::<Value>(&patched) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(patched),
        },
        Format::Xml => Payload::Raw(patched),
    }
}
