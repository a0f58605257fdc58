use std::fmt::Display;

use serde_json::Value as Json;
use thiserror::Error;

/// Error envelope returned by the Katapult API
///
/// The body of a failed request looks like:
/// `{"error": {"code": "...", "description": "...", "detail": ...}}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericApiError {
    pub code: String,
    pub description: String,
    pub detail: String,
}

impl GenericApiError {
    /// Parse an API error from a response body
    ///
    /// Returns `None` if the body is not JSON or if `error.code` is missing or empty.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let json: Json = serde_json::from_slice(body).ok()?;
        let error = json.get("error")?;

        let code = error.get("code")?.as_str()?;
        if code.is_empty() {
            return None;
        }

        let description = error
            .get("description")
            .and_then(Json::as_str)
            .unwrap_or_default();

        Some(Self {
            code: code.to_owned(),
            description: description.to_owned(),
            detail: error.get("detail").map(render_detail).unwrap_or_default(),
        })
    }
}

fn render_scalar(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_detail(detail: &Json) -> String {
    match detail {
        Json::Array(values) => values
            .iter()
            .map(render_scalar)
            .collect::<Vec<_>>()
            .join(", "),
        Json::Object(fields) => {
            let mut pairs = fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, render_scalar(v)))
                .collect::<Vec<_>>();
            pairs.sort();
            pairs.join(", ")
        }
        other => render_scalar(other),
    }
}

impl Display for GenericApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)?;
        if !self.description.is_empty() {
            write!(f, ": {}", self.description)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for GenericApiError {}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(GenericApiError),

    #[error("object is in trash: {error}")]
    InTrash {
        error: GenericApiError,
        trash_object_id: Option<String>,
    },

    #[error("{0}")]
    Api(GenericApiError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response (status {status}): {body}")]
    Unexpected { status: u16, body: String },

    #[error("invalid response: no `{0}` object in the body")]
    MissingField(String),

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Classify a failed response
    ///
    /// Falls back to [`ApiError::Unexpected`] when the body cannot be parsed.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let Some(error) = GenericApiError::parse(body) else {
            if status == 404 {
                return Self::NotFound(GenericApiError {
                    code: String::from("not_found"),
                    ..Default::default()
                });
            }
            return Self::Unexpected {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            };
        };

        if error.code == "object_in_trash" {
            return Self::InTrash {
                trash_object_id: trash_object_id(body),
                error,
            };
        }
        if status == 404 || error.code.ends_with("_not_found") || error.code == "not_found" {
            return Self::NotFound(error);
        }
        Self::Api(error)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Code of the API error, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NotFound(error) | Self::Api(error) | Self::InTrash { error, .. } => {
                Some(&error.code)
            }
            _ => None,
        }
    }
}

/// Turn a not-found error into `None`
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

fn trash_object_id(body: &[u8]) -> Option<String> {
    let json: Json = serde_json::from_slice(body).ok()?;
    json.pointer("/error/detail/trash_object/id")?
        .as_str()
        .map(str::to_owned)
}
