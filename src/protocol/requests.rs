//! Request shapes
//!
//! Every path argument is optional at the wire level so that a missing one is
//! reported by the path resolver as `invalid_input`, the same as an empty one.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::storage::ContentEncoding;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameQuery {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct CopyQuery {
    pub src: Option<String>,
    pub dest: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChmodQuery {
    pub path: Option<String>,
    pub mode: Option<String>,
}

/// Body of a write. A missing `content` writes an empty file.
#[derive(Debug, Default, Deserialize)]
pub struct WriteBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

#[derive(Debug, Deserialize)]
pub struct CompressRequest {
    #[serde(default)]
    pub sources: Vec<String>,
    pub destination: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct DecompressRequest {
    pub source: Option<String>,
    pub destination: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

/// Accepts a urlencoded form (the classic `content=` field) or a JSON body.
/// A request without a content type carries no content.
#[axum::async_trait]
impl<S> FromRequest<S> for WriteBody
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type {
            None => Ok(WriteBody::default()),
            Some(kind) if kind.starts_with("application/json") => {
                let Json(body) = Json::<WriteBody>::from_request(req, state).await?;
                Ok(body)
            }
            Some(_) => {
                let Form(body) = Form::<WriteBody>::from_request(req, state).await?;
                Ok(body)
            }
        }
    }
}
