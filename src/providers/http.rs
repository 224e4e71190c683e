//! HTTP helpers shared by the JSON-over-HTTPS adapters

use crate::error::ProviderErrorKind;
use reqwest::{Response, StatusCode};

/// Longest slice of an error body kept in `ProviderErrorKind::Http`
const ERROR_BODY_PREVIEW: usize = 512;

/// Read a response body, refusing anything larger than `limit` bytes
pub(crate) async fn read_bounded(
    mut response: Response,
    limit: usize,
) -> Result<String, ProviderErrorKind> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ProviderErrorKind::ResponseTooLarge { limit });
        }
    }

    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
        if body.len() + chunk.len() > limit {
            return Err(ProviderErrorKind::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body).map_err(|_| ProviderErrorKind::MalformedResponse {
        message: "response body is not valid UTF-8".to_string(),
    })
}

/// Turn a non-success status into the matching error kind
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProviderErrorKind {
    match status.as_u16() {
        401 | 403 => ProviderErrorKind::Auth {
            status: status.as_u16(),
        },
        429 => ProviderErrorKind::RateLimited {
            status: status.as_u16(),
        },
        code => ProviderErrorKind::Http {
            status: code,
            body: preview(body),
        },
    }
}

/// Send a prepared request and return the bounded body of a successful response
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    limit: usize,
) -> Result<String, ProviderErrorKind> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    let body = read_bounded(response, limit).await?;

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    Ok(body)
}

pub(crate) fn map_reqwest_error(error: reqwest::Error) -> ProviderErrorKind {
    // reqwest includes the URL, never headers, so the API key cannot leak here
    ProviderErrorKind::Transport {
        message: error.to_string(),
    }
}

fn preview(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
