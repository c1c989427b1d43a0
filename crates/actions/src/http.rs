use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;

use crate::error::{ActionError, ActionResult};
use crate::{ssrf, template, Params};

/// Largest outbound request body.
pub const MAX_REQUEST_BODY: usize = 1 << 20;
/// How much of an error response is read before giving up on the rest.
const ERROR_BODY_READ_LIMIT: usize = 1024;
/// How much of an error response ends up in the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// Build the shared outbound client: no redirects, absolute timeout.
pub fn build_client(timeout: Duration) -> ActionResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()?;
    Ok(client)
}

pub(crate) struct HttpAction<'a> {
    pub url: &'a str,
    pub method: Option<&'a str>,
    pub body: Option<&'a str>,
    pub headers: &'a BTreeMap<String, String>,
}

pub(crate) async fn run(
    client: &reqwest::Client,
    action: HttpAction<'_>,
    params: &Params,
    allow_private_targets: bool,
) -> ActionResult<()> {
    let raw_url = template::expand(action.url, params).map_err(|reason| ActionError::Template {
        field: "URL",
        reason,
    })?;

    let url = if allow_private_targets {
        ssrf::parse_http_url(&raw_url)
    } else {
        ssrf::validate_url(&raw_url).await
    }
    .map_err(ActionError::UrlBlocked)?;

    let body = match action.body.filter(|b| !b.is_empty()) {
        Some(body) => template::expand(body, params).map_err(|reason| ActionError::Template {
            field: "body",
            reason,
        })?,
        None => String::new(),
    };
    if body.len() > MAX_REQUEST_BODY {
        return Err(ActionError::BodyTooLarge {
            size: body.len(),
            max: MAX_REQUEST_BODY,
        });
    }

    let method_name = action
        .method
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("POST")
        .to_ascii_uppercase();
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|_| ActionError::InvalidMethod(method_name.clone()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in action.headers {
        let value = template::expand(value, params).map_err(|reason| ActionError::Template {
            field: "header",
            reason,
        })?;
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ActionError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| ActionError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }

    if !headers.contains_key(CONTENT_TYPE) && looks_like_json(&body) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let mut request = client.request(method.clone(), url.clone()).headers(headers);
    if !body.is_empty() {
        request = request.body(body);
    }

    let mut response = request.send().await?;
    let status = response.status();

    if status.as_u16() >= 400 {
        let mut collected = Vec::new();
        while collected.len() < ERROR_BODY_READ_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => append_capped(&mut collected, &chunk, ERROR_BODY_READ_LIMIT),
                Ok(None) | Err(_) => break,
            }
        }
        collected.truncate(ERROR_BODY_SNIPPET);

        let snippet = String::from_utf8_lossy(&collected).trim().to_string();
        let body = if snippet.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            snippet
        };
        return Err(ActionError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!(
        method = %method,
        host = url.host_str().unwrap_or_default(),
        status = status.as_u16(),
        "HTTP action completed"
    );
    Ok(())
}

/// Append as much of `chunk` as fits under `limit` bytes.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) {
    let room = limit.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
}

fn looks_like_json(body: &str) -> bool {
    matches!(body.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}
