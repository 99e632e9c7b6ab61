// src/evaluator/link.rs — Link detection and live link validation

use async_trait::async_trait;

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;

const TRIM_LEADING: &[char] = &['(', '[', '<', '"', '\''];
const TRIM_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '>', '"', '\''];

/// First URL-like token in `text`: something with a dot inside it, optionally
/// prefixed by a scheme or `www.`. Tokens containing `@` are never links.
pub fn find_link(text: &str) -> Option<&str> {
    text.split_whitespace()
        .filter(|token| !token.contains('@'))
        .map(|token| {
            token
                .trim_start_matches(TRIM_LEADING)
                .trim_end_matches(TRIM_TRAILING)
        })
        .find(|candidate| {
            let host_part = candidate
                .strip_prefix("https://")
                .or_else(|| candidate.strip_prefix("http://"))
                .unwrap_or(candidate);
            let host_part = host_part.strip_prefix("www.").unwrap_or(host_part);
            match host_part.find('.') {
                Some(dot) => dot > 0 && dot + 1 < host_part.len(),
                None => false,
            }
        })
}

/// Absolute URL for `link`, assuming `http://` when no scheme is given.
pub fn standardize_url(link: &str) -> Result<url::Url, url::ParseError> {
    let lower = link.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url::Url::parse(link)
    } else {
        url::Url::parse(&format!("http://{link}"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsLink;

#[async_trait]
impl Evaluator for ContainsLink {
    fn name(&self) -> &str {
        "contains_link"
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        Ok(match find_link(output) {
            Some(link) => EvalResult::pass(format!("Link {link} found in output")),
            None => EvalResult::fail("No link found in output"),
        })
    }
}

/// Finds a link and checks it answers a HEAD request with 200.
///
/// Unreachable hosts and non-200 statuses fail the check. Only a HEAD request
/// that outlives `link_timeout` is reported as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsValidLink;

#[async_trait]
impl Evaluator for ContainsValidLink {
    fn name(&self) -> &str {
        "contains_valid_link"
    }

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let Some(link) = find_link(output) else {
            return Ok(EvalResult::fail("no link found in output"));
        };

        let url = match standardize_url(link) {
            Ok(url) => url,
            Err(e) => {
                return Ok(EvalResult::fail(format!(
                    "link {link} found in output but is not a valid URL: {e}"
                )))
            }
        };

        let request = ctx.http().head(url.clone()).send();
        let response = tokio::time::timeout(ctx.link_timeout, request)
            .await
            .map_err(|_| ProbeError::timeout(format!("HEAD {url}"), ctx.link_timeout))?;

        Ok(match response {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                EvalResult::pass(format!("link {link} found in output and is valid"))
            }
            Ok(resp) => EvalResult::fail(format!(
                "link {link} found in output but is invalid (HTTP {})",
                resp.status().as_u16()
            )),
            Err(e) => {
                tracing::debug!(link, error = %e, "Link check request failed");
                EvalResult::fail(format!(
                    "link {link} found in output but is invalid ({e})"
                ))
            }
        })
    }
}
