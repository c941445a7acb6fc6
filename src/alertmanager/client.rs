use std::fmt::Write as FmtWrite;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};
use url::Url;

use crate::Result;
use crate::error::AlertmanagerError;
use crate::http::{CORRELATION_HEADER, body_preview, correlation_id, json_client};

use super::models::{SilenceId, SilenceRequest, SilenceResponse};

/// Talks to any number of Alertmanager instances; the base URL is chosen per
/// call from the alert's profile. Calls are not retried.
#[derive(Clone)]
pub struct AlertmanagerClient {
    http: reqwest::Client,
}

impl AlertmanagerClient {
    /// # Errors
    ///
    /// Returns [`AlertmanagerError::Client`] when the HTTP client cannot be
    /// built.
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http = json_client(HeaderMap::new(), timeout, connect_timeout)
            .map_err(|source| AlertmanagerError::Client { source })?;
        Ok(Self { http })
    }

    /// Create a silence and return the id Alertmanager assigned to it.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on any status other than 200/201 and on a
    /// response without a `silenceID`.
    pub async fn create_silence(&self, base: &Url, silence: &SilenceRequest) -> Result<SilenceId> {
        let url = endpoint(base, &["api", "v2", "silences"])?;
        let correlation_id = correlation_id();
        let started = Instant::now();
        debug!(
            %url,
            %correlation_id,
            matchers = silence.matchers.len(),
            "creating silence"
        );

        let response = self
            .http
            .post(url.clone())
            .header(CORRELATION_HEADER, &correlation_id)
            .json(silence)
            .send()
            .await
            .map_err(AlertmanagerError::from)?;
        let status = response.status();
        let body = response.bytes().await.map_err(AlertmanagerError::from)?;

        if status != StatusCode::OK && status != StatusCode::CREATED {
            warn!(%url, %correlation_id, %status, "silence creation rejected");
            return Err(AlertmanagerError::HttpStatus {
                status,
                body: body_preview(&body),
            }
            .into());
        }

        let parsed: SilenceResponse = serde_json::from_slice(&body).map_err(|err| {
            let mut message = format!("error decoding silence response: {err}; body preview: ");
            let _ = FmtWrite::write_str(&mut message, &body_preview(&body));
            AlertmanagerError::Json { message }
        })?;

        info!(
            silence_id = %parsed.silence_id,
            %correlation_id,
            latency_ms = started.elapsed().as_millis(),
            "silence created"
        );
        Ok(parsed.silence_id)
    }

    /// Expire a silence ahead of its end time.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and on any non-success status, including
    /// 404 for an unknown silence.
    pub async fn expire_silence(&self, base: &Url, silence_id: &str) -> Result<()> {
        let url = endpoint(base, &["api", "v2", "silence", silence_id])?;
        let correlation_id = correlation_id();

        let response = self
            .http
            .delete(url.clone())
            .header(CORRELATION_HEADER, &correlation_id)
            .send()
            .await
            .map_err(AlertmanagerError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            warn!(%url, %correlation_id, %status, "silence expiry rejected");
            return Err(AlertmanagerError::HttpStatus {
                status,
                body: body_preview(&body),
            }
            .into());
        }

        info!(silence_id, %correlation_id, "silence expired");
        Ok(())
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AlertmanagerError::Url {
            url: base.to_string(),
            message: "URL cannot be used as a base".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::endpoint;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let base = match Url::parse("http://am:9093/prefix") {
            Ok(url) => url,
            Err(err) => panic!("{err}"),
        };
        let url = endpoint(&base, &["api", "v2", "silence", "a/b"]).map(|u| u.to_string());
        assert_eq!(
            url.ok().as_deref(),
            Some("http://am:9093/prefix/api/v2/silence/a%2Fb")
        );

        let root = match Url::parse("http://am:9093") {
            Ok(url) => url,
            Err(err) => panic!("{err}"),
        };
        let url = endpoint(&root, &["api", "v2", "silences"]).map(|u| u.to_string());
        assert_eq!(url.ok().as_deref(), Some("http://am:9093/api/v2/silences"));
    }
}
