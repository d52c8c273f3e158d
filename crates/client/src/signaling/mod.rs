//! HTTP signaling: a single offer/answer exchange with the pipeline server
//!
//! The client gathers all ICE candidates first (non-trickling), then POSTs
//! the complete local description together with the opaque pipeline
//! descriptor to `{base_url}/offer`. The response carries the remote answer.
//! There is no retry and no renegotiation; every failure is terminal for the
//! current connection attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::pipeline::PipelineSpec;
use crate::{Error, Result};

/// Fixed path the offer is POSTed to, relative to the configured base URL
pub const OFFER_PATH: &str = "/offer";

/// Request body: `{"offer": {"sdp", "type": "offer"}, "prompt": <opaque>}`
#[derive(Debug, Serialize)]
struct OfferRequest<'a> {
    offer: OfferPayload<'a>,
    prompt: &'a PipelineSpec,
}

#[derive(Debug, Serialize)]
struct OfferPayload<'a> {
    sdp: &'a str,
    #[serde(rename = "type")]
    typ: &'static str,
}

/// Response body: at least `{"sdp": <string>}`, ideally with `"type": "answer"`
#[derive(Debug, Deserialize)]
struct AnswerResponse {
    sdp: String,
    #[serde(rename = "type", default)]
    typ: Option<String>,
}

/// Blocking-style signaling client over one HTTP POST
pub struct SignalingClient {
    base_url: String,
    http: reqwest::Client,
}

impl SignalingClient {
    /// Create a client for the given base URL with a bounded round-trip wait
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Signaling(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, http })
    }

    /// Send the local offer and pipeline descriptor; return the remote answer
    ///
    /// Failure modes, each surfaced as [`Error::Signaling`]: connection
    /// refused or timeout, non-200 status, empty or unparseable body,
    /// missing or empty `sdp` field. No partial state is left behind.
    pub async fn exchange(
        &self,
        offer_sdp: &str,
        pipeline: &PipelineSpec,
    ) -> Result<RTCSessionDescription> {
        let url = format!("{}{}", self.base_url, OFFER_PATH);
        let request = OfferRequest {
            offer: OfferPayload {
                sdp: offer_sdp,
                typ: "offer",
            },
            prompt: pipeline,
        };

        debug!("POST {} ({} byte offer)", url, offer_sdp.len());

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Signaling(format!("Offer POST to {} failed: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Signaling(format!(
                "Server returned {} for {}",
                status, url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Signaling(format!("Failed to read answer body: {}", e)))?;
        if body.is_empty() {
            return Err(Error::Signaling("Empty answer body from server".to_string()));
        }

        let answer: AnswerResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Signaling(format!("Unparseable answer body: {}", e)))?;
        if answer.sdp.is_empty() {
            return Err(Error::Signaling("Answer is missing SDP".to_string()));
        }
        if let Some(typ) = &answer.typ {
            if typ != "answer" {
                warn!("Server tagged its description '{}', expected 'answer'", typ);
            }
        }

        info!("Received SDP answer ({} bytes)", answer.sdp.len());
        debug!("Answer SDP:\n{}", answer.sdp);

        RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| Error::Signaling(format!("Invalid answer SDP: {}", e)))
    }

    /// The configured base URL (normalized, no trailing slash)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_offer_request_shape() {
        let pipeline = PipelineSpec::new(json!({"1": {"class_type": "Blur"}}));
        let request = OfferRequest {
            offer: OfferPayload {
                sdp: "v=0\r\n",
                typ: "offer",
            },
            prompt: &pipeline,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["offer"]["sdp"], "v=0\r\n");
        assert_eq!(value["offer"]["type"], "offer");
        // The descriptor must pass through unmodified.
        assert_eq!(value["prompt"], *pipeline.as_value());
    }

    #[test]
    fn test_answer_response_tolerates_missing_type() {
        let answer: AnswerResponse = serde_json::from_str(r#"{"sdp": "v=0\r\n"}"#).unwrap();
        assert_eq!(answer.sdp, "v=0\r\n");
        assert!(answer.typ.is_none());
    }

    #[test]
    fn test_answer_response_requires_sdp() {
        assert!(serde_json::from_str::<AnswerResponse>(r#"{"type": "answer"}"#).is_err());
    }

    #[test]
    fn test_base_url_normalization() {
        let client = SignalingClient::new("http://host:8888/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://host:8888");
    }
}
