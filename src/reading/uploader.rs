//! Relays the pending reading to the backend.
//!
//! One call to [`Uploader::upload_pending`] makes at most one POST.  The
//! reading is dropped whatever the result: a failed upload is logged and
//! never retried.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};

use crate::app::ports::{ClockPort, HttpPort, PostRequest};
use crate::config::StationConfig;
use crate::error::NetworkError;

use super::slot::ReadingSlot;

/// `Authorization` header value for HTTP basic auth.
pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

/// Result of one upload pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Nothing pending.
    Idle,
    /// A reading is pending but the network is down; it stays pending.
    Offline,
    /// The backend answered with this status.
    Sent(u16),
    /// The request never completed; the reading was dropped.
    Failed(NetworkError),
}

pub struct Uploader<H, K> {
    http: H,
    clock: K,
}

impl<H: HttpPort, K: ClockPort> Uploader<H, K> {
    pub fn new(http: H, clock: K) -> Self {
        Self { http, clock }
    }

    /// Upload the pending reading, if any, provided `connected` is true.
    pub fn upload_pending(
        &mut self,
        slot: &ReadingSlot,
        config: &StationConfig,
        connected: bool,
    ) -> UploadOutcome {
        if !slot.has_data() {
            return UploadOutcome::Idle;
        }
        if !connected {
            return UploadOutcome::Offline;
        }
        // Another worker holds the slot.
        let Some(claim) = slot.begin_upload() else {
            return UploadOutcome::Idle;
        };

        if !config.has_backend() {
            warn!("Upload: no endpoint configured, reading dropped");
            return UploadOutcome::Failed(NetworkError::NoEndpoint);
        }

        let body = claim.reading().to_body(self.clock.epoch_secs());
        let authorization = basic_auth(&config.user_email, &config.user_pass);
        let request = PostRequest { url: &config.api_url, authorization: &authorization, body: &body };
        info!("Upload: POST {} ({} bytes)", config.api_url, body.len());

        match self.http.post_json(&request) {
            Ok(status) => {
                if (200..300).contains(&status) {
                    info!("Upload: {} -> HTTP {}", body, status);
                } else {
                    warn!("Upload: {} -> HTTP {} (not retried)", body, status);
                }
                UploadOutcome::Sent(status)
            }
            Err(e) => {
                warn!("Upload: {} failed: {}", body, e);
                UploadOutcome::Failed(e)
            }
        }
    }

    pub fn http(&self) -> &H {
        &self.http
    }
}
