//! Outbound dialing through the Twilio REST API

use crate::config::TwilioCredentials;
use crate::runtime::traits::{CallHandle, CallPlacer, OutboundCall};
use crate::services::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Creates calls whose media is handled by the configured webhook
pub struct TwilioCallPlacer {
    client: Client,
    credentials: TwilioCredentials,
    api_base: String,
}

impl TwilioCallPlacer {
    pub fn new(credentials: TwilioCredentials) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::telephony(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point at a different API host (regional edge, local stub)
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base, self.credentials.account_sid
        )
    }

    /// Webhook URL with the room (and any extra pairs) in its query
    fn webhook_for(&self, room: Option<&str>, extra: &[(&str, &str)]) -> Result<String, ServiceError> {
        let mut url = Url::parse(&self.credentials.webhook_url).map_err(|e| {
            ServiceError::telephony(format!(
                "Invalid webhook URL {}: {e}",
                self.credentials.webhook_url
            ))
        })?;
        if room.is_some() || !extra.is_empty() {
            let mut query = url.query_pairs_mut();
            if let Some(room) = room {
                query.append_pair("room", room);
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    fn call_form(&self, call: &OutboundCall) -> Result<Vec<(&'static str, String)>, ServiceError> {
        let from = call
            .source
            .clone()
            .unwrap_or_else(|| self.credentials.from_number.clone());
        let room = call.room.as_deref();

        let mut form = vec![
            ("To", call.destination.clone()),
            ("From", from),
            ("Url", self.webhook_for(room, &[])?),
            ("Record", call.record.to_string()),
        ];
        if call.record {
            form.push(("RecordingChannels", "dual".to_string()));
            if room.is_some() {
                // The webhook stores the finished audio under the room's name
                form.push((
                    "RecordingStatusCallback",
                    self.webhook_for(room, &[("event", "recording")])?,
                ));
                form.push(("RecordingStatusCallbackEvent", "completed".to_string()));
            }
        }
        Ok(form)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedCall {
    sid: String,
    status: String,
}

#[async_trait]
impl CallPlacer for TwilioCallPlacer {
    async fn place_call(&self, call: &OutboundCall) -> Result<CallHandle, ServiceError> {
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&self.call_form(call)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::telephony(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    ServiceError::telephony(format!("Connection failed: {e}"))
                } else {
                    ServiceError::telephony(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::telephony(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ServiceError::telephony(format!(
                "Call creation rejected ({status}): {body}"
            )));
        }

        let created: CreatedCall = serde_json::from_str(&body)
            .map_err(|e| ServiceError::telephony(format!("Failed to parse response: {e}")))?;

        tracing::info!(call_sid = %created.sid, status = %created.status, "Outbound call created");
        Ok(CallHandle {
            call_id: created.sid,
            room: call.room.clone(),
            status: created.status,
        })
    }
}
