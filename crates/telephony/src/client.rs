//! Carrier REST client (spec.md §4.4 `startOutboundCall`). Built the same
//! way the teacher's provider adapters build authenticated `reqwest`
//! clients (`providers::openai_compat::OpenAiCompatProvider`): one client,
//! one timeout, Basic auth applied per request.

use call_domain::error::{Error, Result};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const STATUS_CALLBACK_EVENTS: &[&str] = &["initiated", "ringing", "answered", "completed"];

pub struct CarrierClient {
    account_sid: String,
    auth_token: String,
    client: reqwest::Client,
}

pub struct CreateCallResult {
    pub carrier_call_id: String,
    pub raw_status: String,
}

impl CarrierClient {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .expect("reqwest client builds with default TLS config");
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            client,
        }
    }

    /// Create an outbound call. `twiml_url` is the call-control document
    /// endpoint; `status_callback_url` receives the carrier's status
    /// callbacks for `STATUS_CALLBACK_EVENTS`.
    pub async fn create_call(
        &self,
        to: &str,
        from: &str,
        twiml_url: &str,
        status_callback_url: &str,
    ) -> Result<CreateCallResult> {
        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Calls.json",
            self.account_sid
        );

        let mut form: Vec<(&str, &str)> = vec![
            ("To", to),
            ("From", from),
            ("Url", twiml_url),
            ("StatusCallback", status_callback_url),
        ];
        for event in STATUS_CALLBACK_EVENTS {
            form.push(("StatusCallbackEvent", event));
        }

        tracing::debug!(url = %url, to = %to, "carrier create-call request");

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::transport(None, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::transport(Some(status.as_u16()), body));
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            Error::parse(format!("non-JSON carrier create-call response: {body}"))
        })?;

        let carrier_call_id = value
            .get("sid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::parse("carrier create-call response missing sid"))?
            .to_string();
        let raw_status = value
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("queued")
            .to_string();

        Ok(CreateCallResult {
            carrier_call_id,
            raw_status,
        })
    }
}
