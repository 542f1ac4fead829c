//! Backend API client.
//!
//! Three calls, all scoped by the patient's nss:
//! - `GET  /alarmas/{nss}` -- active dose list
//! - `POST /alarmas/apagar` -- multipart proof upload
//! - `POST /registrar-token` -- push token registration

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::dose::{DoseId, Session};
use crate::error::{ConfigError, CoreError, TransportError};
use crate::storage::ApiConfig;

/// Proof upload for one dose.
#[derive(Debug, Clone)]
pub struct AcknowledgeRequest {
    pub dose_id: DoseId,
    pub nss: String,
    pub file_name: String,
    /// JPEG bytes.
    pub image: Vec<u8>,
}

/// The remote source of truth for doses.
#[async_trait]
pub trait DoseBackend: Send + Sync {
    /// Raw dose records for the session. Decoding happens in the sync layer
    /// so one bad record cannot fail the whole list.
    async fn fetch_doses(
        &self,
        session: &Session,
    ) -> Result<Vec<serde_json::Value>, TransportError>;

    /// Upload proof. Returns the HTTP status; the caller decides what counts
    /// as acceptance.
    async fn acknowledge(&self, request: AcknowledgeRequest) -> Result<u16, TransportError>;

    /// Register a push token for the session.
    async fn register_token(&self, session: &Session, token: &str) -> Result<(), TransportError>;
}

/// `reqwest` implementation of [`DoseBackend`].
///
/// Every request is bounded by the configured timeout; a request that runs
/// past it fails with [`TransportError::Timeout`].
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "api.base_url".into(),
            message: e.to_string(),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(TransportError::from)?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Decode(format!("bad endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl DoseBackend for HttpBackend {
    async fn fetch_doses(
        &self,
        session: &Session,
    ) -> Result<Vec<serde_json::Value>, TransportError> {
        let url = self.endpoint(&format!("alarmas/{}", urlencoding::encode(&session.nss)))?;
        tracing::debug!(%url, "fetching doses");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match resp.json::<serde_json::Value>().await? {
            serde_json::Value::Array(records) => Ok(records),
            other => Err(TransportError::Decode(format!(
                "expected a JSON array of doses, got {}",
                json_kind(&other)
            ))),
        }
    }

    async fn acknowledge(&self, request: AcknowledgeRequest) -> Result<u16, TransportError> {
        let url = self.endpoint("alarmas/apagar")?;
        let image = Part::bytes(request.image)
            .file_name(request.file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("imagen", image)
            .text("id", request.dose_id.to_string())
            .text("usuario_nss", request.nss);

        let resp = self.client.post(url).multipart(form).send().await?;
        let status = resp.status().as_u16();
        tracing::debug!(dose_id = request.dose_id, status, "proof upload answered");
        Ok(status)
    }

    async fn register_token(&self, session: &Session, token: &str) -> Result<(), TransportError> {
        let url = self.endpoint("registrar-token")?;
        let resp = self
            .client
            .post(url)
            .json(&json!({ "nss": session.nss, "token_expo": token }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
