use super::{
    AuditRecord, CatalogKind, DriftToken, FactionSource, FavoriteCategory, GatewayError,
    LivenessSignal, LogEvent, PersistenceGateway, SaveReceipt,
};
use crate::{ConfigValue, statics};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("pda-assist/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct SaveRequest<'a> {
    document: &'a ConfigValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit: Option<&'a AuditRecord>,
}

/// `{ success, hash?, error? }`. A body without `success` counts as accepted.
#[derive(Debug, Default, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl WriteResponse {
    fn into_result(self) -> Result<Option<String>, GatewayError> {
        if self.success == Some(false) {
            return Err(GatewayError::Rejected(
                self.error.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        Ok(self.hash)
    }
}

/// JSON-over-HTTP client for the local backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<WriteResponse, GatewayError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(WriteResponse::default());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

impl PersistenceGateway for HttpGateway {
    async fn load_document(&self) -> Result<ConfigValue, GatewayError> {
        self.get_json(statics::API_DOCUMENT).await
    }

    async fn save_document(
        &self,
        document: ConfigValue,
        audit: Option<AuditRecord>,
    ) -> Result<SaveReceipt, GatewayError> {
        let body = SaveRequest {
            document: &document,
            audit: audit.as_ref(),
        };
        let hash = self
            .post_json(statics::API_DOCUMENT, &body)
            .await?
            .into_result()?;
        Ok(SaveReceipt {
            hash: hash.map(DriftToken),
        })
    }

    async fn load_favorites(
        &self,
        category: FavoriteCategory,
    ) -> Result<serde_json::Value, GatewayError> {
        let path = format!("{}{}", statics::API_FAVORITES_PREFIX, category.path_segment());
        self.get_json(&path).await
    }

    async fn save_favorites(
        &self,
        category: FavoriteCategory,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        let path = format!("{}{}", statics::API_FAVORITES_PREFIX, category.path_segment());
        self.post_json(&path, &payload).await?.into_result()?;
        Ok(())
    }

    async fn load_catalog(&self, kind: CatalogKind) -> Result<serde_json::Value, GatewayError> {
        let path = format!("{}{}", statics::API_CATALOG_PREFIX, kind.path_segment());
        self.get_json(&path).await
    }

    async fn load_factions(
        &self,
        source: FactionSource,
    ) -> Result<serde_json::Value, GatewayError> {
        let path = format!("{}{}", statics::API_FACTIONS_PREFIX, source.path_segment());
        self.get_json(&path).await
    }

    async fn drift_token(&self) -> Result<DriftToken, GatewayError> {
        let payload: serde_json::Value = self.get_json(statics::API_DOCUMENT_HASH).await?;
        DriftToken::from_payload(&payload)
    }

    async fn liveness(&self) -> LivenessSignal {
        match self.get_json::<serde_json::Value>(statics::API_STATUS).await {
            Ok(payload) => LivenessSignal::from_payload(&payload),
            Err(GatewayError::Status { .. }) => LivenessSignal::Idle,
            Err(e) => {
                debug!("liveness probe failed: {}", e);
                LivenessSignal::Unreachable
            }
        }
    }

    async fn log_event(&self, event: LogEvent) -> Result<(), GatewayError> {
        self.post_json(statics::API_LOG, &event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpGateway, WriteResponse};
    use crate::gateway::GatewayError;
    use std::time::Duration;

    #[test]
    fn client_creation_trims_trailing_slash() {
        let gateway = HttpGateway::new("http://127.0.0.1:8765/", Duration::from_secs(1)).unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:8765");
        assert_eq!(gateway.url("/api/status"), "http://127.0.0.1:8765/api/status");
    }

    #[test]
    fn write_response_without_success_counts_as_accepted() {
        let parsed: WriteResponse = serde_json::from_str(r#"{ "hash": "h1" }"#).unwrap();
        assert_eq!(parsed.into_result().unwrap(), Some("h1".to_string()));

        let rejected: WriteResponse =
            serde_json::from_str(r#"{ "success": false, "error": "read-only" }"#).unwrap();
        assert_eq!(
            rejected.into_result(),
            Err(GatewayError::Rejected("read-only".to_string()))
        );
    }
}
