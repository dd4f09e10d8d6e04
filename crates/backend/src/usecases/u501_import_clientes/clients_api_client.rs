use async_trait::async_trait;
use contracts::domain::a001_cliente::{ClienteCreado, ClienteCreate, ConflictoDuplicado};
use contracts::usecases::common::UseCaseError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::shared::config::ClientsApiConfig;

const CLIENTES_PATH: &str = "/api/v1/clientes";
const CEDULAS_EXISTENTES_PATH: &str = "/api/v1/clientes/cedulas-existentes";

/// Ошибки API клиентов
#[derive(Debug, Error)]
pub enum ClientsApiError {
    /// 409: клиент с такой cédula уже существует
    #[error("Duplicate client: cedula {}", .0.cliente_existente.cedula)]
    Duplicate(Box<ConflictoDuplicado>),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientsApiError {
    /// API отверг учётные данные сервиса (401/403)
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ClientsApiError::Http { status: 401 | 403, .. })
    }
}

impl From<ClientsApiError> for UseCaseError {
    fn from(err: ClientsApiError) -> Self {
        match err {
            ClientsApiError::Duplicate(conflicto) => UseCaseError::conflict(format!(
                "Ya existe un cliente con la cédula {}",
                conflicto.cliente_existente.cedula
            )),
            other => UseCaseError::external("El API de clientes no respondió correctamente")
                .with_details(other.to_string()),
        }
    }
}

/// Внешний REST API клиентов (бэкенд RAPICREDIT)
#[async_trait]
pub trait ClientsApi: Send + Sync {
    async fn create_client(&self, payload: &ClienteCreate) -> Result<ClienteCreado, ClientsApiError>;

    /// Возвращает те cédulas из списка, что уже есть в базе
    async fn existing_cedulas(&self, cedulas: &[String]) -> Result<Vec<String>, ClientsApiError>;
}

#[derive(Debug, Serialize)]
struct CedulasRequest<'a> {
    cedulas: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CedulasResponse {
    #[serde(default)]
    existentes: Vec<String>,
}

/// HTTP-клиент API клиентов
pub struct HttpClientsApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClientsApi {
    pub fn new(config: &ClientsApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let token = config.token.trim();
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: (!token.is_empty()).then(|| token.to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(self.url(path))
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ClientsApi for HttpClientsApi {
    async fn create_client(&self, payload: &ClienteCreate) -> Result<ClienteCreado, ClientsApiError> {
        let url = self.url(CLIENTES_PATH);
        tracing::debug!("Clients API: POST {} (cedula='{}')", url, payload.cedula);

        let response = self
            .post(CLIENTES_PATH)
            .json(payload)
            .send()
            .await
            .map_err(|e| ClientsApiError::Network(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ConflictoDuplicado>(&body) {
                Ok(conflict) => ClientsApiError::Duplicate(Box::new(conflict)),
                Err(_) => ClientsApiError::Http {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Clients API: HTTP {} for {}: {}", status, url, body);
            return Err(ClientsApiError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<ClienteCreado>()
            .await
            .map_err(|e| ClientsApiError::Decode(e.to_string()))
    }

    async fn existing_cedulas(&self, cedulas: &[String]) -> Result<Vec<String>, ClientsApiError> {
        if cedulas.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(CEDULAS_EXISTENTES_PATH);
        tracing::debug!("Clients API: POST {} ({} cedulas)", url, cedulas.len());

        let response = self
            .post(CEDULAS_EXISTENTES_PATH)
            .json(&CedulasRequest { cedulas })
            .send()
            .await
            .map_err(|e| ClientsApiError::Network(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientsApiError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: CedulasResponse = response
            .json()
            .await
            .map_err(|e| ClientsApiError::Decode(e.to_string()))?;
        Ok(parsed.existentes)
    }
}
