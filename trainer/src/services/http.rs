use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ContentService, InstantiationService, ServiceError};

const STATUS_SUCCESS: &str = "SUCCESS";

/// Form-POST client shared by both service implementations.
#[derive(Clone)]
pub struct FormClient {
    http: Client,
    url: String,
}

impl FormClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }

    async fn post(&self, params: &[(&str, &str)]) -> Result<String, ServiceError> {
        let resp = self
            .http
            .post(&self.url)
            .form(params)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.text().await?)
    }
}

/// Status and payload of a `[{"status": ..., "activity_id" | "message": ...}]`
/// reply. When the array holds several objects the last one wins.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ServerReply {
    pub status: Option<String>,
    pub info: Option<String>,
}

impl ServerReply {
    pub fn parse(body: &str) -> Result<Self, ServiceError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let items = value
            .as_array()
            .ok_or_else(|| ServiceError::InvalidResponse("reply is not a JSON array".into()))?;

        let mut reply = ServerReply::default();
        for item in items {
            reply.status = item.get("status").and_then(scalar);
            if let Some(info) = item
                .get("activity_id")
                .or_else(|| item.get("message"))
                .and_then(scalar)
            {
                reply.info = Some(info);
            }
        }
        Ok(reply)
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESS)
    }

    /// Payload of a successful reply, or `Rejected` carrying the payload.
    pub fn into_success(self) -> Result<Option<String>, ServiceError> {
        if self.is_success() {
            Ok(self.info)
        } else {
            Err(ServiceError::Rejected(self.info.unwrap_or_else(|| {
                format!("status {}", self.status.as_deref().unwrap_or("missing"))
            })))
        }
    }
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct HttpContentService {
    client: FormClient,
}

impl HttpContentService {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: FormClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    #[instrument(skip(self, content), target = "content_service", level = "debug")]
    async fn upload(
        &self,
        user: &str,
        content: &str,
        range_id: &str,
    ) -> Result<String, ServiceError> {
        let body = self
            .client
            .post(&[
                ("user", user),
                ("action", "upload_content"),
                ("description_file", content),
                ("range_id", range_id),
            ])
            .await?;

        let activity_id = ServerReply::parse(&body)?
            .into_success()?
            .ok_or_else(|| ServiceError::InvalidResponse("upload reply has no activity_id".into()))?;

        debug!(%activity_id, "content uploaded");
        Ok(activity_id)
    }

    #[instrument(skip(self), target = "content_service", level = "debug")]
    async fn remove(
        &self,
        user: &str,
        range_id: &str,
        activity_id: &str,
    ) -> Result<(), ServiceError> {
        let body = self
            .client
            .post(&[
                ("user", user),
                ("action", "remove_content"),
                ("range_id", range_id),
                ("activity_id", activity_id),
            ])
            .await?;

        // The content server's removal reply is not always well-formed JSON.
        if body.contains(STATUS_SUCCESS) {
            Ok(())
        } else {
            Err(ServiceError::Rejected(body))
        }
    }
}

pub struct HttpInstantiationService {
    client: FormClient,
}

impl HttpInstantiationService {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: FormClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl InstantiationService for HttpInstantiationService {
    #[instrument(skip(self, range_doc), target = "instantiation_service", level = "debug")]
    async fn instantiate(
        &self,
        user: &str,
        range_doc: &str,
        range_id: &str,
        progression: Option<&str>,
    ) -> Result<String, ServiceError> {
        let mut params = vec![
            ("user", user),
            ("action", "instantiate_range"),
            ("description_file", range_doc),
            ("range_id", range_id),
        ];
        if let Some(p) = progression {
            params.push(("progression_scenario", p));
        }

        let body = self.client.post(&params).await?;
        Ok(ServerReply::parse(&body)?.into_success()?.unwrap_or_default())
    }

    #[instrument(skip(self), target = "instantiation_service", level = "debug")]
    async fn destroy(&self, user: &str, range_id: &str) -> Result<(), ServiceError> {
        let body = self
            .client
            .post(&[
                ("user", user),
                ("action", "destroy_range"),
                ("range_id", range_id),
            ])
            .await?;

        ServerReply::parse(&body)?.into_success().map(|_| ())
    }

    #[instrument(skip(self), target = "instantiation_service", level = "debug")]
    async fn creation_log(&self, user: &str, range_id: &str) -> Result<String, ServiceError> {
        self.client
            .post(&[
                ("user", user),
                ("action", "get_cr_creation_log"),
                ("range_id", range_id),
            ])
            .await
    }
}
