use std::path::Path;

use async_trait::async_trait;
use inspectsync_core::{EntityId, RemoteRecord};
use inspectsync_engine::{
    EngineError, ListQuery, Page, RemoteClient, Submission, SubmitReceipt, TransportError,
    UploadPart,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::RemoteConfig;
use crate::response;

/// Longest slice of an error body carried into a [`TransportError`].
const MAX_ERROR_BODY: usize = 512;

/// [`RemoteClient`] over the store's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    config: RemoteConfig,
    http: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| TransportError::InvalidResponse(format!("base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidResponse("base url cannot carry paths".into()))?
            .pop_if_empty()
            .extend(segments.iter().flat_map(|s| s.split('/')).filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))
    }

    async fn json_body(response: Response) -> Result<Value, TransportError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Unreachable(format!("read body failed: {e}")))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let message: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::InvalidResponse(format!("body is not json: {e}")))
    }

    async fn upload_part(upload: &UploadPart) -> Result<Part, TransportError> {
        let path = local_path(&upload.uri);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::Asset {
                uri: upload.uri.clone(),
                message: e.to_string(),
            })?;
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| upload.part_name.clone());
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type(path))
            .map_err(|e| TransportError::Asset {
                uri: upload.uri.clone(),
                message: e.to_string(),
            })
    }

    async fn multipart(submission: &Submission) -> Result<Form, TransportError> {
        let report = serde_json::to_string(&submission.report)
            .map_err(|e| TransportError::InvalidResponse(format!("report encode: {e}")))?;
        let deleted = serde_json::to_string(&submission.deleted_assets)
            .map_err(|e| TransportError::InvalidResponse(format!("deleted assets encode: {e}")))?;
        let mut form = Form::new()
            .text("report", report)
            .text("deletedAssets", deleted)
            .text("submissionId", submission.submission_id.to_string());
        for upload in &submission.uploads {
            let part = Self::upload_part(upload).await?;
            form = form.part(upload.part_name.clone(), part);
        }
        Ok(form)
    }
}

/// Filesystem path of a device-local URI.
fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("heic") => "image/heic",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    #[instrument(skip(self, query), fields(collection = %query.collection))]
    async fn fetch_page(
        &self,
        query: &ListQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Page, TransportError> {
        let url = self.url(&[&query.collection])?;
        let request = self
            .http
            .get(url)
            .query(&[("limit", limit), ("offset", offset)])
            .query(&query.filters);
        let body = Self::json_body(self.send(request).await?).await?;
        let page = response::parse_page(body)?;
        debug!(items = page.items.len(), total = ?page.total, "page received");
        Ok(page)
    }

    #[instrument(skip(self, entity_id), fields(entity = %entity_id))]
    async fn fetch_record(
        &self,
        entity_id: &EntityId,
    ) -> Result<Option<RemoteRecord>, TransportError> {
        let url = self.url(&[&self.config.detail_path, entity_id.as_str()])?;
        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("no remote record");
            return Ok(None);
        }
        let body = Self::json_body(response).await?;
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(response::parse_record(body)))
    }

    #[instrument(
        skip(self, submission),
        fields(key = %submission.key, submission_id = %submission.submission_id)
    )]
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, TransportError> {
        let url = self.url(&[
            &self.config.submit_path,
            submission.key.entity_id.as_str(),
            submission.key.section.as_str(),
        ])?;
        let form = Self::multipart(submission).await?;
        let response = self.send(self.http.post(url).multipart(form)).await?;
        let body = Self::json_body(response).await?;
        response::parse_receipt(body, submission.record_id.as_ref())
    }
}
