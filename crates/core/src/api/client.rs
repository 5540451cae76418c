use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use crate::errors::{redact_query, CoreError};
use crate::models::mutation::MutationBody;
use crate::models::settings::Settings;

/// Longest slice of an error response body carried into `CoreError::Api`.
const MAX_ERROR_BODY: usize = 300;

/// Thin typed wrapper over the backend's REST API.
///
/// Owns the HTTP client, the base URL and the bearer token. The token is handed
/// in by the composition root; nothing here reads ambient storage.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

impl RestClient {
    pub fn new(settings: &Settings) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(settings.request_timeout_secs));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: settings.base_url().to_string(),
            auth_token: settings.auth_token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token (e.g. after a re-login).
    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.auth_token = token;
    }

    /// Absolute URL for an API path. Paths are joined with exactly one slash.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request with the auth header already applied.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Attach a mutation body using the encoding its variant dictates.
    pub fn with_body(builder: RequestBuilder, body: MutationBody) -> Result<RequestBuilder, CoreError> {
        match body {
            MutationBody::Json(value) => Ok(builder.json(&value)),
            MutationBody::Multipart { fields, file } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime_type)?;
                Ok(builder.multipart(form.part(file.field_name, part)))
            }
        }
    }

    /// GET a JSON document.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, CoreError> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        let resp = Self::check(resp, path).await?;
        resp.json().await.map_err(|e| {
            CoreError::Deserialization(format!("Failed to parse response from {path}: {}", redact_query(&e.to_string())))
        })
    }

    /// POST/PUT a mutation body and parse the JSON entity the backend echoes back.
    pub async fn send_body<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: MutationBody,
    ) -> Result<R, CoreError> {
        let builder = Self::with_body(self.request(method, path), body)?;
        let resp = Self::check(builder.send().await?, path).await?;
        resp.json().await.map_err(|e| {
            CoreError::Deserialization(format!("Failed to parse response from {path}: {}", redact_query(&e.to_string())))
        })
    }

    pub async fn delete(&self, path: &str) -> Result<(), CoreError> {
        let resp = self.request(Method::DELETE, path).send().await?;
        Self::check(resp, path).await?;
        Ok(())
    }

    /// Turn non-2xx responses into `CoreError::Api`, keeping a bounded excerpt of the body.
    async fn check(resp: Response, endpoint: &str) -> Result<Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.chars().take(MAX_ERROR_BODY).collect()
        };
        Err(CoreError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}
