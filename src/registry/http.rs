use super::error::{RegistryError, Result};
use super::models::{Artifact, Contents, Page, RegistryResource};
use super::Registry;
use crate::config::RegistrySettings;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE},
    Client, Response,
};
use serde_json::Value;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Registry client speaking the service's HTTP/JSON interface.
pub struct HttpRegistry {
    pub base_url: String,
    pub client: Client,
}

impl HttpRegistry {
    pub fn new(settings: &RegistrySettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = settings.token.as_deref().filter(|t| !t.is_empty()) {
            let hv = HeaderValue::from_str(&format!("Bearer {}", token))?;
            headers.insert(AUTHORIZATION, hv);
        }
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert(API_KEY_HEADER, HeaderValue::from_str(key)?);
        }

        let client = Client::builder().default_headers(headers).build()?;
        Ok(HttpRegistry {
            base_url: base_url(&settings.address, settings.insecure),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }
}

fn base_url(address: &str, insecure: bool) -> String {
    let address = address.trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else if insecure {
        format!("http://{address}")
    } else {
        format!("https://{address}")
    }
}

/// Builds a typed error from a Google-style (`{"error": {...}}`) or
/// gateway-style (`{"code": .., "message": ..}`) error body.
fn error_from_body(status: u16, body: &str) -> RegistryError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed
        .as_ref()
        .map(|v| v.get("error").unwrap_or(v))
        .cloned()
        .unwrap_or(Value::Null);
    let message = detail
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    match detail.get("status").and_then(Value::as_str) {
        Some("NOT_FOUND") => RegistryError::NotFound(message),
        Some("ALREADY_EXISTS") => RegistryError::AlreadyExists(message),
        Some("INVALID_ARGUMENT") => RegistryError::InvalidArgument(message),
        Some("FAILED_PRECONDITION") => RegistryError::FailedPrecondition(message),
        _ => RegistryError::from_status(status, message),
    }
}

fn collection_path<T: RegistryResource>(parent: &str) -> String {
    if parent.is_empty() {
        T::KIND.collection().to_string()
    } else {
        format!("{}/{}", parent, T::KIND.collection())
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn list_page<T: RegistryResource>(
        &self,
        parent: &str,
        filter: &str,
        page_size: i32,
        page_token: &str,
    ) -> Result<Page<T>> {
        let url = self.url(&collection_path::<T>(parent));
        tracing::debug!("GET {} filter={:?} page_token={:?}", url, filter, page_token);

        let mut query: Vec<(&str, String)> = Vec::new();
        if !filter.is_empty() {
            query.push(("filter", filter.to_string()));
        }
        if page_size > 0 {
            query.push(("pageSize", page_size.to_string()));
        }
        if !page_token.is_empty() {
            query.push(("pageToken", page_token.to_string()));
        }

        let resp = Self::check(self.client.get(&url).query(&query).send().await?).await?;
        let mut body: Value = resp.json().await?;
        let items = match body.get_mut(T::LIST_FIELD).map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(list) => serde_json::from_value(list)?,
        };
        let next_page_token = body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Page {
            items,
            next_page_token,
        })
    }

    async fn get<T: RegistryResource>(&self, name: &str) -> Result<T> {
        let url = self.url(name);
        tracing::debug!("GET {}", url);
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn create<T: RegistryResource>(&self, parent: &str, id: &str, resource: &T) -> Result<T> {
        let url = self.url(&collection_path::<T>(parent));
        tracing::debug!("POST {} {}={}", url, T::ID_PARAM, id);
        let resp = self
            .client
            .post(&url)
            .query(&[(T::ID_PARAM, id)])
            .json(resource)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn update<T: RegistryResource>(
        &self,
        resource: &T,
        mask: &[&str],
        allow_missing: bool,
    ) -> Result<T> {
        let url = self.url(resource.name());
        tracing::debug!("PATCH {} mask={:?}", url, mask);
        let mut query: Vec<(&str, String)> = Vec::new();
        if !mask.is_empty() {
            query.push(("updateMask", mask.join(",")));
        }
        if allow_missing {
            query.push(("allowMissing", "true".to_string()));
        }
        let resp = self
            .client
            .patch(&url)
            .query(&query)
            .json(resource)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn delete(&self, name: &str, force: bool) -> Result<()> {
        let url = self.url(name);
        tracing::debug!("DELETE {} force={}", url, force);
        let mut req = self.client.delete(&url);
        if force {
            req = req.query(&[("force", "true")]);
        }
        Self::check(req.send().await?).await?;
        Ok(())
    }

    async fn get_contents(&self, name: &str, accept_gzip: bool) -> Result<Contents> {
        let url = self.url(&format!("{name}:getContents"));
        tracing::debug!("GET {} accept_gzip={}", url, accept_gzip);
        let mut req = self.client.get(&url);
        if accept_gzip {
            req = req.header(ACCEPT_ENCODING, "gzip");
        }
        let resp = Self::check(req.send().await?).await?;
        let mime_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let data = resp.bytes().await?;
        Ok(Contents { mime_type, data })
    }

    async fn replace_artifact(&self, artifact: &Artifact) -> Result<Artifact> {
        let url = self.url(&artifact.name);
        tracing::debug!("PUT {}", url);
        let resp = self.client.put(&url).json(artifact).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}
