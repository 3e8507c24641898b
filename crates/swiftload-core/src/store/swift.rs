//! OpenStack Swift client over HTTP.
//!
//! Authentication uses Keystone v2.0 password credentials; the storage URL
//! is the public endpoint of the first `object-store` entry in the service
//! catalog. Every request after that carries the token in `X-Auth-Token`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{bail, eyre, Context, Result};
use futures::StreamExt;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{ObjectBody, ObjectInfo, ObjectStore, StoreConnector};
use crate::checksum::{fingerprints_match, Fingerprinter};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const OBJECT_STORE_SERVICE: &str = "object-store";
const MAX_IDLE_PER_HOST: usize = 2048;

/// Connection settings for a Swift account.
#[derive(Clone)]
pub struct SwiftOptions {
    /// Keystone v2.0 endpoint, e.g. `https://auth.example.com/v2.0`.
    pub auth_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Per-request deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for SwiftOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwiftOptions")
            .field("auth_url", &self.auth_url)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    storage_url: Url,
}

pub struct SwiftStore {
    http: Client,
    options: SwiftOptions,
    session: RwLock<Option<Session>>,
}

impl SwiftStore {
    pub fn new(options: SwiftOptions) -> Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(MAX_IDLE_PER_HOST);
        if options.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            http,
            options,
            session: RwLock::new(None),
        })
    }

    fn session(&self) -> Result<Session> {
        self.session
            .read()
            .clone()
            .ok_or_else(|| eyre!("not authenticated"))
    }

    fn container_url(&self, container: &str) -> Result<(String, Url)> {
        let session = self.session()?;
        let url = storage_path_url(&session.storage_url, container, None)?;
        Ok((session.token, url))
    }

    fn object_url(&self, container: &str, path: &str) -> Result<(String, Url)> {
        let session = self.session()?;
        let url = storage_path_url(&session.storage_url, container, Some(path))?;
        Ok((session.token, url))
    }
}

#[async_trait]
impl ObjectStore for SwiftStore {
    async fn authenticate(&self) -> Result<()> {
        let url = tokens_url(&self.options.auth_url);
        let request = AuthRequest {
            auth: AuthBody {
                tenant_name: &self.options.tenant,
                password_credentials: PasswordCredentials {
                    username: &self.options.username,
                    password: &self.options.password,
                },
            },
        };
        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let resp = expect_success(resp, "authenticate")?;
        let body: AuthResponse = resp
            .json()
            .await
            .context("decode authentication response")?;
        let storage_url = storage_url_from(&body.access)?;
        log::debug!("authenticated; storage url {storage_url}");
        *self.session.write() = Some(Session {
            token: body.access.token.id,
            storage_url,
        });
        Ok(())
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        let (token, url) = self.container_url(container)?;
        let resp = self
            .http
            .put(url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .with_context(|| format!("PUT container {container}"))?;
        expect_success(resp, "create container")?;
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        let (token, url) = self.container_url(container)?;
        let resp = self
            .http
            .delete(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("DELETE container {container}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND => bail!("container '{container}' not found"),
            StatusCode::CONFLICT => bail!("container '{container}' not empty"),
            _ => {}
        }
        expect_success(resp, "delete container")?;
        Ok(())
    }

    async fn stat_object(&self, container: &str, path: &str) -> Result<Option<ObjectInfo>> {
        let (token, url) = self.object_url(container, path)?;
        let resp = self
            .http
            .head(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("HEAD {path}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = expect_success(resp, "stat object")?;
        Ok(Some(object_info_from(resp.headers())?))
    }

    async fn put_object(
        &self,
        container: &str,
        path: &str,
        body: ObjectBody,
        fingerprint: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let (token, url) = self.object_url(container, path)?;
        let mut req = self.http.put(url).header(AUTH_TOKEN_HEADER, token);
        if let Some(fingerprint) = fingerprint {
            req = req.header(ETAG, fingerprint);
        }
        if let Some(content_type) = content_type {
            req = req.header(CONTENT_TYPE, content_type);
        }
        req = match body {
            ObjectBody::Empty => req.header(CONTENT_LENGTH, 0).body(Vec::new()),
            ObjectBody::File(file) => {
                let len = file
                    .metadata()
                    .await
                    .context("stat upload body")?
                    .len();
                req.header(CONTENT_LENGTH, len).body(file)
            }
        };

        let resp = req
            .send()
            .await
            .with_context(|| format!("PUT {path}"))?;
        let resp = expect_success(resp, "put object")?;

        if let Some(expected) = fingerprint {
            let returned = header_str(resp.headers(), ETAG.as_str())
                .map(|v| v.trim_matches('"').to_string())
                .unwrap_or_default();
            if !fingerprints_match(expected, &returned) {
                bail!("object corrupted: sent etag {expected}, store returned '{returned}'");
            }
        }
        Ok(())
    }

    async fn get_object(
        &self,
        container: &str,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let (token, url) = self.object_url(container, path)?;
        let resp = self
            .http
            .get(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        let resp = expect_success(resp, "get object")?;

        // Large-object manifests report an etag over the segment list, not the content.
        let headers = resp.headers();
        let expected = if headers.contains_key("X-Object-Manifest")
            || headers.contains_key("X-Static-Large-Object")
        {
            None
        } else {
            header_str(headers, ETAG.as_str()).map(|v| v.trim_matches('"').to_string())
        };

        let mut hasher = Fingerprinter::new();
        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("read body of {path}"))?;
            hasher.update(&chunk);
            dest.write_all(&chunk)
                .await
                .with_context(|| format!("write download of {path}"))?;
            written += chunk.len() as u64;
        }
        dest.flush().await.context("flush download")?;

        if let Some(expected) = expected {
            let actual = hasher.finish();
            if !fingerprints_match(&expected, &actual) {
                bail!("object corrupted: etag {expected}, received content hashes to {actual}");
            }
        }
        Ok(written)
    }

    async fn delete_object(&self, container: &str, path: &str) -> Result<()> {
        let (token, url) = self.object_url(container, path)?;
        let resp = self
            .http
            .delete(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            bail!("object '{path}' not found");
        }
        expect_success(resp, "delete object")?;
        Ok(())
    }
}

/// Builds a new [`SwiftStore`] (and so a new session) per batch.
#[derive(Debug, Clone)]
pub struct SwiftConnector {
    options: SwiftOptions,
}

impl SwiftConnector {
    pub fn new(options: SwiftOptions) -> Self {
        Self { options }
    }
}

impl StoreConnector for SwiftConnector {
    fn connect(&self) -> Result<Arc<dyn ObjectStore>> {
        let store = SwiftStore::new(self.options.clone())?;
        Ok(Arc::new(store))
    }
}

fn expect_success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    log::debug!("{what}: unexpected status {status} from {}", resp.url());
    bail!("{what} failed: HTTP {status}")
}

fn tokens_url(auth_url: &str) -> String {
    format!("{}/tokens", auth_url.trim_end_matches('/'))
}

/// `storage_url/container[/object/path]` with each segment percent-encoded.
fn storage_path_url(storage_url: &Url, container: &str, object: Option<&str>) -> Result<Url> {
    let mut url = storage_url.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| eyre!("storage URL cannot hold a path: {storage_url}"))?;
        segments.pop_if_empty().push(container);
        if let Some(object) = object {
            segments.extend(object.split('/'));
        }
    }
    Ok(url)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn object_info_from(headers: &HeaderMap) -> Result<ObjectInfo> {
    let size = header_str(headers, CONTENT_LENGTH.as_str())
        .map(|v| v.parse::<u64>())
        .transpose()
        .context("invalid Content-Length")?
        .unwrap_or(0);
    Ok(ObjectInfo {
        content_type: header_str(headers, CONTENT_TYPE.as_str())
            .unwrap_or_default()
            .to_string(),
        fingerprint: header_str(headers, ETAG.as_str())
            .unwrap_or_default()
            .trim_matches('"')
            .to_string(),
        size,
    })
}

fn storage_url_from(access: &Access) -> Result<Url> {
    let endpoint = access
        .service_catalog
        .iter()
        .filter(|entry| entry.kind == OBJECT_STORE_SERVICE)
        .flat_map(|entry| entry.endpoints.iter())
        .next()
        .ok_or_else(|| eyre!("service catalog has no {OBJECT_STORE_SERVICE} endpoint"))?;
    Url::parse(&endpoint.public_url)
        .with_context(|| format!("invalid storage URL '{}'", endpoint.public_url))
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody<'a> {
    tenant_name: &'a str,
    password_credentials: PasswordCredentials<'a>,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Access {
    token: Token,
    #[serde(default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct Token {
    id: String,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}
