//! IPFS HTTP API client.
//!
//! Every capability is a `POST /api/v0/<endpoint>` with query arguments.
//! Content is streamed to `add` as a single-part `multipart/form-data` body
//! so large images are never buffered in memory.
//!
//! Control calls are bounded by the configured timeout end to end. Uploads
//! only bound connection setup: a multi-gigabyte image may legitimately take
//! longer than any fixed request deadline.

use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use serde::Deserialize;

use nixipfs_core::{ContentHash, PublishedName, RemotePath};

use crate::backend::{Backend, Content};
use crate::error::BackendError;

/// Default API address of a local IPFS node.
pub const DEFAULT_API: &str = "127.0.0.1:5001";

const UPLOAD_KEEPALIVE: Duration = Duration::from_secs(60);

/// Blocking client for one IPFS node.
#[derive(Debug, Clone)]
pub struct IpfsHttpBackend {
    base_url: String,
    client: Client,
    upload_client: Client,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct StatResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

impl IpfsHttpBackend {
    /// `api` is either a bare `host:port` or a full `http(s)://` URL.
    ///
    /// `timeout` bounds connecting and every non-upload request.
    pub fn new(api: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| transport("client", &e))?;
        let upload_client = Client::builder()
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .tcp_keepalive(UPLOAD_KEEPALIVE)
            .build()
            .map_err(|e| transport("client", &e))?;
        Ok(Self {
            base_url: base_url(api),
            client,
            upload_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v0/{endpoint}", self.base_url)
    }

    fn call(&self, endpoint: &str, args: &[(&str, &str)]) -> Result<Response, BackendError> {
        tracing::debug!("POST {endpoint} {args:?}");
        let response = self
            .client
            .post(self.url(endpoint))
            .query(args)
            .send()
            .map_err(|e| transport(endpoint, &e))?;
        check_status(endpoint, response)
    }
}

impl Backend for IpfsHttpBackend {
    fn add(&self, name: &str, content: Content) -> Result<ContentHash, BackendError> {
        let endpoint = "add";
        let part = multipart::Part::reader(content).file_name(name.to_string());
        let form = multipart::Form::new().part("file", part);

        tracing::debug!("POST {endpoint} {name}");
        let response = self
            .upload_client
            .post(self.url(endpoint))
            .query(&[("pin", "false"), ("raw-leaves", "true"), ("quieter", "true")])
            .multipart(form)
            .send()
            .map_err(|e| transport(endpoint, &e))?;
        let parsed: AddResponse = decode(endpoint, check_status(endpoint, response)?)?;
        Ok(ContentHash::from(parsed.hash))
    }

    fn mkdir(&self, path: &RemotePath, parents: bool) -> Result<(), BackendError> {
        self.call(
            "files/mkdir",
            &[("arg", path.as_str()), ("parents", bool_arg(parents))],
        )?;
        Ok(())
    }

    fn copy(
        &self,
        source: &ContentHash,
        dest: &RemotePath,
        overwrite: bool,
    ) -> Result<(), BackendError> {
        let source = source.ipfs_path();
        self.call(
            "files/cp",
            &[
                ("arg", source.as_str()),
                ("arg", dest.as_str()),
                ("force", bool_arg(overwrite)),
            ],
        )?;
        Ok(())
    }

    fn stat(&self, path: &RemotePath) -> Result<ContentHash, BackendError> {
        let endpoint = "files/stat";
        let response = self.call(endpoint, &[("arg", path.as_str())])?;
        let parsed: StatResponse = decode(endpoint, response)?;
        Ok(ContentHash::from(parsed.hash))
    }

    fn flush(&self, path: &RemotePath) -> Result<(), BackendError> {
        self.call("files/flush", &[("arg", path.as_str())])?;
        Ok(())
    }

    fn pin(&self, hash: &ContentHash) -> Result<(), BackendError> {
        self.call("pin/add", &[("arg", hash.as_str())])?;
        Ok(())
    }

    fn publish(&self, hash: &ContentHash) -> Result<PublishedName, BackendError> {
        let endpoint = "name/publish";
        let target = hash.ipfs_path();
        let response = self.call(endpoint, &[("arg", target.as_str())])?;
        let parsed: PublishResponse = decode(endpoint, response)?;
        Ok(PublishedName {
            name: parsed.name,
            value: parsed.value,
        })
    }
}

/// Normalise the `--ipfsapi` value into a URL without a trailing `/`.
pub(crate) fn base_url(api: &str) -> String {
    let api = api.trim().trim_end_matches('/');
    if api.starts_with("http://") || api.starts_with("https://") {
        api.to_string()
    } else {
        format!("http://{api}")
    }
}

fn bool_arg(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let fallback = status.canonical_reason().unwrap_or("unknown status").to_string();
    let message = response
        .text()
        .ok()
        .and_then(|body| serde_json::from_str::<ApiErrorBody>(&body).ok())
        .map(|body| body.message)
        .unwrap_or(fallback);
    Err(BackendError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, BackendError> {
    let body = response.bytes().map_err(|e| transport(endpoint, &e))?;
    serde_json::from_slice(&body).map_err(|source| BackendError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// `reqwest` errors only display their outermost layer; keep the causes.
fn transport(endpoint: &str, err: &reqwest::Error) -> BackendError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    BackendError::Transport {
        endpoint: endpoint.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_port_gets_http_scheme() {
        assert_eq!(base_url("127.0.0.1:5001"), "http://127.0.0.1:5001");
        assert_eq!(base_url("https://ipfs.example/"), "https://ipfs.example");
        assert_eq!(base_url(" localhost:5001 "), "http://localhost:5001");
    }

    #[test]
    fn endpoints_live_under_api_v0() {
        let backend = IpfsHttpBackend::new(DEFAULT_API, Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("files/stat"), "http://127.0.0.1:5001/api/v0/files/stat");
    }
}
