use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {source}")]
    Payload {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct FolderListing {
    #[serde(default)]
    folders: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(default)]
    files: Vec<String>,
}

pub trait ImageSource {
    fn fetch_image(&self, remote_path: &str) -> Result<Vec<u8>, RemoteError>;
}

pub struct DeviceClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl DeviceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::Client)?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_folders(&self) -> Result<Vec<String>, RemoteError> {
        let url = format!("{}/files", self.base_url);
        let listing: FolderListing = self.get(&url, &[])?.json().map_err(|source| {
            RemoteError::Payload {
                url: url.clone(),
                source,
            }
        })?;
        Ok(listing.folders)
    }

    pub fn list_files(&self, folder: &str) -> Result<Vec<String>, RemoteError> {
        let url = format!("{}/files", self.base_url);
        let listing: FileListing = self
            .get(&url, &[("dir", folder)])?
            .json()
            .map_err(|source| RemoteError::Payload {
                url: url.clone(),
                source,
            })?;
        Ok(listing.files)
    }

    pub fn download(&self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/download", self.base_url);
        let body = self
            .get(&url, &[("file", remote_path)])?
            .bytes()
            .map_err(|source| RemoteError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(body.to_vec())
    }

    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::blocking::Response, RemoteError> {
        log::debug!("GET {} {:?}", url, query);
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(|source| RemoteError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

impl ImageSource for DeviceClient {
    fn fetch_image(&self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        self.download(remote_path)
    }
}
