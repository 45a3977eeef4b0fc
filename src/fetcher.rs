use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::AuthToken;
use crate::error::PackagesError;
use crate::fs_util::unpack_tar_gz_stream;

/// Downloads one archive and unpacks it into a staging directory.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(
        &self,
        archive_url: &str,
        token: Option<&AuthToken>,
        destination: &Path,
    ) -> Result<(), PackagesError>;
}

#[derive(Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new() -> Result<Self, PackagesError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent())
                .map_err(|err| PackagesError::InvalidHeader(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| PackagesError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        archive_url: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PackagesError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(PackagesError::HttpStatus {
            status: response.status().as_u16(),
            url: archive_url.to_string(),
        })
    }
}

pub fn user_agent() -> String {
    format!("git-packages/{}", env!("CARGO_PKG_VERSION"))
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(
        &self,
        archive_url: &str,
        token: Option<&AuthToken>,
        destination: &Path,
    ) -> Result<(), PackagesError> {
        let mut request = self.client.get(archive_url);
        if let Some(token) = token {
            let value = HeaderValue::from_str(&token.header_value())
                .map_err(|err| PackagesError::InvalidHeader(err.to_string()))?;
            request = request.header(AUTHORIZATION, value);
        }

        debug!(url = archive_url, "requesting archive");
        let response = request
            .send()
            .await
            .map_err(|err| PackagesError::Http(err.to_string()))?;
        let response = Self::handle_status(archive_url, response)?;
        unpack_tar_gz_stream(response.bytes_stream(), destination).await
    }
}
