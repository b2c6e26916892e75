use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::{RepositoryConfig, RepositoryVersion};
use crate::domain::Record;
use crate::error::PublishError;

pub mod legacy;
pub mod portal;

pub use legacy::LegacyRepository;
pub use portal::PortalRepository;

pub type Datastream = Box<dyn Read + Send>;

/// Record lookup and attachment retrieval against a ReDBox instance.
///
/// Absence is not an error: both operations return `Ok(None)` when the
/// repository has nothing under the requested id.
pub trait RecordRepository: Send + Sync {
    fn get_record(&self, oid: &str) -> Result<Option<Record>, PublishError>;

    /// Opens the byte stream of `datastream_id`, scoped to the record `oid`
    /// that owns it.
    fn read_datastream(
        &self,
        oid: &str,
        datastream_id: &str,
    ) -> Result<Option<Datastream>, PublishError>;
}

pub fn connect(config: &RepositoryConfig) -> Result<Box<dyn RecordRepository>, PublishError> {
    let http = HttpRepository::new(config)?;
    Ok(match config.version {
        RepositoryVersion::Redbox1 => Box::new(LegacyRepository::new(http)),
        RepositoryVersion::Redbox2 => Box::new(PortalRepository::new(http)),
    })
}

/// HTTP plumbing shared by both protocol variants.
#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    pub fn new(config: &RepositoryConfig) -> Result<Self, PublishError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("rb-publish/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PublishError::RepositoryHttp(err.to_string()))?,
        );
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| PublishError::RepositoryHttp(err.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        // Datastreams can be large, so only the connect phase is bounded.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| PublishError::RepositoryHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Sends the request, mapping 404 to `None` and other failures to errors.
    pub fn send_optional(&self, request: RequestBuilder) -> Result<Option<Response>, PublishError> {
        let response = request
            .send()
            .map_err(|err| PublishError::RepositoryHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::handle_status(response).map(Some)
    }

    pub fn fetch_record(&self, oid: &str, url: &str) -> Result<Option<Record>, PublishError> {
        let Some(response) = self.send_optional(self.get(url))? else {
            return Ok(None);
        };
        let body = response
            .text()
            .map_err(|err| PublishError::RepositoryHttp(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|err| PublishError::RecordDecode(err.to_string()))?;
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => Record::from_value(oid, value).map(Some),
            _ => Err(PublishError::RecordDecode(format!(
                "expected a JSON object for record {oid}"
            ))),
        }
    }

    pub fn fetch_datastream(
        &self,
        url: &str,
        datastream_id: &str,
    ) -> Result<Option<Datastream>, PublishError> {
        let request = self.get(url).query(&[("datastreamId", datastream_id)]);
        Ok(self
            .send_optional(request)?
            .map(|response| Box::new(response) as Datastream))
    }

    fn handle_status(response: Response) -> Result<Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "repository request failed".to_string());
        Err(PublishError::RepositoryStatus { status, message })
    }
}
