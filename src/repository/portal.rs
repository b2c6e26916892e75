use crate::domain::Record;
use crate::error::PublishError;

use super::{Datastream, HttpRepository, RecordRepository};

/// redbox-portal (ReDBox 2.x) REST API.
#[derive(Clone)]
pub struct PortalRepository {
    http: HttpRepository,
}

impl PortalRepository {
    pub fn new(http: HttpRepository) -> Self {
        Self { http }
    }

    pub fn metadata_url(&self, oid: &str) -> String {
        format!("{}/records/metadata/{oid}", self.http.base_url())
    }

    pub fn datastream_url(&self, oid: &str) -> String {
        format!("{}/records/datastreams/{oid}", self.http.base_url())
    }
}

impl RecordRepository for PortalRepository {
    fn get_record(&self, oid: &str) -> Result<Option<Record>, PublishError> {
        self.http.fetch_record(oid, &self.metadata_url(oid))
    }

    fn read_datastream(
        &self,
        oid: &str,
        datastream_id: &str,
    ) -> Result<Option<Datastream>, PublishError> {
        self.http
            .fetch_datastream(&self.datastream_url(oid), datastream_id)
    }
}
