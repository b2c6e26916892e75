use crate::domain::Record;
use crate::error::PublishError;

use super::{Datastream, HttpRepository, RecordRepository};

/// ReDBox 1.x API.
#[derive(Clone)]
pub struct LegacyRepository {
    http: HttpRepository,
}

impl LegacyRepository {
    pub fn new(http: HttpRepository) -> Self {
        Self { http }
    }

    pub fn metadata_url(&self, oid: &str) -> String {
        format!("{}/recordmetadata/{oid}", self.http.base_url())
    }

    pub fn datastream_url(&self, oid: &str) -> String {
        format!("{}/datastream/{oid}", self.http.base_url())
    }
}

impl RecordRepository for LegacyRepository {
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
