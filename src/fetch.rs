use camino::Utf8Path;
use serde::Serialize;
use tracing::debug;

use crate::config::SizePolicy;
use crate::domain::{Attachment, Location, Size};
use crate::error::PublishError;
use crate::fs_util;
use crate::repository::RecordRepository;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    pub name: String,
    pub mimetype: Option<String>,
    pub size: Option<Size>,
    /// Path of the written file relative to the output directory.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    #[serde(rename = "fileId")]
    pub file_id: String,
    pub name: String,
    pub error: String,
}

/// Terminal result of one attachment for this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FetchOutcome {
    Downloaded(Download),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn failed(location: &Location, error: &PublishError) -> Self {
        FetchOutcome::Failed(FetchFailure {
            file_id: location.display_file_id().to_string(),
            name: location.display_name().to_string(),
            error: error.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FetchOutcome::Downloaded(download) => &download.name,
            FetchOutcome::Failed(failure) => &failure.name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Fetches one attachment of the data record `data_record_oid` into
/// `output_dir`. Failures are folded into the outcome.
pub fn fetch_attachment(
    repository: &dyn RecordRepository,
    data_record_oid: &str,
    output_dir: &Utf8Path,
    location: &Location,
    policy: SizePolicy,
) -> FetchOutcome {
    let result = location.as_attachment().and_then(|attachment| {
        debug!(
            name = attachment.name,
            file_id = attachment.file_id,
            "fetching attachment"
        );
        download(repository, data_record_oid, output_dir, attachment, policy)
    });
    match result {
        Ok(download) => FetchOutcome::Downloaded(download),
        Err(err) => FetchOutcome::failed(location, &err),
    }
}

/// Reports an attachment from a previous run without contacting the
/// repository.
pub fn existing_attachment(
    output_dir: &Utf8Path,
    location: &Location,
    policy: SizePolicy,
) -> FetchOutcome {
    let result = location.as_attachment().and_then(|attachment| {
        let destination = output_dir.join(attachment.name);
        if !destination.is_file() {
            return Err(attachment_error(attachment, "not previously fetched"));
        }
        let size = outcome_size(&destination, attachment, policy)?;
        Ok(success(attachment, size))
    });
    match result {
        Ok(download) => FetchOutcome::Downloaded(download),
        Err(err) => FetchOutcome::failed(location, &err),
    }
}

fn download(
    repository: &dyn RecordRepository,
    data_record_oid: &str,
    output_dir: &Utf8Path,
    attachment: Attachment<'_>,
    policy: SizePolicy,
) -> Result<Download, PublishError> {
    let destination = output_dir.join(attachment.name);
    let mut stream = repository
        .read_datastream(data_record_oid, attachment.file_id)
        .map_err(|err| attachment_error(attachment, &err.to_string()))?
        .ok_or_else(|| attachment_error(attachment, "datastream not found"))?;

    debug!("writing to {destination}");
    fs_util::write_stream_atomic(&mut stream, &destination)
        .map_err(|err| attachment_error(attachment, &format!("write {destination}: {err}")))?;

    let size = outcome_size(&destination, attachment, policy)?;
    Ok(success(attachment, size))
}

fn outcome_size(
    destination: &Utf8Path,
    attachment: Attachment<'_>,
    policy: SizePolicy,
) -> Result<Option<Size>, PublishError> {
    match policy {
        SizePolicy::Measured => fs_util::file_size(destination)
            .map(|bytes| Some(Size::Bytes(bytes)))
            .map_err(|err| attachment_error(attachment, &format!("stat {destination}: {err}"))),
        SizePolicy::Declared => Ok(attachment.declared_size.cloned()),
    }
}

fn success(attachment: Attachment<'_>, size: Option<Size>) -> Download {
    Download {
        name: attachment.name.to_string(),
        mimetype: attachment.mimetype.map(str::to_string),
        size,
        url: attachment.name.to_string(),
    }
}

fn attachment_error(attachment: Attachment<'_>, reason: &str) -> PublishError {
    PublishError::AttachmentFetch {
        name: attachment.name.to_string(),
        file_id: attachment.file_id.to_string(),
        reason: reason.to_string(),
    }
}
