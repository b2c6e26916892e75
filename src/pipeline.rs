use std::thread;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{FetchMode, ResolvedConfig, SizePolicy};
use crate::domain::{Location, RecordOid};
use crate::error::PublishError;
use crate::fetch::{self, FetchOutcome};
use crate::fs_util;
use crate::metadata::MetadataOverride;
use crate::render::{Renderer, ViewModel};
use crate::repository::RecordRepository;

pub const VIEW_MODEL_DUMP: &str = "metadata.json";

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Write JSON snapshots of the record and the merged view model.
    pub dump: bool,
    /// Skip attachment fetching and re-render from files already on disk.
    pub page_only: bool,
    pub metadata: Option<MetadataOverride>,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub output_root: Utf8PathBuf,
    pub fetch_mode: FetchMode,
    pub size_policy: SizePolicy,
    pub datapub_json: Option<String>,
}

impl PublishSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            output_root: config.output.clone(),
            fetch_mode: config.fetch,
            size_policy: config.size,
            datapub_json: config.datacrate.datapub_json.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub oid: String,
    pub output_dir: Utf8PathBuf,
    pub downloads: Vec<FetchOutcome>,
    pub artifacts: Vec<Utf8PathBuf>,
}

impl PublishResult {
    pub fn failures(&self) -> usize {
        self.downloads.iter().filter(|d| d.is_failure()).count()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent { message });
}

pub struct Publisher {
    repository: Box<dyn RecordRepository>,
    renderer: Renderer,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(
        repository: Box<dyn RecordRepository>,
        renderer: Renderer,
        settings: PublishSettings,
    ) -> Self {
        Self {
            repository,
            renderer,
            settings,
        }
    }

    pub fn publish(
        &self,
        oid: &RecordOid,
        options: &PublishOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PublishResult, PublishError> {
        emit(sink, format!("phase=Resolve; looking up record {oid}"));
        debug!("looking up record {oid}");
        let Some(record) = self.repository.get_record(oid.as_str())? else {
            error!("no record found with oid {oid}");
            return Err(PublishError::RecordNotFound(oid.to_string()));
        };
        let record = match &options.metadata {
            Some(overrides) => overrides.apply(record)?,
            None => record,
        };

        let data_record_oid = record.data_record_oid()?.to_string();
        debug!("data record is {data_record_oid}");

        let output_dir = self.settings.output_root.join(oid.as_str());
        fs_util::ensure_dir(&output_dir)?;

        let dump_name = self.datapub_dump_name(oid);
        if options.dump {
            let dump_path = output_dir.join(&dump_name);
            debug!("writing publication metadata to {dump_path}");
            fs_util::write_json_pretty(&dump_path, &record)?;
        }

        let attachments: Vec<&Location> = record.attachments().collect();
        let downloads = if options.page_only {
            emit(sink, "phase=Fetch; page only, skipping attachments".to_string());
            info!("page only: using {} previously fetched attachments", attachments.len());
            attachments
                .iter()
                .map(|location| {
                    fetch::existing_attachment(&output_dir, location, self.settings.size_policy)
                })
                .collect()
        } else {
            emit(sink, format!("phase=Fetch; {} attachments", attachments.len()));
            self.fetch_all(&data_record_oid, &output_dir, &attachments, sink)
        };

        let failures = report_failures(&data_record_oid, &downloads);
        if failures > 0 {
            warn!("{failures} of {} attachments could not be fetched", downloads.len());
        }

        let mut generated = self.renderer.artifact_names();
        if options.dump {
            generated.extend([dump_name.as_str(), VIEW_MODEL_DUMP]);
        }
        for name in shadowed_attachments(&downloads, &generated) {
            warn!("attachment {name} collides with a generated file of the same name");
        }

        emit(sink, "phase=Render; writing artifacts".to_string());
        let view = ViewModel::new(record, downloads);
        let artifacts = self.renderer.render(oid.as_str(), &view, &output_dir)?;
        if options.dump {
            fs_util::write_json_pretty(&output_dir.join(VIEW_MODEL_DUMP), &view)?;
        }
        info!("published {oid} to {output_dir}");

        Ok(PublishResult {
            oid: oid.to_string(),
            output_dir,
            downloads: view.downloads,
            artifacts,
        })
    }

    /// Outcomes come back in the order of `attachments` whatever the fetch
    /// mode.
    fn fetch_all(
        &self,
        data_record_oid: &str,
        output_dir: &Utf8Path,
        attachments: &[&Location],
        sink: &dyn ProgressSink,
    ) -> Vec<FetchOutcome> {
        let repository: &dyn RecordRepository = &*self.repository;
        let policy = self.settings.size_policy;
        let fetch_one = |location: &Location| {
            let start = Instant::now();
            let outcome =
                fetch::fetch_attachment(repository, data_record_oid, output_dir, location, policy);
            emit(
                sink,
                format!(
                    "attachment {} {} latency_ms={}",
                    outcome.name(),
                    if outcome.is_failure() { "failed" } else { "fetched" },
                    start.elapsed().as_millis()
                ),
            );
            outcome
        };

        match self.settings.fetch_mode {
            FetchMode::Sequential => attachments
                .iter()
                .map(|location| fetch_one(*location))
                .collect(),
            FetchMode::Concurrent => thread::scope(|scope| {
                let handles: Vec<_> = attachments
                    .iter()
                    .map(|&location| {
                        let fetch_one = &fetch_one;
                        scope.spawn(move || fetch_one(location))
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(attachments)
                    .map(|(handle, location)| {
                        handle.join().unwrap_or_else(|_| {
                            FetchOutcome::failed(
                                location,
                                &PublishError::AttachmentFetch {
                                    name: location.display_name().to_string(),
                                    file_id: location.display_file_id().to_string(),
                                    reason: "fetch thread panicked".to_string(),
                                },
                            )
                        })
                    })
                    .collect()
            }),
        }
    }

    fn datapub_dump_name(&self, oid: &RecordOid) -> String {
        self.settings
            .datapub_json
            .clone()
            .unwrap_or_else(|| format!("{oid}.json"))
    }
}

/// Names of fetched attachments that share a file with a generated artifact.
fn shadowed_attachments<'a>(downloads: &'a [FetchOutcome], generated: &[&str]) -> Vec<&'a str> {
    downloads
        .iter()
        .filter(|outcome| !outcome.is_failure())
        .map(FetchOutcome::name)
        .filter(|name| generated.contains(name))
        .collect()
}

fn report_failures(data_record_oid: &str, downloads: &[FetchOutcome]) -> usize {
    let mut failures = 0;
    for outcome in downloads {
        if let FetchOutcome::Failed(failure) = outcome {
            error!(
                "couldn't fetch attachment {data_record_oid} {}: {}",
                failure.file_id, failure.error
            );
            failures += 1;
        }
    }
    failures
}
