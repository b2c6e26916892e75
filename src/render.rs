use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{Environment, Value as TemplateValue, context};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::catalog::{self, CITATION_FIELD, CatalogInput, ROOT_ID, ZIP_PATH_FIELD};
use crate::config::{DataCrateConfig, RenderMode, ResolvedConfig};
use crate::domain::{Location, Record, Size};
use crate::error::PublishError;
use crate::fetch::FetchOutcome;
use crate::fs_util;

pub const PAGE_FILE: &str = "index.html";

const BUILTIN_PAGE_TEMPLATE: &str = include_str!("../templates/index.html");
const BUILTIN_CATALOG_TEMPLATE: &str = include_str!("../templates/catalog.html");

/// The record plus per-attachment outcomes, in `dataLocations` order.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    #[serde(flatten)]
    pub record: Record,
    pub downloads: Vec<FetchOutcome>,
}

impl ViewModel {
    pub fn new(record: Record, downloads: Vec<FetchOutcome>) -> Self {
        Self { record, downloads }
    }

    /// Copy of the record whose downloaded attachments carry a human-readable
    /// measured size.
    pub fn annotated_record(&self) -> Record {
        let mut record = self.record.clone();
        let attachments = record
            .data_locations
            .iter_mut()
            .filter(|location| location.is_attachment());
        for (location, outcome) in attachments.zip(&self.downloads) {
            if let FetchOutcome::Downloaded(download) = outcome {
                if let Some(Size::Bytes(bytes)) = download.size {
                    location.size = Some(Size::Label(fs_util::human_size(bytes)));
                }
            }
        }
        record
    }

    /// Locations of `record` whose attachment was fetched, in source order.
    pub fn downloaded<'r>(&self, record: &'r Record) -> Vec<&'r Location> {
        record
            .attachments()
            .zip(&self.downloads)
            .filter(|(_, outcome)| !outcome.is_failure())
            .map(|(location, _)| location)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    mode: RenderMode,
    template: Option<Utf8PathBuf>,
    datacrate: DataCrateConfig,
}

impl Renderer {
    pub fn new(mode: RenderMode, template: Option<Utf8PathBuf>, datacrate: DataCrateConfig) -> Self {
        Self {
            mode,
            template,
            datacrate,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.render, config.template.clone(), config.datacrate.clone())
    }

    /// File names `render` writes into the output directory.
    pub fn artifact_names(&self) -> Vec<&str> {
        match self.mode {
            RenderMode::Page => vec![PAGE_FILE],
            RenderMode::Catalog => vec![
                self.datacrate.catalog_json.as_str(),
                self.datacrate.catalog_html.as_str(),
            ],
        }
    }

    /// Writes the artifacts for `view` into `output_dir` and returns their
    /// paths. `oid` is the requested publication id, which identifies the
    /// catalog even when the record's own `oid` was overridden.
    pub fn render(
        &self,
        oid: &str,
        view: &ViewModel,
        output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, PublishError> {
        match self.mode {
            RenderMode::Page => self.render_page(view, output_dir).map(|path| vec![path]),
            RenderMode::Catalog => self.render_catalog(oid, view, output_dir),
        }
    }

    fn render_page(&self, view: &ViewModel, output_dir: &Utf8Path) -> Result<Utf8PathBuf, PublishError> {
        let source = match &self.template {
            Some(path) => {
                debug!("loading template {path}");
                fs::read_to_string(path.as_std_path())
                    .map_err(|err| PublishError::Render(format!("read template {path}: {err}")))?
            }
            None => BUILTIN_PAGE_TEMPLATE.to_string(),
        };
        let html = environment()
            .render_named_str(PAGE_FILE, &source, view)
            .map_err(|err| PublishError::Render(err.to_string()))?;

        let destination = output_dir.join(PAGE_FILE);
        debug!("writing landing page to {destination}");
        fs_util::write_bytes_atomic(&destination, html.as_bytes())?;
        Ok(destination)
    }

    fn render_catalog(
        &self,
        oid: &str,
        view: &ViewModel,
        output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, PublishError> {
        let record = view.annotated_record();
        let files = view.downloaded(&record);
        let catalog = catalog::datapub_to_catalog(&CatalogInput {
            id: oid,
            datapub: &record,
            files: &files,
            organisation: self.datacrate.organisation.as_ref(),
            owner: &self.datacrate.owner,
            approver: &self.datacrate.approver,
            zip_path: self.datacrate.zip_path.as_deref(),
        });

        let catalog_json = output_dir.join(&self.datacrate.catalog_json);
        debug!("writing catalog to {catalog_json}");
        fs_util::write_json_pretty(&catalog_json, &catalog)?;

        let html = CatalogIndex::new(CITATION_FIELD, ZIP_PATH_FIELD).render(&catalog)?;
        let catalog_html = output_dir.join(&self.datacrate.catalog_html);
        fs_util::write_bytes_atomic(&catalog_html, html.as_bytes())?;

        Ok(vec![catalog_json, catalog_html])
    }
}

/// HTML index of a catalog, reading the citation and archive link from the
/// named fields of the root dataset.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    citation_field: String,
    zip_field: String,
}

impl CatalogIndex {
    pub fn new(citation_field: &str, zip_field: &str) -> Self {
        Self {
            citation_field: citation_field.to_string(),
            zip_field: zip_field.to_string(),
        }
    }

    pub fn render(&self, catalog: &Value) -> Result<String, PublishError> {
        let graph = catalog
            .get("@graph")
            .and_then(Value::as_array)
            .ok_or_else(|| PublishError::Render("catalog has no @graph".to_string()))?;
        let root = graph
            .iter()
            .find(|node| node.get("@id").and_then(Value::as_str) == Some(ROOT_ID))
            .ok_or_else(|| PublishError::Render("catalog has no root dataset".to_string()))?;
        let files: Vec<&Value> = graph
            .iter()
            .filter(|node| node.get("@type").and_then(Value::as_str) == Some("File"))
            .collect();

        environment()
            .render_named_str(
                "catalog.html",
                BUILTIN_CATALOG_TEMPLATE,
                context! {
                    root => root,
                    files => files,
                    citation => root.get(&self.citation_field),
                    zip_path => root.get(&self.zip_field),
                },
            )
            .map_err(|err| PublishError::Render(err.to_string()))
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("filesize", filesize);
    env
}

fn filesize(value: TemplateValue) -> String {
    match u64::try_from(value.clone()) {
        Ok(bytes) => fs_util::human_size(bytes),
        Err(_) => value.to_string(),
    }
}
