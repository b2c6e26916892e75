//! DataCrate catalog generation.
//!
//! The catalog is a JSON-LD document whose `@graph` holds the root dataset
//! (`./`), one `File` per downloaded attachment, the publishing
//! organisation, and the people who created and approved the publication.
//! Attachments that failed to fetch are left out so every `hasPart` entry
//! exists next to the catalog.

use serde_json::{Map, Value, json};

use crate::config::Organisation;
use crate::domain::{Location, Record};

pub const DATACRATE_CONTEXT: &str =
    "https://raw.githubusercontent.com/UTS-eResearch/datacrate/master/spec/1.0/context.json";
pub const ROOT_ID: &str = "./";
pub const CITATION_FIELD: &str = "text_citation";
pub const ZIP_PATH_FIELD: &str = "zip_path";

#[derive(Debug, Clone)]
pub struct CatalogInput<'a> {
    pub id: &'a str,
    pub datapub: &'a Record,
    /// Attachments present in the output directory, in `dataLocations` order.
    pub files: &'a [&'a Location],
    pub organisation: Option<&'a Organisation>,
    pub owner: &'a str,
    pub approver: &'a str,
    pub zip_path: Option<&'a str>,
}

pub fn datapub_to_catalog(input: &CatalogInput<'_>) -> Value {
    let record = input.datapub;
    let mut graph = Vec::new();

    let mut root = Map::new();
    root.insert("@id".to_string(), json!(ROOT_ID));
    root.insert("@type".to_string(), json!("Dataset"));
    root.insert("identifier".to_string(), json!(input.id));
    insert_opt(&mut root, "name", record.title.as_deref());
    insert_opt(&mut root, "description", record.description.as_deref());
    insert_opt(&mut root, "datePublished", publication_date(record));
    insert_opt(&mut root, "license", record.extra_str("license_identifier"));
    if let Some(keywords) = record.extra.get("finalKeywords") {
        root.insert("keywords".to_string(), keywords.clone());
    }

    let creators: Vec<Value> = record
        .creators
        .iter()
        .enumerate()
        .filter_map(|(index, party)| {
            let name = party.text_full_name.as_deref()?;
            let id = party
                .orcid
                .clone()
                .or_else(|| party.email.as_ref().map(|email| format!("mailto:{email}")))
                .unwrap_or_else(|| format!("_:creator/{index}"));
            let mut person = Map::new();
            person.insert("@id".to_string(), json!(id));
            person.insert("@type".to_string(), json!("Person"));
            person.insert("name".to_string(), json!(name));
            insert_opt(&mut person, "email", party.email.as_deref());
            graph.push(Value::Object(person));
            Some(json!({"@id": id}))
        })
        .collect();
    if !creators.is_empty() {
        root.insert("creator".to_string(), Value::Array(creators));
    }

    if let Some(org) = input.organisation {
        root.insert("publisher".to_string(), json!({"@id": org.id}));
        graph.push(json!({"@id": org.id, "@type": "Organization", "name": org.name}));
    }

    root.insert(
        "hasPart".to_string(),
        Value::Array(
            input
                .files
                .iter()
                .map(|location| json!({"@id": location.display_name()}))
                .collect(),
        ),
    );
    root.insert(CITATION_FIELD.to_string(), json!(text_citation(input)));
    insert_opt(&mut root, ZIP_PATH_FIELD, input.zip_path);

    for location in input.files {
        let mut file = Map::new();
        file.insert("@id".to_string(), json!(location.display_name()));
        file.insert("@type".to_string(), json!("File"));
        file.insert("name".to_string(), json!(location.display_name()));
        insert_opt(&mut file, "encodingFormat", location.mimetype.as_deref());
        if let Some(size) = location.size.as_ref().filter(|size| size.is_known()) {
            file.insert("contentSize".to_string(), json!(size.to_string()));
        }
        graph.push(Value::Object(file));
    }

    let owner_id = person_id(input.owner);
    let approver_id = person_id(input.approver);
    graph.push(json!({"@id": owner_id, "@type": "Person", "name": input.owner}));
    if approver_id != owner_id {
        graph.push(json!({"@id": approver_id, "@type": "Person", "name": input.approver}));
    }
    graph.push(json!({
        "@id": "_:action/create",
        "@type": "CreateAction",
        "agent": {"@id": owner_id},
        "object": {"@id": ROOT_ID}
    }));
    graph.push(json!({
        "@id": "_:action/approve",
        "@type": "UpdateAction",
        "agent": {"@id": approver_id},
        "object": {"@id": ROOT_ID}
    }));

    graph.insert(0, Value::Object(root));
    json!({"@context": DATACRATE_CONTEXT, "@graph": graph})
}

/// Creators (year): Title. Publisher. identifier
pub fn text_citation(input: &CatalogInput<'_>) -> String {
    let record = input.datapub;
    let creators = record
        .creators
        .iter()
        .filter_map(|party| party.text_full_name.as_deref())
        .collect::<Vec<_>>()
        .join("; ");
    let mut citation = String::new();
    if !creators.is_empty() {
        citation.push_str(&creators);
        citation.push(' ');
    }
    if let Some(year) = publication_date(record).and_then(|date| date.get(..4)) {
        citation.push_str(&format!("({year}): "));
    }
    citation.push_str(record.title.as_deref().unwrap_or(input.id));
    citation.push('.');
    if let Some(org) = input.organisation {
        citation.push_str(&format!(" {}.", org.name));
    }
    let identifier = record
        .extra_str("citation_doi")
        .map(|doi| format!("https://doi.org/{doi}"))
        .unwrap_or_else(|| input.id.to_string());
    citation.push(' ');
    citation.push_str(&identifier);
    citation
}

fn publication_date(record: &Record) -> Option<&str> {
    record
        .extra_str("citation_publication_date")
        .or_else(|| record.extra_str("datepublished"))
}

fn person_id(name: &str) -> String {
    format!("_:person/{name}")
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}
