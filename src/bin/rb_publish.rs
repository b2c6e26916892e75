use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{debug, error};

use redbox_publish::config::ConfigLoader;
use redbox_publish::domain::RecordOid;
use redbox_publish::error::PublishError;
use redbox_publish::logging;
use redbox_publish::metadata::MetadataOverride;
use redbox_publish::output::{ConsoleOutput, JsonOutput, OutputMode};
use redbox_publish::pipeline::{PublishOptions, PublishSettings, Publisher};
use redbox_publish::render::Renderer;
use redbox_publish::repository;

#[derive(Parser)]
#[command(name = "rb-publish")]
#[command(about = "redbox-portal quick publication script")]
#[command(version, author)]
struct Cli {
    #[arg(short, long, help = "OID of redbox-portal record to fetch")]
    record: String,

    #[arg(short, long, help = "Write the record and view model as JSON")]
    dump: bool,

    #[arg(
        short,
        long,
        help = "Only regenerate the landing page, don't download attachments"
    )]
    page: bool,

    #[arg(short, long, help = "Pass in metadata as either a JSON filename or literal")]
    metadata: Option<String>,

    #[arg(short, long, help = "Config file (default: rb-publish.json)")]
    config: Option<String>,

    #[arg(short, long, help = "Output root directory")]
    output: Option<String>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        error!("an error prevented publication: {report}");
        for cause in report.chain().skip(1) {
            error!("caused by: {cause}");
        }
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PublishError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PublishError) -> u8 {
    match error {
        PublishError::RecordNotFound(_) | PublishError::MissingConfig(_) => 2,
        PublishError::RepositoryHttp(_) | PublishError::RepositoryStatus { .. } => 3,
        PublishError::InvalidRecord { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(output) = cli.output {
        config.output = Utf8PathBuf::from(output);
    }
    logging::init(config.logfile.as_deref())?;

    let oid: RecordOid = cli.record.parse()?;
    let metadata = cli
        .metadata
        .as_deref()
        .map(MetadataOverride::parse)
        .transpose()?;

    debug!("connecting to redbox: {}", config.repository.base_url);
    let repository = repository::connect(&config.repository)?;
    let publisher = Publisher::new(
        repository,
        Renderer::from_config(&config),
        PublishSettings::from_config(&config),
    );
    let options = PublishOptions {
        dump: cli.dump,
        page_only: cli.page,
        metadata,
    };

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    match output_mode {
        OutputMode::Json => {
            let result = publisher.publish(&oid, &options, &JsonOutput)?;
            JsonOutput::print_publish(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = publisher.publish(&oid, &options, &ConsoleOutput)?;
            ConsoleOutput::print_publish(&result).into_diagnostic()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        assert_eq!(map_exit_code(&PublishError::RecordNotFound("X".to_string())), 2);
        assert_eq!(
            map_exit_code(&PublishError::MissingConfig("rb-publish.json".into())),
            2
        );
        assert_eq!(
            map_exit_code(&PublishError::invalid_record("X", "dataRecord doesn't have an oid")),
            4
        );
        assert_eq!(
            map_exit_code(&PublishError::RepositoryStatus {
                status: 500,
                message: "boom".to_string(),
            }),
            3
        );
        assert_eq!(
            map_exit_code(&PublishError::RepositoryHttp("connection refused".to_string())),
            3
        );
        assert_eq!(map_exit_code(&PublishError::Render("bad template".to_string())), 1);
    }
}
