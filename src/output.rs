use std::io::{self, Write};

use serde::Serialize;

use crate::fetch::FetchOutcome;
use crate::pipeline::{ProgressEvent, ProgressSink, PublishResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_publish(result: &PublishResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr and a plain-text summary on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_publish(result: &PublishResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Published {} to {}", result.oid, result.output_dir)?;
        writeln!(
            stdout,
            "Attachments: {} fetched, {} failed",
            result.downloads.len() - result.failures(),
            result.failures()
        )?;
        for outcome in &result.downloads {
            match outcome {
                FetchOutcome::Downloaded(download) => {
                    let size = download
                        .size
                        .as_ref()
                        .map(|size| format!(" ({size})"))
                        .unwrap_or_default();
                    writeln!(stdout, "  ok     {}{size}", download.name)?;
                }
                FetchOutcome::Failed(failure) => {
                    writeln!(stdout, "  failed {}: {}", failure.name, failure.error)?;
                }
            }
        }
        for artifact in &result.artifacts {
            writeln!(stdout, "  wrote  {artifact}")?;
        }
        Ok(())
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        eprintln!("• {}", event.message);
    }
}
