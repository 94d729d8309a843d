use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DownloadAction, DownloadReport, ProgressEvent, ProgressKind, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(result: &DownloadReport) -> io::Result<()> {
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

/// Human-readable progress on stdout. Phase markers are left to the log.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(result: &DownloadReport) {
        println!(
            "{}: {} listed, {} selected, {} downloaded",
            result.prefix,
            result.listed,
            result.items.len(),
            result.downloaded()
        );
        for item in &result.items {
            let marker = match item.action {
                DownloadAction::Existing => "=",
                DownloadAction::Download => "+",
            };
            println!("{marker} {}", item.local_path);
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.kind {
            ProgressKind::Phase => {
                tracing::debug!(elapsed = ?event.elapsed, "{}", event.message);
            }
            ProgressKind::Notice => println!("{}", event.message),
        }
    }
}
