use std::io::{self, Write};

use serde::Serialize;

use crate::progress::{EventLevel, ProgressEvent, ProgressSink};
use crate::report::{CollectionReport, LoadReport};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_collection(report: &CollectionReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_load(report: &LoadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TracingSink {
    pipeline: &'static str,
}

impl TracingSink {
    pub fn new(pipeline: &'static str) -> Self {
        Self { pipeline }
    }
}

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.level {
            EventLevel::Info => tracing::info!(pipeline = self.pipeline, "{}", event.message),
            EventLevel::Warn => tracing::warn!(pipeline = self.pipeline, "{}", event.message),
            EventLevel::Error => tracing::error!(pipeline = self.pipeline, "{}", event.message),
        }
    }
}
