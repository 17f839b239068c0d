use std::io::{self, Write};

use serde::Serialize;

use crate::sync::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
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

/// Human-readable output: progress lines on stderr, summary on stdout.
pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}catalog-sync summary ({}){reset}", summary.theme)?;
        writeln!(out, "{green}succeeded: {}{reset}", summary.succeeded_count())?;
        writeln!(out, "{red}failed:    {}{reset}", summary.failed_count())?;
        writeln!(out, "{yellow}skipped:   {}{reset}", summary.skipped_count())?;
        if !summary.not_started.is_empty() {
            writeln!(out, "{yellow}not started: {}{reset}", summary.not_started.len())?;
        }

        for item in &summary.succeeded {
            writeln!(out, "{green}  + {} -> {}{reset}", item.id, item.path)?;
        }
        for item in &summary.failed {
            writeln!(out, "{red}  x {} [{}] {}{reset}", item.id, item.kind, item.message)?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr().lock();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(
                stderr,
                "{} ({} ms)",
                event.message,
                elapsed.as_millis()
            ),
            None => writeln!(stderr, "{}", event.message),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::FailedDataset;

    #[test]
    fn text_summary_lists_failures_with_kind() {
        let summary = RunSummary {
            theme: "Hospitals".to_string(),
            failed: vec![FailedDataset {
                id: "abcd-1234".to_string(),
                kind: "download_failed".to_string(),
                message: "server returned status 503".to_string(),
            }],
            skipped: vec!["efgh-5678".to_string()],
            ..RunSummary::default()
        };
        let mut buffer = Vec::new();
        TextOutput::write_summary(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("abcd-1234 [download_failed]"));
        assert!(text.contains("skipped:   1"));
    }
}
