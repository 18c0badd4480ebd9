use std::io::{self, Write};

/// Ordered consumer of crawl report lines.
pub trait ReportSink: Send {
    fn emit(&mut self, line: &str);
}

/// Writes each report as one stdout line.
#[derive(Debug, Default)]
pub struct StdoutSink {
    write_failed: bool,
}

impl ReportSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        if let Err(err) = writeln!(out, "{line}")
            && !self.write_failed
        {
            self.write_failed = true;
            tracing::warn!(error = %err, "stdout write failed; further report lines may be lost");
        }
    }
}

impl ReportSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}
