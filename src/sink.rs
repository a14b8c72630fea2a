use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{error, info, warn};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::entry::Method;
use crate::error::SetupError;

// Where the run writes its diagnostics and the per-entry metadata report
pub trait Sink {
    fn write_line(&mut self, line: &str);
    fn write_error(&mut self, line: &str);
    fn write_report_row(&mut self, row: &ReportRow);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub original_size: u64,
    pub processed_size: u64,
    pub method: Method,
}

impl fmt::Display for ReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.name,
            self.original_size,
            self.processed_size,
            self.method.name()
        )
    }
}

pub struct FileSink {
    log: File,
    report: Option<File>,
}

impl FileSink {
    pub fn new(log: File) -> Self {
        FileSink { log, report: None }
    }

    // Log file is appended to across runs
    pub fn open(log_path: &Path) -> Result<Self, SetupError> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|source| SetupError::OpenLog {
                path: log_path.to_path_buf(),
                source,
            })?;

        Ok(FileSink::new(log))
    }

    // Opened once the output directory exists, truncated per run
    pub fn open_report(&mut self, report_path: &Path) -> Result<(), SetupError> {
        let report = File::create(report_path).map_err(|source| SetupError::OpenReport {
            path: report_path.to_path_buf(),
            source,
        })?;

        self.report = Some(report);
        Ok(())
    }

    fn append_log(&mut self, line: &str) {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        if let Err(e) = writeln!(self.log, "{} {}", stamp, line).and_then(|_| self.log.flush()) {
            warn!("failed to write log file: {}", e);
        }
    }
}

impl Sink for FileSink {
    fn write_line(&mut self, line: &str) {
        self.append_log(line);
        info!("{}", line);
    }

    fn write_error(&mut self, line: &str) {
        self.append_log(&format!("ERROR: {}", line));
        error!("{}", line);
    }

    fn write_report_row(&mut self, row: &ReportRow) {
        let Some(report) = self.report.as_mut() else {
            warn!("no report open, dropping row for {:?}", row.name);
            return;
        };

        if let Err(e) = writeln!(report, "{}", row) {
            warn!("failed to write report row for {:?}: {}", row.name, e);
        }
    }
}

// In memory sink, for tests
#[derive(Debug, Default)]
pub struct MemSink {
    pub lines: Vec<String>,
    pub errors: Vec<String>,
    pub rows: Vec<String>,
}

impl MemSink {
    pub fn new() -> Self {
        MemSink::default()
    }
}

impl Sink for MemSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn write_error(&mut self, line: &str) {
        self.errors.push(line.to_string());
    }

    fn write_report_row(&mut self, row: &ReportRow) {
        self.rows.push(row.to_string());
    }
}

#[cfg(test)]
mod test_sink {
    use super::*;
    use std::fs::read_to_string;

    fn row() -> ReportRow {
        ReportRow {
            name: "dir/a.txt".to_string(),
            original_size: 10,
            processed_size: 7,
            method: Method::Zlib,
        }
    }

    #[test]
    fn report_row_format() {
        assert_eq!(row().to_string(), "dir/a.txt\t10\t7\tzlib");
    }

    #[test]
    fn mem_sink_collects() {
        let mut sink = MemSink::new();
        sink.write_line("hello");
        sink.write_error("oops");
        sink.write_report_row(&row());

        assert_eq!(sink.lines, vec!["hello"]);
        assert_eq!(sink.errors, vec!["oops"]);
        assert_eq!(sink.rows, vec!["dir/a.txt\t10\t7\tzlib"]);
    }

    #[test]
    fn file_sink_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let report_path = dir.path().join("metadata.txt");

        {
            let mut sink = FileSink::open(&log_path).unwrap();
            sink.open_report(&report_path).unwrap();
            sink.write_line("Read version 0x01 from archive");
            sink.write_error("Unknown processing method");
            sink.write_report_row(&row());
        }

        let log = read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" Read version 0x01 from archive"));
        assert!(lines[1].ends_with(" ERROR: Unknown processing method"));

        assert_eq!(read_to_string(&report_path).unwrap(), "dir/a.txt\t10\t7\tzlib\n");
    }

    #[test]
    fn file_sink_appends_log_truncates_report() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let report_path = dir.path().join("metadata.txt");

        for _ in 0..2 {
            let mut sink = FileSink::open(&log_path).unwrap();
            sink.open_report(&report_path).unwrap();
            sink.write_line("run");
            sink.write_report_row(&row());
        }

        assert_eq!(read_to_string(&log_path).unwrap().lines().count(), 2);
        assert_eq!(read_to_string(&report_path).unwrap().lines().count(), 1);
    }

    #[test]
    fn report_open_failure_leaves_log_usable() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let report_path = dir.path().join("missing/metadata.txt");

        let mut sink = FileSink::open(&log_path).unwrap();
        let err = sink.open_report(&report_path).unwrap_err();
        assert!(matches!(err, SetupError::OpenReport { .. }));

        sink.write_error(&err.to_string());
        sink.write_report_row(&row());
        drop(sink);

        let log = read_to_string(&log_path).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("ERROR: failed to open report file"));
        assert!(!report_path.exists());
    }
}
