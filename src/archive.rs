use log::debug;

use crate::entry::{EntryRecord, EntryWalker, WalkError, MAX_NAME_LEN};
use crate::error::{EntryError, FramingError};
use crate::extract::Extractor;
use crate::header::{detect, ContainerHeader};
use crate::sink::{ReportRow, Sink};
use crate::transform::Transform;

const CONTINUE_MSG: &str = "Continuing after error in file entry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Extract,
    /// Report only, nothing is written under the output root
    List,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Records walked, good or not
    pub entries: usize,
    /// Handled without error, in list mode that is every good record
    pub extracted: usize,
    pub failed: usize,
}

impl<'a> From<&EntryRecord<'a>> for ReportRow {
    fn from(record: &EntryRecord<'a>) -> Self {
        ReportRow {
            name: record.name.clone(),
            original_size: record.original_size,
            processed_size: record.processed_size,
            method: record.method,
        }
    }
}

pub struct Archive<'a> {
    buf: &'a [u8],
    header: ContainerHeader,
    max_name_len: usize,
}

impl<'a> Archive<'a> {
    pub fn open(buf: &'a [u8]) -> Result<Self, FramingError> {
        let header = detect(buf)?;
        debug!("archive header: {:?}", header);

        Ok(Archive {
            buf,
            header,
            max_name_len: MAX_NAME_LEN,
        })
    }

    pub fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn entries(&self) -> EntryWalker<'a> {
        EntryWalker::new(self.buf, &self.header).with_max_name_len(self.max_name_len)
    }

    pub fn run<T: Transform>(
        &self,
        extractor: &mut Extractor<T>,
        sink: &mut dyn Sink,
        mode: Mode,
    ) -> Result<Summary, FramingError> {
        match mode {
            Mode::Extract => self.extract(extractor, sink),
            Mode::List => self.list(sink),
        }
    }

    /// Walk and report every entry without touching the filesystem
    pub fn list(&self, sink: &mut dyn Sink) -> Result<Summary, FramingError> {
        self.walk(sink, |_, _| Ok(()))
    }

    pub fn extract<T: Transform>(
        &self,
        extractor: &mut Extractor<T>,
        sink: &mut dyn Sink,
    ) -> Result<Summary, FramingError> {
        self.walk(sink, |record, sink| {
            let path = extractor.extract(record, sink)?;
            debug!("extracted {:?}", path);
            Ok(())
        })
    }

    fn walk<F>(&self, sink: &mut dyn Sink, mut on_record: F) -> Result<Summary, FramingError>
    where
        F: FnMut(&EntryRecord<'a>, &mut dyn Sink) -> Result<(), EntryError>,
    {
        sink.write_line(&format!(
            "Read version {:#04x} from archive",
            self.header.version
        ));

        let mut summary = Summary::default();
        for entry in self.entries() {
            match entry {
                Ok(record) => {
                    summary.entries += 1;

                    // Reported before the transform runs, so failures still show up
                    sink.write_report_row(&ReportRow::from(&record));
                    sink.write_line(&format!(
                        "Processing {}: method={}, orig_size={}, proc_size={}",
                        record.name,
                        record.method.name(),
                        record.original_size,
                        record.processed_size
                    ));

                    match on_record(&record, &mut *sink) {
                        Ok(()) => summary.extracted += 1,
                        Err(e) => {
                            summary.failed += 1;
                            sink.write_error(&format!("{}: {}", record.name, e));
                            sink.write_line(CONTINUE_MSG);
                        }
                    }
                }
                Err(WalkError::Entry { offset, error }) => {
                    summary.entries += 1;
                    summary.failed += 1;
                    sink.write_error(&format!("entry at offset {}: {}", offset, error));
                    sink.write_line(CONTINUE_MSG);
                }
                Err(WalkError::Framing(e)) => {
                    sink.write_error(&e.to_string());
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }
}
