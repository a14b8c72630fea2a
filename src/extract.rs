use std::fs::create_dir_all;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::entry::EntryRecord;
use crate::error::EntryError;
use crate::sink::Sink;
use crate::transform::{Transform, TransformRequest};

/// Length of the key segment leading a keyed payload
pub const KEY_LEN: usize = 44;

pub struct Extractor<T: Transform> {
    root: PathBuf,
    staging: PathBuf,
    // Files of our own that may live under the root, never a destination
    reserved: Vec<PathBuf>,
    transform: T,
}

impl<T: Transform> Extractor<T> {
    pub fn new(root: impl Into<PathBuf>, transform: T) -> Self {
        let root = root.into();
        Extractor {
            staging: root.clone(),
            root,
            reserved: Vec::new(),
            transform,
        }
    }

    pub fn with_staging_dir(mut self, staging: impl Into<PathBuf>) -> Self {
        self.staging = staging.into();
        self
    }

    pub fn with_reserved(mut self, path: impl Into<PathBuf>) -> Self {
        self.reserved.push(path.into());
        self
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn extract(&mut self, record: &EntryRecord<'_>, sink: &mut dyn Sink) -> Result<PathBuf, EntryError> {
        let output = destination(&self.root, &record.name)?;
        if self.reserved.contains(&output) {
            return Err(EntryError::UnsafeName(record.name.clone()));
        }

        // Nothing is created on disk for a payload that can't be staged
        let split = split_key(record)?;
        if let Some(parent) = output.parent() {
            create_dir_all(parent)?;
        }

        let staged = stage(&self.staging, record.payload, split)?;
        debug!("staged {:?} at {:?}", record.name, staged.path());

        let result = self.transform.apply(
            &TransformRequest {
                method: record.method,
                input: staged.path(),
                output: &output,
                original_size: record.original_size,
            },
            sink,
        );

        // Staged payload goes away whatever the transform said
        if let Err(e) = staged.close() {
            warn!("failed to remove staged payload for {:?}: {}", record.name, e);
        }

        result?;
        Ok(output)
    }
}

/// Join `name` under `root`, refusing anything that could climb out of it
pub fn destination(root: &Path, name: &str) -> Result<PathBuf, EntryError> {
    let mut path = root.to_path_buf();
    let mut depth = 0;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::RootDir | Component::CurDir => (),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(EntryError::UnsafeName(name.to_string()))
            }
        }
    }

    if depth == 0 {
        return Err(EntryError::UnsafeName(name.to_string()));
    }
    Ok(path)
}

fn split_key<'a>(record: &EntryRecord<'a>) -> Result<Option<(&'a [u8], &'a [u8])>, EntryError> {
    if !record.method.is_keyed() {
        return Ok(None);
    }
    if record.payload.len() < KEY_LEN {
        return Err(EntryError::KeyTooShort {
            size: record.payload.len(),
        });
    }
    Ok(Some(record.payload.split_at(KEY_LEN)))
}

fn stage(
    dir: &Path,
    payload: &[u8],
    split: Option<(&[u8], &[u8])>,
) -> Result<NamedTempFile, EntryError> {
    let mut staged = tempfile::Builder::new()
        .prefix(".staged-")
        .suffix(".bin")
        .tempfile_in(dir)?;

    match split {
        Some((key, body)) => {
            staged.write_all(key)?;
            staged.write_all(body)?;
        }
        None => staged.write_all(payload)?,
    }
    staged.flush()?;

    Ok(staged)
}

#[cfg(test)]
mod test_extractor {
    use super::*;
    use crate::entry::Method;
    use crate::sink::MemSink;
    use crate::transform::test_support::CopyTransform;
    use std::fs;

    fn record<'a>(name: &str, method: Method, payload: &'a [u8]) -> EntryRecord<'a> {
        EntryRecord {
            offset: 5,
            name: name.to_string(),
            original_size: payload.len() as u64,
            processed_size: payload.len() as u64,
            method,
            payload,
        }
    }

    #[test]
    fn destination_paths() {
        let root = Path::new("out");
        assert_eq!(destination(root, "a.txt").unwrap(), root.join("a.txt"));
        assert_eq!(destination(root, "d/e/f.txt").unwrap(), root.join("d/e/f.txt"));
        assert_eq!(destination(root, "/etc/passwd").unwrap(), root.join("etc/passwd"));
        assert_eq!(destination(root, "./x/./y").unwrap(), root.join("x/y"));
    }

    #[test]
    fn destination_rejects_escape() {
        let root = Path::new("out");
        for name in ["../evil", "a/../../evil", "", "/", "."] {
            assert!(
                matches!(destination(root, name), Err(EntryError::UnsafeName(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn plain_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path(), CopyTransform::default());
        let mut sink = MemSink::new();

        let out = extractor
            .extract(&record("a.txt", Method::None, b"xyz"), &mut sink)
            .unwrap();

        assert_eq!(out, dir.path().join("a.txt"));
        assert_eq!(fs::read(&out).unwrap(), b"xyz");

        let call = &extractor.transform().calls[0];
        assert_eq!(call.method, Method::None);
        assert_eq!(call.staged, b"xyz");
        assert_eq!(call.original_size, 3);
        assert_eq!(call.output, dir.path().join("a.txt"));
    }

    #[test]
    fn nested_directories_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path(), CopyTransform::default());
        let mut sink = MemSink::new();

        extractor
            .extract(&record("x/y/z.bin", Method::Zlib, b"1"), &mut sink)
            .unwrap();
        // Existing directories are fine
        extractor
            .extract(&record("x/y/w.bin", Method::Zlib, b"2"), &mut sink)
            .unwrap();

        assert!(dir.path().join("x/y").is_dir());
        assert_eq!(fs::read(dir.path().join("x/y/w.bin")).unwrap(), b"2");
    }

    #[test]
    fn keyed_payload_staged_key_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path(), CopyTransform::default());
        let mut sink = MemSink::new();

        let mut payload = vec![b'k'; KEY_LEN];
        payload.extend_from_slice(b"ciphertext");
        extractor
            .extract(&record("secret", Method::Fernet, &payload), &mut sink)
            .unwrap();

        let call = &extractor.transform().calls[0];
        assert_eq!(call.method, Method::Fernet);
        assert_eq!(&call.staged[..KEY_LEN], &payload[..KEY_LEN]);
        assert_eq!(&call.staged[KEY_LEN..], b"ciphertext");
    }

    #[test]
    fn keyed_payload_too_short() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path(), CopyTransform::default());

        let err = extractor
            .extract(&record("secret", Method::Fernet, &[0; 10]), &mut MemSink::new())
            .unwrap_err();

        assert!(matches!(err, EntryError::KeyTooShort { size: 10 }));
        assert!(extractor.transform().calls.is_empty());
    }

    #[test]
    fn keyed_payload_too_short_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path(), CopyTransform::default());

        let err = extractor
            .extract(&record("deep/dir/k", Method::Fernet, &[0; 5]), &mut MemSink::new())
            .unwrap_err();

        assert!(matches!(err, EntryError::KeyTooShort { size: 5 }));
        assert!(!dir.path().join("deep").exists());
    }

    #[test]
    fn reserved_path_refused() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("metadata.txt");
        let mut extractor =
            Extractor::new(dir.path(), CopyTransform::default()).with_reserved(&report);

        let err = extractor
            .extract(&record("./metadata.txt", Method::None, b"x"), &mut MemSink::new())
            .unwrap_err();

        assert!(matches!(err, EntryError::UnsafeName(name) if name == "./metadata.txt"));
        assert!(!report.exists());
        assert!(extractor.transform().calls.is_empty());

        // Same name further down the tree is fine
        extractor
            .extract(&record("sub/metadata.txt", Method::None, b"y"), &mut MemSink::new())
            .unwrap();
    }

    #[test]
    fn staged_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let staging = dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();

        let mut extractor = Extractor::new(&out, CopyTransform {
            calls: vec![],
            fail_on: Some("bad.txt".to_string()),
        })
        .with_staging_dir(&staging);
        let mut sink = MemSink::new();

        extractor
            .extract(&record("good.txt", Method::None, b"1"), &mut sink)
            .unwrap();
        let err = extractor
            .extract(&record("bad.txt", Method::None, b"2"), &mut sink)
            .unwrap_err();

        assert!(matches!(err, EntryError::Transform(_)));
        assert_eq!(sink.lines, vec!["copy refused"]);

        let calls = &extractor.transform().calls;
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert!(call.input.starts_with(&staging));
            assert!(!call.input.exists());
        }
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn unsafe_name_not_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path().join("out"), CopyTransform::default());

        let err = extractor
            .extract(&record("../escape", Method::None, b"1"), &mut MemSink::new())
            .unwrap_err();

        assert!(matches!(err, EntryError::UnsafeName(_)));
        assert!(!dir.path().join("escape").exists());
        assert!(extractor.transform().calls.is_empty());
    }
}
