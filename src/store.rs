//! Storage seams used by the round coordinator: where fragments and their
//! tags live, and where round records go.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::round::{RoundKind, RoundRecord};
use crate::tag::Tag;

/// Suffix of the tag file stored next to each fragment.
pub const TAG_SUFFIX: &str = ".tag";
pub const META_SUFFIX: &str = ".meta";

// Sidecar written with each fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FragmentMeta {
    stored_at: u32,
}

/// Read access to locally held fragments.
pub trait FragmentStore: Send + Sync {
    /// Fragments covered by a round of `kind` started at block `start`, in
    /// the order they will be proved.
    fn eligible_files(&self, kind: RoundKind, start: u32) -> Result<Vec<String>>;

    fn load_tag(&self, file_id: &str) -> Result<Tag>;

    fn read_fragment(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Fragments as plain files in one directory; tags as `<id>.tag` and the
/// stored-at height as `<id>.meta` in another.
#[derive(Debug, Clone)]
pub struct DirFragmentStore {
    fragment_dir: PathBuf,
    tag_dir: PathBuf,
}

impl DirFragmentStore {
    pub fn new(fragment_dir: impl Into<PathBuf>, tag_dir: impl Into<PathBuf>) -> Self {
        Self {
            fragment_dir: fragment_dir.into(),
            tag_dir: tag_dir.into(),
        }
    }

    /// Create both directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.fragment_dir)?;
        fs::create_dir_all(&self.tag_dir)?;
        Ok(())
    }

    pub fn fragment_path(&self, file_id: &str) -> PathBuf {
        self.fragment_dir.join(file_id)
    }

    pub fn tag_path(&self, file_id: &str) -> PathBuf {
        self.tag_dir.join(format!("{}{}", file_id, TAG_SUFFIX))
    }

    pub fn meta_path(&self, file_id: &str) -> PathBuf {
        self.tag_dir.join(format!("{}{}", file_id, META_SUFFIX))
    }

    /// Store a fragment received at chain height `stored_at`.
    pub fn write_fragment(&self, file_id: &str, data: &[u8], stored_at: u32) -> Result<()> {
        let meta = serde_json::to_vec(&FragmentMeta { stored_at })?;
        fs::write(self.meta_path(file_id), meta)?;
        fs::write(self.fragment_path(file_id), data)?;
        Ok(())
    }

    /// Chain height the fragment was stored at, `None` without a sidecar.
    pub fn stored_at(&self, file_id: &str) -> Result<Option<u32>> {
        match fs::read(self.meta_path(file_id)) {
            Ok(bytes) => {
                let meta: FragmentMeta = serde_json::from_slice(&bytes)?;
                Ok(Some(meta.stored_at))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store_tag(&self, file_id: &str, tag: &Tag) -> Result<()> {
        fs::write(self.tag_path(file_id), tag.to_json()?)?;
        Ok(())
    }
}

impl FragmentStore for DirFragmentStore {
    // Only fragments stored at or before the challenge height are covered.
    fn eligible_files(&self, kind: RoundKind, start: u32) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.fragment_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.stored_at(&name) {
                Ok(Some(height)) if height <= start => files.push(name),
                Ok(Some(height)) => {
                    debug!("{} stored at {} after challenge {}", name, height, start)
                }
                Ok(None) => warn!("{} has no stored-at height, skipped", name),
                Err(e) => warn!("cannot read stored-at height of {}: {}", name, e),
            }
        }
        files.sort();
        debug!(
            "{} round at {}: {} fragments eligible in {}",
            kind,
            start,
            files.len(),
            self.fragment_dir.display()
        );
        Ok(files)
    }

    fn load_tag(&self, file_id: &str) -> Result<Tag> {
        let bytes = fs::read(self.tag_path(file_id))?;
        Tag::from_json(&bytes)
    }

    fn read_fragment(&self, file_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.fragment_path(file_id))?)
    }
}

/// Destination for round records so an interrupted round can be resumed.
pub trait RecordSink: Send + Sync {
    fn save(&self, record: &RoundRecord) -> Result<()>;
}

/// Keeps the latest record as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonRecordFile {
    path: PathBuf,
}

impl JsonRecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved record, `None` if nothing was saved yet.
    pub fn load(&self) -> Result<Option<RoundRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) => RoundRecord::from_bytes(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RecordSink for JsonRecordFile {
    fn save(&self, record: &RoundRecord) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, record.to_bytes()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
