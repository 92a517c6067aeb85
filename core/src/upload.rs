//! Uploaded-file records and their one-shot relocation.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::stream::Stream;

/// The five-field record describing one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    /// Temporary location on the server.
    #[serde(default)]
    pub tmp_name: Option<PathBuf>,
    /// File name as sent by the client.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Media type as sent by the client.
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub error: i64,
}

/// An uploaded file. Once moved it can neither move again nor be streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFile {
    record: FileRecord,
    moved: bool,
}

impl UploadedFile {
    pub fn new(record: FileRecord) -> Self {
        Self { record, moved: false }
    }

    pub fn server_filename(&self) -> Option<&Path> {
        self.record.tmp_name.as_deref()
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.record.name.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.record.size
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.record.media_type.as_deref()
    }

    pub fn error(&self) -> i64 {
        self.record.error
    }

    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Open the temporary file for reading and writing.
    pub fn stream(&self) -> Result<Stream> {
        if self.moved {
            return Err(Error::stream_state("File has been already moved"));
        }
        let tmp = self
            .server_filename()
            .ok_or_else(|| Error::stream_state("upload has no temporary file"))?;
        Stream::open(tmp, "r+")
    }

    /// Move the temporary file into the existing directory `target` under
    /// its client file name. Returns the destination path.
    pub fn move_to(&mut self, target: impl AsRef<Path>) -> Result<PathBuf> {
        let target = target.as_ref();
        if !target.exists() {
            return Err(Error::invalid_input(format!("Invalid path: {}", target.display())));
        }
        if self.moved {
            return Err(Error::stream_state("File has been already moved"));
        }
        let tmp = self
            .record
            .tmp_name
            .clone()
            .ok_or_else(|| Error::stream_state("upload has no temporary file"))?;
        let name = match self.client_filename() {
            Some(name) => name.to_string(),
            None => tmp
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::invalid_input("upload has no file name"))?,
        };
        let dest = target.join(name);

        if let Err(e) = fs::rename(&tmp, &dest) {
            // Different filesystem: fall back to copy + remove.
            if e.kind() == io::ErrorKind::NotFound {
                return Err(e.into());
            }
            fs::copy(&tmp, &dest)?;
            fs::remove_file(&tmp)?;
        }
        self.moved = true;
        Ok(dest)
    }
}

/// A node of the uploaded-file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNode {
    File(UploadedFile),
    Group(BTreeMap<String, FileNode>),
}

/// Build the uploaded-file tree. A map carrying `tmp_name` is a record;
/// any other map or list is a nested group.
pub fn parse_files(files: &Map<String, Value>) -> Result<BTreeMap<String, FileNode>> {
    files
        .iter()
        .map(|(name, value)| Ok((name.clone(), parse_node(value)?)))
        .collect()
}

fn parse_node(value: &Value) -> Result<FileNode> {
    match value {
        Value::Object(map) if map.contains_key("tmp_name") => {
            let record: FileRecord = serde_json::from_value(value.clone())
                .map_err(|e| Error::invalid_input(format!("invalid upload record: {e}")))?;
            Ok(FileNode::File(UploadedFile::new(record)))
        }
        Value::Object(map) => Ok(FileNode::Group(parse_files(map)?)),
        Value::Array(items) => {
            let mut group = BTreeMap::new();
            for (i, item) in items.iter().enumerate() {
                group.insert(i.to_string(), parse_node(item)?);
            }
            Ok(FileNode::Group(group))
        }
        other => Err(Error::invalid_input(format!("invalid upload entry: {other}"))),
    }
}
