//! Seekable byte channel used as the body of requests and responses.
//!
//! # Design
//! A `Stream` owns exactly one boxed I/O handle plus a small metadata
//! record (mode, seekability, backing path, cached size). Read/write
//! permission comes from an fopen-style mode string, so a handle opened
//! `"r"` refuses writes even though the underlying type could write.
//! Closing or detaching drops the handle; every later operation fails
//! with `StreamState` instead of touching freed state.
//!
//! `to_string_lossy` is the one infallible path: it rewinds and reads to
//! the end, rendering any failure as an empty string.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, Whence};

const READABLE_MODES: &[&str] = &[
    "r", "w+", "r+", "x+", "c+", "rb", "w+b", "r+b", "x+b", "c+b", "rt", "w+t", "r+t", "x+t", "c+t", "a+",
];

const WRITABLE_MODES: &[&str] = &[
    "w", "w+", "rw", "r+", "x+", "c+", "wb", "w+b", "r+b", "x+b", "c+b", "w+t", "r+t", "x+t", "c+t", "a", "a+",
];

/// Anything a `Stream` can wrap.
pub trait Handle: Read + Write + Seek + Send {
    /// Size as reported by the handle's stat facility.
    fn stat_size(&self) -> Option<u64>;
}

impl Handle for File {
    fn stat_size(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}

impl Handle for Cursor<Vec<u8>> {
    fn stat_size(&self) -> Option<u64> {
        Some(self.get_ref().len() as u64)
    }
}

/// Descriptive data about the wrapped handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub mode: String,
    pub seekable: bool,
    pub uri: Option<PathBuf>,
    /// Cached size; cleared by every write.
    pub size: Option<u64>,
}

impl Metadata {
    pub fn new(mode: &str) -> Self {
        Self {
            mode: mode.to_string(),
            seekable: true,
            uri: None,
            size: None,
        }
    }

    pub fn seekable(mut self, seekable: bool) -> Self {
        self.seekable = seekable;
        self
    }
}

/// A body stream. See the module docs.
pub struct Stream {
    handle: Option<Box<dyn Handle>>,
    meta: Metadata,
    eof: bool,
}

impl Stream {
    pub fn new(handle: Box<dyn Handle>, meta: Metadata) -> Self {
        Self {
            handle: Some(handle),
            meta,
            eof: false,
        }
    }

    /// An empty in-memory read/write stream.
    pub fn memory() -> Self {
        Self::new(Box::new(Cursor::new(Vec::new())), Metadata::new("w+b"))
    }

    /// An in-memory read/write stream holding `bytes`, positioned at the start.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Box::new(Cursor::new(bytes.into())), Metadata::new("w+b"))
    }

    /// Open a file with an fopen-style mode (`r`, `r+`, `w`, `w+`, `a`, `a+`,
    /// `x`, `x+`, `c`, `c+`, optionally suffixed with `b` or `t`).
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let path = path.as_ref();
        let base: String = mode.chars().filter(|c| *c != 'b' && *c != 't').collect();
        let mut options = OpenOptions::new();
        match base.as_str() {
            "r" => options.read(true),
            "r+" | "rw" => options.read(true).write(true),
            "w" => options.write(true).create(true).truncate(true),
            "w+" => options.read(true).write(true).create(true).truncate(true),
            "a" => options.append(true).create(true),
            "a+" => options.read(true).append(true).create(true),
            "x" => options.write(true).create_new(true),
            "x+" => options.read(true).write(true).create_new(true),
            "c" => options.write(true).create(true),
            "c+" => options.read(true).write(true).create(true),
            _ => return Err(Error::invalid_input(format!("invalid stream mode: {mode}"))),
        };
        let file = options.open(path)?;
        let meta = Metadata {
            uri: Some(path.to_path_buf()),
            ..Metadata::new(mode)
        };
        Ok(Self::new(Box::new(file), meta))
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.handle.is_some() && READABLE_MODES.contains(&self.meta.mode.as_str())
    }

    pub fn is_writable(&self) -> bool {
        self.handle.is_some() && WRITABLE_MODES.contains(&self.meta.mode.as_str())
    }

    pub fn is_seekable(&self) -> bool {
        self.handle.is_some() && self.meta.seekable
    }

    fn handle(&mut self) -> Result<&mut Box<dyn Handle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::stream_state("stream is detached"))
    }

    /// Read up to `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if !self.is_readable() {
            return Err(Error::stream_state("stream is not readable"));
        }
        let mut buf = Vec::new();
        let read = self.handle()?.take(len as u64).read_to_end(&mut buf)?;
        if read < len {
            self.eof = true;
        }
        Ok(buf)
    }

    /// Write `bytes`, returning how many were written. Invalidates the cached size.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if !self.is_writable() {
            return Err(Error::stream_state("stream is not writable"));
        }
        self.meta.size = None;
        self.handle()?.write_all(bytes)?;
        Ok(bytes.len())
    }

    /// Move the cursor. Returns the new absolute position.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if !self.is_attached() {
            return Err(Error::stream_state("stream is detached"));
        }
        if !self.meta.seekable {
            return Err(Error::NotSeekable);
        }
        let pos = match whence {
            Whence::Set => {
                let start = u64::try_from(offset).map_err(|_| Error::seek_failed(offset, whence))?;
                SeekFrom::Start(start)
            }
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let pos = self
            .handle()?
            .seek(pos)
            .map_err(|_| Error::seek_failed(offset, whence))?;
        self.eof = false;
        Ok(pos)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0, Whence::Set).map(|_| ())
    }

    /// Current cursor position.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.handle()?.stream_position()?)
    }

    /// True once a read hit the end of the data, or when detached.
    pub fn eof(&self) -> bool {
        self.handle.is_none() || self.eof
    }

    /// Total size, cached until the next write. `None` when detached or unknown.
    pub fn size(&mut self) -> Option<u64> {
        let handle = self.handle.as_ref()?;
        if self.meta.size.is_none() {
            self.meta.size = handle.stat_size();
        }
        self.meta.size
    }

    /// Everything from the cursor to the end.
    pub fn contents(&mut self) -> Result<Vec<u8>> {
        if !self.is_readable() {
            return Err(Error::stream_state("cannot read stream contents"));
        }
        let mut buf = Vec::new();
        self.handle()?.read_to_end(&mut buf)?;
        self.eof = true;
        Ok(buf)
    }

    /// Everything from the cursor to the end, decoded as UTF-8 (lossy).
    pub fn contents_string(&mut self) -> Result<String> {
        let bytes = self.contents()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drop the handle. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.detach() {
            let _ = handle.flush();
        }
    }

    /// Take the handle out, leaving the stream unusable.
    pub fn detach(&mut self) -> Option<Box<dyn Handle>> {
        let handle = self.handle.take();
        self.meta = Metadata::new("");
        self.meta.seekable = false;
        self.eof = true;
        handle
    }

    /// Full contents from the start, decoded lossily. Never fails: any
    /// error renders as an empty string.
    pub fn to_string_lossy(&mut self) -> String {
        if self.rewind().is_err() {
            return String::new();
        }
        self.contents_string().unwrap_or_default()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::memory()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("attached", &self.handle.is_some())
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

    #[test]
    fn file_stream_reads_writes_and_seeks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, LOREM).unwrap();

        let mut stream = Stream::open(&path, "r+").unwrap();
        assert!(stream.is_readable());
        assert!(stream.is_writable());
        assert!(stream.is_seekable());
        assert_eq!(stream.size(), Some(LOREM.len() as u64));
        assert_eq!(stream.metadata().uri.as_deref(), Some(path.as_path()));

        assert_eq!(stream.tell().unwrap(), 0);
        assert_eq!(stream.read(11).unwrap(), b"Lorem ipsum");
        assert_eq!(stream.tell().unwrap(), 11);
        assert!(!stream.eof());

        stream.rewind().unwrap();
        assert_eq!(stream.contents_string().unwrap(), LOREM);
        assert!(stream.eof());

        let end = stream.seek(0, Whence::End).unwrap();
        assert_eq!(end, LOREM.len() as u64);
        assert_eq!(stream.write(b"hello world!").unwrap(), 12);
        assert_eq!(stream.size(), Some(LOREM.len() as u64 + 12));

        stream.seek(0, Whence::Set).unwrap();
        assert_eq!(stream.contents_string().unwrap(), format!("{LOREM}hello world!"));
        assert_eq!(stream.to_string_lossy(), format!("{LOREM}hello world!"));
    }

    #[test]
    fn oversized_read_returns_what_is_there() {
        let mut stream = Stream::from_bytes("abc");
        assert_eq!(stream.read(usize::MAX).unwrap(), b"abc");
        assert!(stream.eof());
    }

    #[test]
    fn read_only_stream_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.txt");
        std::fs::write(&path, "abc").unwrap();

        let mut stream = Stream::open(&path, "r").unwrap();
        assert!(!stream.is_writable());
        assert!(matches!(stream.write(b"x"), Err(Error::StreamState { .. })));
        assert_eq!(stream.contents().unwrap(), b"abc");
    }

    #[test]
    fn write_only_stream_refuses_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Stream::open(dir.path().join("wo.txt"), "w").unwrap();
        assert!(matches!(stream.read(1), Err(Error::StreamState { .. })));
        assert!(matches!(stream.contents(), Err(Error::StreamState { .. })));
        assert_eq!(stream.to_string_lossy(), "");
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Stream::open(dir.path().join("f"), "q");
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn memory_stream_round_trip() {
        let mut stream = Stream::memory();
        assert_eq!(stream.size(), Some(0));
        stream.write(b"missing").unwrap();
        assert_eq!(stream.size(), Some(7));
        assert_eq!(stream.contents().unwrap(), b"");
        assert_eq!(stream.to_string_lossy(), "missing");
    }

    #[test]
    fn unseekable_handle() {
        let meta = Metadata::new("r").seekable(false);
        let mut stream = Stream::new(Box::new(Cursor::new(b"abc".to_vec())), meta);
        assert!(!stream.is_seekable());
        assert!(matches!(stream.seek(1, Whence::Set), Err(Error::NotSeekable)));
        assert_eq!(stream.read(3).unwrap(), b"abc");
        assert_eq!(stream.to_string_lossy(), "");
    }

    #[test]
    fn negative_absolute_seek_fails() {
        let mut stream = Stream::from_bytes("abc");
        assert!(matches!(
            stream.seek(-1, Whence::Set),
            Err(Error::SeekFailed { offset: -1, whence: Whence::Set })
        ));
        assert_eq!(stream.seek(-1, Whence::End).unwrap(), 2);
        assert_eq!(stream.read(5).unwrap(), b"c");
        assert!(stream.eof());
    }

    #[test]
    fn detached_stream_is_unusable() {
        let mut stream = Stream::from_bytes("abc");
        let handle = stream.detach();
        assert!(handle.is_some());
        assert!(!stream.is_attached());
        assert!(stream.eof());
        assert_eq!(stream.size(), None);
        assert!(matches!(stream.read(1), Err(Error::StreamState { .. })));
        assert!(matches!(stream.write(b"x"), Err(Error::StreamState { .. })));
        assert!(matches!(stream.seek(0, Whence::Set), Err(Error::StreamState { .. })));
        assert!(matches!(stream.tell(), Err(Error::StreamState { .. })));
        assert_eq!(stream.to_string_lossy(), "");
        assert!(stream.detach().is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let mut stream = Stream::from_bytes("abc");
        stream.close();
        stream.close();
        assert!(matches!(stream.contents(), Err(Error::StreamState { .. })));
    }
}
