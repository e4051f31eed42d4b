//! Work items and their wire token
//!
//! A work item is one filesystem entry plus the type reported for it by the
//! parent directory read. It travels through the work queue as a [`Token`]:
//! one tag byte followed by the raw bytes of the absolute path.
//!
//! ```text
//! b'd' | b"/scratch/run-1/dir-07"
//!  tag    path (OsStr bytes, no escaping)
//! ```

use crate::error::{CodecError, CodecResult};
use std::ffi::OsStr;
use std::fmt;
use std::fs::FileType;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

/// Default maximum encoded path length in bytes
pub const DEFAULT_MAX_PATH_LEN: usize = 8192;

/// Type of a directory entry, as reported by the parent listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryTag {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Named pipe (FIFO)
    Fifo,
    /// Symbolic link
    Symlink,
    /// Unix socket
    Socket,
    /// Type not reported by the listing
    Unknown,
}

impl EntryTag {
    /// Map a raw `d_type` value from a directory read.
    ///
    /// Total over `u8`: anything outside the known set is [`EntryTag::Unknown`].
    pub fn classify(d_type: u8) -> Self {
        match d_type {
            libc::DT_BLK => EntryTag::BlockDevice,
            libc::DT_CHR => EntryTag::CharDevice,
            libc::DT_DIR => EntryTag::Directory,
            libc::DT_FIFO => EntryTag::Fifo,
            libc::DT_LNK => EntryTag::Symlink,
            libc::DT_REG => EntryTag::File,
            libc::DT_SOCK => EntryTag::Socket,
            _ => EntryTag::Unknown,
        }
    }

    /// Map the file type std reports for a directory entry.
    ///
    /// `None` (the type query failed) maps to [`EntryTag::Unknown`].
    pub fn from_file_type(file_type: Option<FileType>) -> Self {
        Self::classify(file_type.map_or(libc::DT_UNKNOWN, raw_d_type))
    }

    /// The one-byte tag used on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            EntryTag::File => b'f',
            EntryTag::Directory => b'd',
            EntryTag::BlockDevice => b'b',
            EntryTag::CharDevice => b'c',
            EntryTag::Fifo => b'F',
            EntryTag::Symlink => b'l',
            EntryTag::Socket => b's',
            EntryTag::Unknown => b'u',
        }
    }

    /// Parse a wire tag byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'f' => Some(EntryTag::File),
            b'd' => Some(EntryTag::Directory),
            b'b' => Some(EntryTag::BlockDevice),
            b'c' => Some(EntryTag::CharDevice),
            b'F' => Some(EntryTag::Fifo),
            b'l' => Some(EntryTag::Symlink),
            b's' => Some(EntryTag::Socket),
            b'u' => Some(EntryTag::Unknown),
            _ => None,
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryTag::Directory
    }
}

/// `d_type` equivalent of a std file type
fn raw_d_type(ft: FileType) -> u8 {
    if ft.is_dir() {
        libc::DT_DIR
    } else if ft.is_file() {
        libc::DT_REG
    } else if ft.is_symlink() {
        libc::DT_LNK
    } else if ft.is_block_device() {
        libc::DT_BLK
    } else if ft.is_char_device() {
        libc::DT_CHR
    } else if ft.is_fifo() {
        libc::DT_FIFO
    } else if ft.is_socket() {
        libc::DT_SOCK
    } else {
        libc::DT_UNKNOWN
    }
}

/// Encoded work item as carried by the queue
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(Box<[u8]>);

impl Token {
    /// Raw token bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes (tag included)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tokens produced by the codec are never empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wrap raw bytes received from elsewhere; validated on decode
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A decoded unit of traversal work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub tag: EntryTag,
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(tag: EntryTag, path: impl Into<PathBuf>) -> Self {
        Self {
            tag,
            path: path.into(),
        }
    }
}

/// Encodes and decodes work tokens under a fixed path length limit
#[derive(Debug, Clone, Copy)]
pub struct PathCodec {
    max_path_len: usize,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH_LEN)
    }
}

impl PathCodec {
    pub fn new(max_path_len: usize) -> Self {
        Self { max_path_len }
    }

    /// Encode the traversal root
    pub fn encode_root(&self, root: &Path) -> CodecResult<Token> {
        let path = root.as_os_str().as_bytes();
        self.check_len(path.len(), || root.display().to_string())?;

        let mut buf = Vec::with_capacity(path.len() + 1);
        buf.push(EntryTag::Directory.as_byte());
        buf.extend_from_slice(path);
        Ok(Token(buf.into_boxed_slice()))
    }

    /// Encode `parent/child` with the given tag
    pub fn encode(&self, parent: &Path, child: &OsStr, tag: EntryTag) -> CodecResult<Token> {
        let parent = parent.as_os_str().as_bytes();
        let child = child.as_bytes();

        // "/" as parent must not produce "//name"
        let needs_sep = !parent.ends_with(b"/");
        let len = parent.len() + usize::from(needs_sep) + child.len();
        self.check_len(len, || {
            format!(
                "{}/{}",
                String::from_utf8_lossy(parent),
                String::from_utf8_lossy(child)
            )
        })?;

        let mut buf = Vec::with_capacity(len + 1);
        buf.push(tag.as_byte());
        buf.extend_from_slice(parent);
        if needs_sep {
            buf.push(b'/');
        }
        buf.extend_from_slice(child);
        Ok(Token(buf.into_boxed_slice()))
    }

    /// Split a token back into tag and path
    pub fn decode(&self, token: &Token) -> CodecResult<WorkItem> {
        let (&tag_byte, path) = token
            .as_bytes()
            .split_first()
            .ok_or_else(|| CodecError::Malformed("empty token".into()))?;

        let tag = EntryTag::from_byte(tag_byte).ok_or_else(|| {
            CodecError::Malformed(format!("unknown tag byte 0x{:02x}", tag_byte))
        })?;

        if path.is_empty() {
            return Err(CodecError::Malformed("token has no path".into()));
        }
        self.check_len(path.len(), || String::from_utf8_lossy(path).into_owned())?;

        Ok(WorkItem {
            tag,
            path: PathBuf::from(OsStr::from_bytes(path)),
        })
    }

    fn check_len(&self, len: usize, path: impl FnOnce() -> String) -> CodecResult<()> {
        if len > self.max_path_len {
            return Err(CodecError::PathTooLong {
                path: path(),
                len,
                max: self.max_path_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_types() {
        assert_eq!(EntryTag::classify(libc::DT_DIR), EntryTag::Directory);
        assert_eq!(EntryTag::classify(libc::DT_REG), EntryTag::File);
        assert_eq!(EntryTag::classify(libc::DT_LNK), EntryTag::Symlink);
        assert_eq!(EntryTag::classify(libc::DT_BLK), EntryTag::BlockDevice);
        assert_eq!(EntryTag::classify(libc::DT_CHR), EntryTag::CharDevice);
        assert_eq!(EntryTag::classify(libc::DT_FIFO), EntryTag::Fifo);
        assert_eq!(EntryTag::classify(libc::DT_SOCK), EntryTag::Socket);
    }

    #[test]
    fn test_classify_is_total() {
        assert_eq!(EntryTag::classify(libc::DT_UNKNOWN), EntryTag::Unknown);
        assert_eq!(EntryTag::classify(200), EntryTag::Unknown);
        for raw in 0..=u8::MAX {
            let tag = EntryTag::classify(raw);
            assert_eq!(EntryTag::from_byte(tag.as_byte()), Some(tag));
        }
    }

    #[test]
    fn test_from_file_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::os::unix::fs::symlink("file", dir.path().join("link")).unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let entry = entry.unwrap();
            let tag = EntryTag::from_file_type(entry.file_type().ok());
            let expected = match entry.file_name().to_str().unwrap() {
                "file" => EntryTag::File,
                "sub" => EntryTag::Directory,
                "link" => EntryTag::Symlink,
                other => panic!("unexpected entry {}", other),
            };
            assert_eq!(tag, expected);
        }

        assert_eq!(EntryTag::from_file_type(None), EntryTag::Unknown);
    }

    #[test]
    fn test_encode_decode() {
        let codec = PathCodec::default();
        let token = codec
            .encode(Path::new("/data/run"), OsStr::new("file.01"), EntryTag::File)
            .unwrap();
        assert_eq!(token.as_bytes(), b"f/data/run/file.01");

        let item = codec.decode(&token).unwrap();
        assert_eq!(item.tag, EntryTag::File);
        assert_eq!(item.path, PathBuf::from("/data/run/file.01"));
    }

    #[test]
    fn test_encode_under_filesystem_root() {
        let codec = PathCodec::default();
        let token = codec
            .encode(Path::new("/"), OsStr::new("tmp"), EntryTag::Directory)
            .unwrap();
        assert_eq!(token.as_bytes(), b"d/tmp");
    }

    #[test]
    fn test_encode_root() {
        let codec = PathCodec::default();
        let token = codec.encode_root(Path::new("/scratch")).unwrap();
        assert_eq!(token.as_bytes(), b"d/scratch");
    }

    #[test]
    fn test_non_utf8_name_survives() {
        let codec = PathCodec::default();
        let name = OsStr::from_bytes(b"bad\xffname");
        let token = codec.encode(Path::new("/d"), name, EntryTag::File).unwrap();
        let item = codec.decode(&token).unwrap();
        assert_eq!(item.path.as_os_str().as_bytes(), b"/d/bad\xffname");
    }

    #[test]
    fn test_path_too_long() {
        let codec = PathCodec::new(16);
        let err = codec
            .encode(Path::new("/0123456789"), OsStr::new("abcdefgh"), EntryTag::File)
            .unwrap_err();
        assert!(matches!(err, CodecError::PathTooLong { len: 20, max: 16, .. }));

        // Exactly at the limit is fine
        assert!(codec
            .encode(Path::new("/0123456789"), OsStr::new("abcd"), EntryTag::File)
            .is_ok());
    }

    #[test]
    fn test_decode_malformed() {
        let codec = PathCodec::default();
        assert!(matches!(
            codec.decode(&Token::from_bytes(Vec::new())),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(&Token::from_bytes(b"x/path".to_vec())),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(&Token::from_bytes(b"d".to_vec())),
            Err(CodecError::Malformed(_))
        ));
    }
}
