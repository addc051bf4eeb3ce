//! Content-type detection for kubeconfig sources
//!
//! Sources are classified by their leading bytes, never by file extension.

use std::io::Read;
use std::path::Path;

use crate::crypto::SALT_MAGIC;
use crate::error::{KubeError, Result};

/// Number of leading bytes inspected by [`classify_file`]
pub const SNIFF_LEN: usize = 512;

/// 7z archive signature
pub const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// What a kubeconfig source holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Readable text, used as-is
    Plaintext,

    /// Password-protected 7z archive
    EncryptedArchive,

    /// Opaque binary, assumed to be an OpenSSL encrypted stream
    EncryptedStream,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::EncryptedArchive => "encrypted-archive",
            Self::EncryptedStream => "encrypted-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A well-known binary format that is never a kubeconfig source
struct Signature {
    name: &'static str,
    /// (offset, bytes) pairs that must all match
    parts: &'static [(usize, &'static [u8])],
}

const KNOWN_SIGNATURES: &[Signature] = &[
    Signature {
        name: "zip",
        parts: &[(0, b"PK\x03\x04")],
    },
    Signature {
        name: "zip",
        parts: &[(0, b"PK\x05\x06")],
    },
    Signature {
        name: "gzip",
        parts: &[(0, &[0x1F, 0x8B])],
    },
    Signature {
        name: "bzip2",
        parts: &[(0, b"BZh"), (4, b"1AY&SY")],
    },
    Signature {
        name: "xz",
        parts: &[(0, &[0xFD, b'7', b'z', b'X', b'Z', 0x00])],
    },
    Signature {
        name: "zstd",
        parts: &[(0, &[0x28, 0xB5, 0x2F, 0xFD])],
    },
    Signature {
        name: "pdf",
        parts: &[(0, b"%PDF-")],
    },
    Signature {
        name: "png",
        parts: &[(0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])],
    },
    Signature {
        name: "jpeg",
        parts: &[(0, &[0xFF, 0xD8, 0xFF])],
    },
    Signature {
        name: "gif",
        parts: &[(0, b"GIF87a")],
    },
    Signature {
        name: "gif",
        parts: &[(0, b"GIF89a")],
    },
    Signature {
        name: "elf",
        parts: &[(0, &[0x7F, b'E', b'L', b'F'])],
    },
    Signature {
        name: "rar",
        parts: &[(0, b"Rar!\x1A\x07")],
    },
];

impl Signature {
    fn matches(&self, bytes: &[u8]) -> bool {
        self.parts.iter().all(|(offset, magic)| {
            bytes
                .get(*offset..offset + magic.len())
                .is_some_and(|window| window == *magic)
        })
    }
}

/// Classify raw source bytes
///
/// Returns `UnrecognizedFormat` for well-known binary formats (zip, gzip,
/// images, executables...) that can't hold a kubeconfig.
pub fn classify(bytes: &[u8]) -> Result<ContentType> {
    if bytes.starts_with(SEVEN_ZIP_MAGIC) {
        return Ok(ContentType::EncryptedArchive);
    }

    if bytes.starts_with(SALT_MAGIC) {
        return Ok(ContentType::EncryptedStream);
    }

    if let Some(signature) = KNOWN_SIGNATURES.iter().find(|s| s.matches(bytes)) {
        return Err(KubeError::UnrecognizedFormat {
            signature: signature.name.to_string(),
        });
    }

    if is_text(bytes) {
        Ok(ContentType::Plaintext)
    } else {
        Ok(ContentType::EncryptedStream)
    }
}

/// Classify a file from its first [`SNIFF_LEN`] bytes
pub fn classify_file(path: &Path) -> Result<ContentType> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KubeError::NotFound {
            path: path.to_path_buf(),
        },
        _ => KubeError::Io(e),
    })?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;

    classify(&head)
}

/// UTF-8 text without NUL or stray control bytes
///
/// A multibyte sequence cut off at the end of the buffer is accepted, since
/// the buffer is usually a truncated prefix of the file.
fn is_text(bytes: &[u8]) -> bool {
    let valid = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => {
            // Only the trailing incomplete sequence is invalid
            match std::str::from_utf8(&bytes[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    valid
        .chars()
        .all(|c| !c.is_ascii_control() || matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b'))
}
