//! Upload validation.
//!
//! Checks, in order: the upload is non-empty, its declared size is within
//! the limit, its extension is one of `pdf`, `txt`, `md`, and, for PDFs, the
//! first bytes of the actual stream are the `%PDF-` signature.
//!
//! The signature check consumes the head of the stream; the bytes read are
//! kept in [`ValidatedUpload`] and replayed in front of the remaining stream
//! by [`ValidatedUpload::into_reader`].

use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ValidationError;
use crate::extract::{MIME_MARKDOWN, MIME_PDF, MIME_TEXT};

/// Magic bytes every PDF file starts with.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// An incoming file as handed over by the transport boundary.
///
/// `declared_size` and `content_type` are client-supplied metadata and are
/// not trusted for anything beyond early rejection and record keeping.
#[derive(Debug)]
pub struct Upload<R> {
    pub filename: String,
    pub content_type: Option<String>,
    pub declared_size: u64,
    pub reader: R,
}

/// Accepted upload kinds, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
    Markdown,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "txt" => Some(FileKind::Text),
            "md" => Some(FileKind::Markdown),
            _ => None,
        }
    }

    /// MIME type implied by the extension.
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => MIME_PDF,
            FileKind::Text => MIME_TEXT,
            FileKind::Markdown => MIME_MARKDOWN,
        }
    }
}

/// An upload that passed every check.
#[derive(Debug)]
pub struct ValidatedUpload<R> {
    pub filename: String,
    pub content_type: Option<String>,
    pub declared_size: u64,
    pub kind: FileKind,
    head: Vec<u8>,
    reader: R,
}

impl<R: AsyncRead + Unpin> ValidatedUpload<R> {
    /// The full byte stream, including the head consumed during validation.
    pub fn into_reader(self) -> impl AsyncRead + Unpin {
        Cursor::new(self.head).chain(self.reader)
    }
}

/// Validate an upload against `max_bytes`.
pub async fn validate_upload<R: AsyncRead + Unpin>(
    upload: Upload<R>,
    max_bytes: u64,
) -> Result<ValidatedUpload<R>, ValidationError> {
    let Upload {
        filename,
        content_type,
        declared_size,
        mut reader,
    } = upload;

    let head = read_head(&mut reader, PDF_SIGNATURE.len())
        .await
        .map_err(ValidationError::Unreadable)?;

    if declared_size == 0 || head.is_empty() {
        return Err(ValidationError::Empty);
    }
    if declared_size > max_bytes {
        return Err(ValidationError::TooLarge {
            size: declared_size,
            max: max_bytes,
        });
    }

    let kind = FileKind::from_filename(&filename).ok_or_else(|| {
        ValidationError::UnsupportedType {
            filename: filename.clone(),
        }
    })?;

    if kind == FileKind::Pdf && head != PDF_SIGNATURE {
        return Err(ValidationError::BadSignature);
    }

    Ok(ValidatedUpload {
        filename,
        content_type,
        declared_size,
        kind,
        head,
        reader,
    })
}

/// Read up to `len` bytes, stopping early only at end of stream.
async fn read_head<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> std::io::Result<Vec<u8>> {
    let mut head = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    Ok(head)
}
