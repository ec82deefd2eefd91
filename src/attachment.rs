//! Attachment extraction and the support policy
//!
//! Attachments are pulled out of a raw RFC 2822 message with
//! `mail-parser`. Whether one is worth keeping is decided purely by the
//! filename extension; the content is never inspected.

use crate::error::{Error, Result};
use mail_parser::{MessageParser, MimeHeaders};
use std::collections::BTreeSet;
use std::path::Path;

/// Extensions kept by default, without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "xlsx", "jpg", "zip", "rar", "docx"];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest filename most filesystems accept (`NAME_MAX`).
const MAX_FILENAME_BYTES: usize = 255;

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename from `Content-Disposition` or the `name` parameter of
    /// `Content-Type`, if the sender supplied one.
    pub filename: Option<String>,
    /// MIME type as `type/subtype`.
    pub content_type: String,
    /// Decoded bytes.
    pub content: Vec<u8>,
}

impl Attachment {
    /// The MIME subtype (the text after the `/`).
    #[must_use]
    pub fn subtype(&self) -> &str {
        self.content_type
            .split_once('/')
            .map_or("bin", |(_, subtype)| subtype)
    }

    /// Filename used on disk.
    ///
    /// The sender's filename reduced to its last path component, without
    /// control characters and at most 255 bytes long, or
    /// `attachment_<seq>_<index + 1>.<subtype>` when nothing usable is
    /// left. `index` is the zero-based position of the attachment within
    /// its message.
    #[must_use]
    pub fn target_filename(&self, seq: u32, index: usize) -> String {
        self.filename
            .as_deref()
            .and_then(file_name_only)
            .unwrap_or_else(|| format!("attachment_{seq}_{}.{}", index + 1, self.subtype()))
    }
}

/// Reduce a sender-supplied filename to something safe to create
/// inside the output directory.
fn file_name_only(name: &str) -> Option<String> {
    let printable: String = name.chars().filter(|c| !c.is_control()).collect();
    let last = printable.rsplit(['/', '\\']).next()?.trim();
    let base = Path::new(last).file_name()?.to_str()?;
    (!base.is_empty()).then(|| truncate_keeping_extension(base, MAX_FILENAME_BYTES))
}

/// Shorten `name` to `max` bytes, cutting the stem so the extension
/// survives.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max => name.split_at(dot),
        _ => (name, ""),
    };
    let mut end = max - ext.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ext}", &stem[..end])
}

/// Parse a raw message and return its attachments in MIME order.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the bytes are not a parseable message.
pub fn extract_attachments(seq: u32, raw: &[u8]) -> Result<Vec<Attachment>> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse(format!("Message {seq} is not a valid RFC 2822 message")))?;

    let attachments = message
        .attachments()
        .map(|part| {
            let content_type = part.content_type().map_or_else(
                || DEFAULT_CONTENT_TYPE.to_string(),
                |ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                },
            );
            Attachment {
                filename: part.attachment_name().map(ToString::to_string),
                content_type: content_type.to_lowercase(),
                content: part.contents().to_vec(),
            }
        })
        .collect();

    Ok(attachments)
}

/// Extension whitelist deciding which attachments are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFilter {
    extensions: BTreeSet<String>,
}

impl Default for AttachmentFilter {
    fn default() -> Self {
        Self::new(SUPPORTED_EXTENSIONS.iter().copied())
    }
}

impl AttachmentFilter {
    /// Build a filter from extensions, with or without a leading dot.
    /// Matching is case-insensitive.
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Extensions in the whitelist, without dots, sorted.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// True when no extension is accepted at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Whether an attachment should be saved.
    ///
    /// Attachments without a filename, and filenames without a `.`,
    /// are never supported.
    #[must_use]
    pub fn is_supported(&self, attachment: &Attachment) -> bool {
        attachment
            .filename
            .as_deref()
            .is_some_and(|name| self.is_supported_name(name))
    }

    /// Whether a filename carries a whitelisted extension.
    #[must_use]
    pub fn is_supported_name(&self, filename: &str) -> bool {
        filename
            .to_lowercase()
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.contains(ext))
    }
}
