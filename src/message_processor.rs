use mailparse::body::Body;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;

/// Headers and attachments of one fetched email.
#[derive(Debug, Default)]
pub struct ParsedMessage {
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.filename.to_lowercase().ends_with(".pdf")
    }
}

/// Parse a raw RFC 822 message into the headers we report on and its attachments.
pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage> {
    let mail = mailparse::parse_mail(raw)?;

    let subject = get_header(&mail, "Subject").unwrap_or_else(|| "No Subject".to_string());
    let sender = get_header(&mail, "From").unwrap_or_else(|| "Unknown Sender".to_string());
    let date = get_header(&mail, "Date").unwrap_or_else(|| "Unknown Date".to_string());

    let mut attachments = Vec::new();
    collect_attachments(&mail, &mut attachments);

    Ok(ParsedMessage {
        subject,
        sender,
        date,
        attachments,
    })
}

/// Header value with encoded words decoded, `None` if absent or blank.
fn get_header(mail: &ParsedMail<'_>, name: &str) -> Option<String> {
    mail.headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Walk the MIME tree in document order and keep every leaf part that is
/// marked as an attachment and has a file name.
fn collect_attachments(part: &ParsedMail<'_>, out: &mut Vec<Attachment>) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_attachments(sub, out);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    if !matches!(disposition.disposition, DispositionType::Attachment) {
        return;
    }

    let Some(raw_name) = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
    else {
        warn!(mime = %part.ctype.mimetype, "Attachment without a file name, skipped");
        return;
    };

    let filename = decode_filename(raw_name);
    let data = body_bytes(part, &filename);
    info!(filename = %filename, bytes = data.len(), "Attachment found");
    out.push(Attachment { filename, data });
}

/// Decode RFC 2047 encoded words in a file name (`=?utf-8?B?...?=`).
///
/// Anything that does not decode cleanly is returned unchanged.
pub fn decode_filename(raw: &str) -> String {
    if !(raw.contains("=?") && raw.contains("?=")) {
        return raw.to_string();
    }

    let line = format!("X-Filename: {raw}");
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => {
            let decoded = header.get_value();
            if decoded.trim().is_empty() {
                raw.to_string()
            } else {
                decoded
            }
        }
        Err(e) => {
            warn!(error = %e, name = %raw, "Could not decode file name, keeping raw name");
            raw.to_string()
        }
    }
}

/// Decoded body of a part; on a transfer-encoding error, the encoded bytes.
fn body_bytes(part: &ParsedMail<'_>, filename: &str) -> Vec<u8> {
    match part.get_body_raw() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, filename = %filename, "Body decode failed, keeping raw bytes");
            match part.get_body_encoded() {
                Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
                Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
                Body::Binary(body) => body.get_raw().to_vec(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scratch copies
// ---------------------------------------------------------------------------

/// Write an attachment under `dir`, prefixed with a short content hash so two
/// attachments with the same name do not overwrite each other.
pub fn save_attachment(dir: &Path, attachment: &Attachment) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let digest = Sha256::digest(&attachment.data);
    let prefix: String = format!("{digest:x}").chars().take(12).collect();
    let path = dir.join(format!("{prefix}_{}", sanitize_filename(&attachment.filename)));

    fs::write(&path, &attachment.data)?;
    info!(path = %path.display(), "Saved attachment");
    Ok(path)
}

/// Keep only the final path component and drop characters that are not
/// safe in a file name.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
