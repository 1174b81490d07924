//! Mbox email ingestion source, grounded on
//! `original_source/src/sources/thunderbird/thunderbird_source.py`.
//!
//! No mbox-parsing crate ships in the teacher's or the pack's dependency
//! sets, so the `From ` separator-line scan below is a deliberate minimal
//! parser rather than a fabricated dependency.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use glob::Pattern;

use crate::domain::{now_iso8601, Document, DocumentPart, EmailScope, Scope};
use crate::error::AppError;
use crate::extractors::{ExtractorRegistry, MboxMessageExtractor, MimePart};
use crate::identity::{document_part_id, sha256_hex, source_instance_id, text_checksum};

use super::{IngestionSource, ShouldStop};

/// One raw message parsed out of the mbox, with its headers split from body.
struct RawMessage {
    headers: Vec<(String, String)>,
    body: String,
}

impl RawMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_mbox(path: &Path) -> std::io::Result<Vec<RawMessage>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut messages = Vec::new();
    let mut current_lines: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.starts_with("From ") && !current_lines.is_empty() {
            messages.push(parse_message(&current_lines));
            current_lines.clear();
        } else if line.starts_with("From ") {
            // first message separator, nothing buffered yet
            continue;
        } else {
            current_lines.push(line);
        }
    }
    if !current_lines.is_empty() {
        messages.push(parse_message(&current_lines));
    }
    Ok(messages)
}

fn parse_message(lines: &[String]) -> RawMessage {
    let mut headers = Vec::new();
    let mut body_start = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            body_start = idx + 1;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    let body = lines[body_start.min(lines.len())..].join("\n");
    RawMessage { headers, body }
}

/// Split a `Content-Type` header value into its type/subtype and its
/// `key=value` parameters (`boundary`, `charset`, ...), lower-casing the type
/// and parameter names and stripping surrounding quotes from values.
fn parse_content_type(value: &str) -> (String, HashMap<String, String>) {
    let mut segments = value.split(';');
    let ctype = segments.next().unwrap_or("text/plain").trim().to_lowercase();
    let mut params = HashMap::new();
    for segment in segments {
        if let Some((key, val)) = segment.split_once('=') {
            params.insert(key.trim().to_lowercase(), val.trim().trim_matches('"').to_string());
        }
    }
    (ctype, params)
}

fn header_lookup(headers: &[(String, String)], name: &str) -> Option<String> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
}

/// Split a MIME sub-part's own headers from its body, same rule as
/// [`parse_message`] but operating on an already-extracted slice of text
/// rather than the whole mbox message.
fn split_headers_body(raw: &str) -> (Vec<(String, String)>, String) {
    let lines: Vec<&str> = raw.split('\n').collect();
    let mut headers = Vec::new();
    let mut body_start = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            body_start = idx + 1;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    let body = lines[body_start.min(lines.len())..].join("\n");
    (headers, body)
}

/// Split a multipart body on its `--boundary` delimiter lines, discarding the
/// preamble before the first delimiter and the epilogue after the closing
/// `--boundary--` line.
fn split_multipart_body(body: &str, boundary: &str) -> Vec<String> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_part = false;

    for line in body.split('\n') {
        let trimmed = line.trim_end_matches('\r');
        if trimmed == close {
            if in_part {
                parts.push(current.trim_end_matches('\n').to_string());
            }
            break;
        }
        if trimmed == open {
            if in_part {
                parts.push(current.trim_end_matches('\n').to_string());
            }
            current = String::new();
            in_part = true;
            continue;
        }
        if in_part {
            current.push_str(line);
            current.push('\n');
        }
    }
    parts
}

fn decode_transfer_encoding(body: &str, encoding: Option<&str>) -> Vec<u8> {
    match encoding.map(|e| e.to_lowercase()) {
        Some(ref enc) if enc == "base64" => {
            let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .unwrap_or_else(|_| body.as_bytes().to_vec())
        }
        _ => body.as_bytes().to_vec(),
    }
}

/// Walk a message's (or sub-part's) `Content-Type` recursively, the Rust
/// analogue of `email.message.walk()`: a non-multipart body yields exactly
/// one [`MimePart`], a `multipart/*` body is split on its boundary and each
/// sub-part is walked in turn, so nested containers (`multipart/mixed`
/// wrapping a `multipart/alternative`) flatten out into a single leaf list.
fn collect_mime_parts(content_type: Option<&str>, transfer_encoding: Option<&str>, body: &str) -> Vec<MimePart> {
    let (ctype, params) = match content_type {
        Some(value) => parse_content_type(value),
        None => ("text/plain".to_string(), HashMap::new()),
    };

    if ctype.starts_with("multipart/") {
        return match params.get("boundary") {
            Some(boundary) => split_multipart_body(body, boundary)
                .iter()
                .flat_map(|raw_part| {
                    let (sub_headers, sub_body) = split_headers_body(raw_part);
                    let sub_ct = header_lookup(&sub_headers, "Content-Type");
                    let sub_cte = header_lookup(&sub_headers, "Content-Transfer-Encoding");
                    collect_mime_parts(sub_ct.as_deref(), sub_cte.as_deref(), &sub_body)
                })
                .collect(),
            None => Vec::new(),
        };
    }

    let charset = params.get("charset").cloned();
    let payload = decode_transfer_encoding(body, transfer_encoding);
    vec![MimePart { content_type: ctype, payload, charset }]
}

fn fallback_message_id(msg: &RawMessage) -> String {
    let unique = format!(
        "{}|{}|{}|{}",
        msg.header("From").unwrap_or(""),
        msg.header("To").unwrap_or(""),
        msg.header("Date").unwrap_or(""),
        msg.header("Subject").unwrap_or(""),
    );
    sha256_hex(&unique)
}

pub struct EmailSource {
    scope: EmailScope,
    scope_json: String,
    device_id: String,
    extractor_registry: Arc<ExtractorRegistry>,
    should_stop: ShouldStop,
}

impl EmailSource {
    pub fn new(
        scope: EmailScope,
        device_id: String,
        extractor_registry: Arc<ExtractorRegistry>,
        should_stop: ShouldStop,
    ) -> Self {
        let scope_json = Scope::Email(scope.clone()).canonical_json();
        Self { scope, scope_json, device_id, extractor_registry, should_stop }
    }

    fn is_ignored(&self, msg: &RawMessage) -> bool {
        self.scope.ignore_patterns.iter().any(|p| {
            msg.header(&p.field)
                .map(|v| {
                    Pattern::new(&p.value.to_lowercase())
                        .map(|pat| pat.matches(&v.to_lowercase()))
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
    }
}

impl IngestionSource for EmailSource {
    fn kind(&self) -> &str {
        "email"
    }

    fn iter_documents(&self) -> Result<Vec<Document>, AppError> {
        let messages = parse_mbox(&self.scope.mbox_path)?;
        let mut documents = Vec::new();

        for msg in messages {
            if (self.should_stop)() {
                tracing::info!("stop requested, terminating email ingestion source");
                break;
            }

            if !self.scope.ignore_patterns.is_empty() && self.is_ignored(&msg) {
                tracing::debug!(message_id = msg.header("Message-ID"), "excluding email via ignore pattern");
                continue;
            }

            let message_id = msg
                .header("Message-ID")
                .map(|s| s.to_string())
                .unwrap_or_else(|| fallback_message_id(&msg));

            let mbox_path_display = self.scope.mbox_path.display().to_string();
            let src_instance_id = source_instance_id("email", &self.device_id, &self.scope.mbox_path);

            let mime_parts = collect_mime_parts(
                msg.header("Content-Type"),
                msg.header("Content-Transfer-Encoding"),
                &msg.body,
            );
            let extraction = MboxMessageExtractor::extract_message(&self.extractor_registry, &mime_parts);
            if extraction.is_empty() {
                continue;
            }

            let mut metadata = std::collections::HashMap::new();
            metadata.insert("message_id".to_string(), message_id.clone());
            if let Some(s) = msg.header("Subject") {
                metadata.insert("subject".to_string(), s.to_string());
            }
            if let Some(s) = msg.header("From") {
                metadata.insert("from".to_string(), s.to_string());
            }
            if let Some(s) = msg.header("To") {
                metadata.insert("to".to_string(), s.to_string());
            }
            if let Some(s) = msg.header("Date") {
                metadata.insert("date".to_string(), s.to_string());
            }

            let merged_text = extraction.texts.join("\n");
            let checksum = text_checksum(&merged_text);
            let now = now_iso8601();

            let mut parts = Vec::with_capacity(extraction.len());
            for i in 0..extraction.len() {
                let unit_locator = extraction.unit_locators[i].clone();
                let part_id = document_part_id(&src_instance_id, &unit_locator);
                parts.push(DocumentPart {
                    document_part_id: part_id,
                    checksum: checksum.clone(),
                    source_type: "email".to_string(),
                    source_instance_id: src_instance_id.clone(),
                    device_id: self.device_id.clone(),
                    source_path: format!("{mbox_path_display}::Message-ID:{message_id}"),
                    unit_locator,
                    content_type: extraction.content_types[i].clone(),
                    extractor_name: extraction.extractor_names[i].clone(),
                    extractor_version: extraction.extractor_versions[i].clone(),
                    metadata_json: metadata.clone(),
                    created_at: now.clone(),
                    updated_at: now.clone(),
                    text: extraction.texts[i].clone(),
                    scope_json: self.scope_json.clone(),
                });
            }

            let doc_id = document_part_id(&src_instance_id, &format!("message:{message_id}"));
            documents.push(Document { id: doc_id, source_type: "email".to_string(), metadata, parts });
        }

        Ok(documents)
    }
}
