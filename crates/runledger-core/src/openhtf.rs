//! Reader for OpenHTF JSON test records.
//!
//! Only the parts the importer needs are modelled: the DUT, the outcome and
//! each phase's attachments. Attachment payloads stay base64 until the
//! iterator reaches them, so a report with many large captures is decoded one
//! attachment at a time.

use std::path::Path;

use base64::Engine;
use serde::Deserialize;

use crate::attachment::{content_type_for_path, InlineAttachment};
use crate::error::ReportError;

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRecord {
    #[serde(default)]
    pub mimetype: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    #[serde(default)]
    pub attachments: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenHtfReport {
    #[serde(default)]
    pub dut_id: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub phases: Vec<PhaseRecord>,
}

impl OpenHtfReport {
    pub fn from_path(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read(path)?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, ReportError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn attachment_count(&self) -> usize {
        self.phases.iter().map(|p| p.attachments.len()).sum()
    }

    /// Consume the report into its attachments, in phase order and then in
    /// the order they appear within each phase.
    pub fn into_attachments(self) -> ReportAttachments {
        ReportAttachments {
            phases: self.phases.into_iter(),
            current: None,
        }
    }
}

/// Lazy, single-pass sequence of the attachments embedded in a report.
pub struct ReportAttachments {
    phases: std::vec::IntoIter<PhaseRecord>,
    current: Option<(String, serde_json::map::IntoIter)>,
}

impl Iterator for ReportAttachments {
    type Item = Result<InlineAttachment, ReportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((phase, entries)) = self.current.as_mut() {
                if let Some((name, value)) = entries.next() {
                    return Some(decode(phase, name, value));
                }
            }
            let phase = self.phases.next()?;
            self.current = Some((phase.name, phase.attachments.into_iter()));
        }
    }
}

fn decode(
    phase: &str,
    name: String,
    value: serde_json::Value,
) -> Result<InlineAttachment, ReportError> {
    let record: AttachmentRecord =
        serde_json::from_value(value).map_err(|e| ReportError::Attachment {
            phase: phase.to_string(),
            name: name.clone(),
            reason: e.to_string(),
        })?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(record.data.as_bytes())
        .map_err(|e| ReportError::Attachment {
            phase: phase.to_string(),
            name: name.clone(),
            reason: format!("invalid base64: {e}"),
        })?;
    let content_type = record
        .mimetype
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| content_type_for_path(Path::new(&name)));
    Ok(InlineAttachment {
        name,
        content_type,
        data,
    })
}
