//! JSON snapshot: a self-describing serialization of the whole document.
//!
//! The snapshot bypasses the codecs entirely: everything the document owns
//! (block list, auxiliary tables, media hints, language) round-trips as one
//! JSON object. The `identifier` sentinel keeps a foreign JSON file from
//! being silently loaded as a caption snapshot; that check is a correctness
//! contract, not cosmetics.

use crate::block::Block;
use crate::convert::CaptionFormat;
use crate::document::{AuxTables, CaptionDocument};
use crate::error::{CaptionError, Result};
use crate::time::MicroTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The identifier sentinel every snapshot carries.
pub const SNAPSHOT_IDENTIFIER: &str = "captionio";

/// The current snapshot schema version.
pub const JSON_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    identifier: String,
    json_version: u32,
    default_language: String,
    time_length: Option<MicroTime>,
    filename: Option<String>,
    media_width: u32,
    media_height: u32,
    extensions: BTreeMap<String, String>,
    options: AuxTables,
    block_list: Vec<Block>,
}

/// The reduced per-caption form for lightweight consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionSummary {
    /// Start time.
    pub start: Option<MicroTime>,
    /// End time.
    pub end: Option<MicroTime>,
    /// Plain text lines per language.
    pub text: BTreeMap<String, Vec<String>>,
}

fn snapshot_of(doc: &CaptionDocument) -> Snapshot {
    let extensions = CaptionFormat::IMPLEMENTED
        .iter()
        .map(|f| (f.to_string(), format!(".{}", f.extension())))
        .collect();
    Snapshot {
        identifier: SNAPSHOT_IDENTIFIER.to_string(),
        json_version: JSON_VERSION,
        default_language: doc.default_language.clone(),
        time_length: doc.time_length,
        filename: doc
            .filename
            .as_ref()
            .map(|p| p.display().to_string()),
        media_width: doc.media_width,
        media_height: doc.media_height,
        extensions,
        options: doc.aux().clone(),
        block_list: doc.iter().cloned().collect(),
    }
}

fn document_of(snapshot: Snapshot) -> CaptionDocument {
    let mut doc = CaptionDocument::new();
    doc.default_language = snapshot.default_language;
    doc.time_length = snapshot.time_length;
    doc.media_width = snapshot.media_width;
    doc.media_height = snapshot.media_height;
    doc.filename = snapshot.filename.map(PathBuf::from);
    *doc.aux_mut() = snapshot.options;
    doc.set_blocks(snapshot.block_list);
    doc
}

/// Validate the sentinel and version of a snapshot value.
fn validate(value: &serde_json::Value) -> Result<()> {
    match value.get("identifier").and_then(|v| v.as_str()) {
        Some(SNAPSHOT_IDENTIFIER) => {}
        Some(other) => {
            return Err(CaptionError::invalid_snapshot(format!(
                "foreign identifier {other:?}, expected {SNAPSHOT_IDENTIFIER:?}"
            )))
        }
        None => {
            return Err(CaptionError::invalid_snapshot(format!(
                "missing the {SNAPSHOT_IDENTIFIER:?} identifier"
            )))
        }
    }

    let version = value
        .get("json_version")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| CaptionError::invalid_snapshot("missing json_version"))?;
    migrate_snapshot(version as u32)
}

/// Migration hook for snapshots written by other schema versions. There is
/// only one version so far; anything else is rejected rather than misread.
fn migrate_snapshot(version: u32) -> Result<()> {
    if version == JSON_VERSION {
        return Ok(());
    }
    Err(CaptionError::invalid_snapshot(format!(
        "json_version {version} is not supported (current is {JSON_VERSION})"
    )))
}

/// Restore a document from a snapshot value.
pub fn from_json_value(value: serde_json::Value) -> Result<CaptionDocument> {
    validate(&value)?;
    let snapshot: Snapshot = serde_json::from_value(value)
        .map_err(|e| CaptionError::invalid_snapshot(e.to_string()))?;
    Ok(document_of(snapshot))
}

/// Restore a document from snapshot JSON text.
pub fn from_json_str(content: &str) -> Result<CaptionDocument> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| CaptionError::invalid_snapshot(e.to_string()))?;
    from_json_value(value)
}

/// Restore a document from a snapshot file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<CaptionDocument> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).map_err(|e| CaptionError::io(path.display().to_string(), e))?;
    from_json_str(&content)
}

impl CaptionDocument {
    /// Serialize this document as snapshot JSON text.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&snapshot_of(self))
            .map_err(|e| CaptionError::invalid_snapshot(e.to_string()))
    }

    /// Serialize this document as a snapshot value. The value owns deep
    /// copies of everything; mutating it never touches the document.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(snapshot_of(self))
            .map_err(|e| CaptionError::invalid_snapshot(e.to_string()))
    }

    /// The reduced `[{start, end, text}]` array of caption blocks.
    #[must_use]
    pub fn to_caption_array(&self) -> Vec<CaptionSummary> {
        self.captions()
            .map(|block| {
                let text = block
                    .as_caption()
                    .map(|caption| {
                        caption
                            .text
                            .keys()
                            .map(|lang| (lang.clone(), block.plain_lines(lang)))
                            .collect()
                    })
                    .unwrap_or_default();
                CaptionSummary {
                    start: block.start,
                    end: block.end,
                    text,
                }
            })
            .collect()
    }

    /// Write this document to a snapshot file. A `.json` extension is added
    /// when missing. Returns the path actually written.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            path.set_extension("json");
        }
        let json = serde_json::to_string_pretty(&snapshot_of(self))
            .map_err(|e| CaptionError::invalid_snapshot(e.to_string()))?;
        fs::write(&path, json).map_err(|e| CaptionError::io(path.display().to_string(), e))?;
        Ok(path)
    }
}
