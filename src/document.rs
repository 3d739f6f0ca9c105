//! The caption document aggregate.
//!
//! A [`CaptionDocument`] owns the ordered caption/comment blocks of a track
//! plus three indexed tables of auxiliary blocks (layout regions, style
//! fragments, metadata records). The tables are an arena (`aux_blocks`) with
//! id-to-index maps; removal compacts the arena and rewrites the maps in the
//! same step so an id can never dangle.

use crate::block::{Block, BlockType};
use crate::convert::{CaptionFormat, CaptionsCodec, ReadOptions, WriteOptions};
use crate::error::{CaptionError, Result};
use crate::language::{make_filename, normalize_tag, UND};
use crate::time::MicroTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Bookkeeping for WebVTT style identifiers: source files may reuse visual
/// ids across `STYLE` blocks, so each one gets a fresh synthetic id and the
/// original name is remembered both ways.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleIdMap {
    /// Synthetic id to the identifier the source file used.
    pub identifier_to_original: BTreeMap<String, String>,
    /// Source identifier to the synthetic id that replaced it.
    pub identifier_to_new: BTreeMap<String, String>,
    /// Monotonic counter feeding `style1`, `style2`, ...
    pub counter: u32,
}

/// The auxiliary arena and its id-to-index tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxTables {
    /// The arena of auxiliary blocks, in source order.
    pub blocks: Vec<Block>,
    /// Layout id to arena index.
    pub layout: BTreeMap<String, usize>,
    /// Style id to arena index.
    pub style: BTreeMap<String, usize>,
    /// Metadata id to arena index.
    pub metadata: BTreeMap<String, usize>,
    /// WebVTT style identifier bookkeeping.
    pub style_ids: StyleIdMap,
}

/// A caption track: ordered caption/comment blocks, auxiliary tables, and
/// the track-level attributes every codec reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionDocument {
    /// The normalized default language tag.
    pub default_language: String,
    /// Maximum end time seen so far; grows monotonically on append.
    pub time_length: Option<MicroTime>,
    /// Display-resolution hint used for SRT coordinate math.
    pub media_width: u32,
    /// Display-resolution hint used for SRT coordinate math.
    pub media_height: u32,
    /// The file this document came from, when it came from one.
    pub filename: Option<PathBuf>,
    blocks: Vec<Block>,
    aux: AuxTables,
}

impl Default for CaptionDocument {
    fn default() -> Self {
        Self {
            default_language: UND.to_string(),
            time_length: None,
            media_width: 1920,
            media_height: 1080,
            filename: None,
            blocks: Vec::new(),
            aux: AuxTables::default(),
        }
    }
}

impl CaptionDocument {
    /// Create an empty document with `"und"` as the default language.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document with a default language.
    #[must_use]
    pub fn with_default_language(language: &str) -> Self {
        let mut doc = Self::new();
        doc.set_default_language(language);
        doc
    }

    /// Set the default language, normalizing the tag. Invalid tags fail
    /// closed to `"und"`.
    pub fn set_default_language(&mut self, language: &str) {
        self.default_language = normalize_tag(language);
    }

    // --- block list ------------------------------------------------------

    /// Append a block, growing `time_length` to cover its end time.
    pub fn append(&mut self, block: Block) {
        if let Some(end) = block.end {
            if self.time_length.map_or(true, |current| end > current) {
                self.time_length = Some(end);
            }
        }
        self.blocks.push(block);
    }

    /// Insert a block at an index without touching `time_length`.
    pub fn insert(&mut self, index: usize, block: Block) {
        self.blocks.insert(index, block);
    }

    /// Number of blocks in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the block list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block at an index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Mutable access to the block at an index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Remove and return the block at an index.
    pub fn remove(&mut self, index: usize) -> Block {
        self.blocks.remove(index)
    }

    /// Iterate over the blocks.
    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Iterate mutably over the blocks.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Block> {
        self.blocks.iter_mut()
    }

    /// Iterate over caption blocks only.
    pub fn captions(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|b| b.block_type() == BlockType::Caption)
    }

    /// Drop comment blocks from the block list.
    pub fn remove_comments(&mut self) {
        self.blocks.retain(|b| b.block_type() != BlockType::Comment);
    }

    /// Drop comment blocks from the auxiliary arena.
    pub fn remove_aux_comments(&mut self) {
        let doomed: Vec<usize> = self
            .aux
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.block_type() == BlockType::Comment)
            .map(|(i, _)| i)
            .collect();
        for index in doomed.into_iter().rev() {
            self.remove_aux_index(index);
        }
    }

    /// Drop comments everywhere.
    pub fn remove_all_comments(&mut self) {
        self.remove_comments();
        self.remove_aux_comments();
    }

    /// Sort caption blocks by start time. Comments are dropped first since
    /// they have no position on the timeline.
    pub fn sort_by_time(&mut self) {
        self.remove_comments();
        self.blocks.sort_by_key(|b| b.start);
    }

    // --- structural operations -------------------------------------------

    /// Shift every caption's start and end forward.
    pub fn shift_time(&mut self, offset: MicroTime) {
        for block in &mut self.blocks {
            if block.block_type() == BlockType::Caption {
                block.shift_time(offset);
            }
        }
        if let Some(length) = &mut self.time_length {
            *length += offset;
        }
    }

    /// Shift every caption's start and end backward, clamping at zero.
    pub fn shift_time_back(&mut self, offset: MicroTime) {
        for block in &mut self.blocks {
            if block.block_type() == BlockType::Caption {
                block.shift_time_back(offset);
            }
        }
        if let Some(length) = &mut self.time_length {
            *length = length.saturating_sub(&offset);
        }
    }

    /// Shift every caption's start time forward.
    pub fn shift_start(&mut self, offset: MicroTime) {
        for block in &mut self.blocks {
            if block.block_type() == BlockType::Caption {
                block.shift_start(offset);
            }
        }
    }

    /// Shift every caption's end time forward.
    pub fn shift_end(&mut self, offset: MicroTime) {
        for block in &mut self.blocks {
            if block.block_type() == BlockType::Caption {
                block.shift_end(offset);
            }
        }
        if let Some(length) = &mut self.time_length {
            *length += offset;
        }
    }

    /// Append a deep copy of every block of `other`, shifted by
    /// `offset + (self.time_length when add_end_time)`. Concatenates two
    /// tracks in sequence; the two documents stay independently mutable.
    pub fn join(&mut self, other: &CaptionDocument, add_end_time: bool, offset: MicroTime) {
        let mut shift = offset;
        if add_end_time {
            if let Some(length) = self.time_length {
                shift += length;
            }
        }

        for block in &other.blocks {
            let mut copy = block.clone();
            copy.shift_time(shift);
            self.append(copy);
        }
    }

    /// Join captions read from a file, as [`CaptionDocument::join`] does for
    /// an in-memory document.
    pub fn join_file(
        &mut self,
        path: impl AsRef<Path>,
        add_end_time: bool,
        offset: MicroTime,
        options: &crate::convert::OpenOptions,
    ) -> Result<()> {
        let other = crate::convert::open(path, options)?;
        self.join(&other, add_end_time, offset);
        Ok(())
    }

    /// Positional merge (the `+=` semantics): block *i* of `other` merges
    /// into block *i* here when present, otherwise it is appended.
    pub fn merge(&mut self, other: &CaptionDocument) {
        for (i, block) in other.blocks.iter().enumerate() {
            if i < self.blocks.len() {
                self.blocks[i].merge(block);
            } else {
                self.append(block.clone());
            }
        }
    }

    /// Remove one language's text from every block (the `-=` semantics).
    /// Blocks are kept even when no language remains.
    pub fn remove_language(&mut self, language: &str) {
        for block in &mut self.blocks {
            block.remove_language(language);
        }
    }

    // --- auxiliary tables ------------------------------------------------

    /// Read access to the auxiliary tables.
    #[must_use]
    pub fn aux(&self) -> &AuxTables {
        &self.aux
    }

    /// Write access to the auxiliary tables, for snapshot restore.
    pub(crate) fn aux_mut(&mut self) -> &mut AuxTables {
        &mut self.aux
    }

    /// Replace the block list wholesale, for snapshot restore. Does not
    /// touch `time_length`; the snapshot carries its own.
    pub(crate) fn set_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }

    /// Register a layout block under its id.
    pub fn add_layout(&mut self, block: Block) -> Result<()> {
        let BlockType::Layout = block.block_type() else {
            return Err(CaptionError::UnsupportedContent(format!(
                "expected a layout block, got {}",
                block.block_type()
            )));
        };
        let id = match &block.data {
            crate::block::BlockData::Layout(l) => l.id.clone(),
            _ => unreachable!(),
        };
        self.aux.blocks.push(block);
        self.aux.layout.insert(id, self.aux.blocks.len() - 1);
        Ok(())
    }

    /// Register a style block under its id.
    pub fn add_style(&mut self, block: Block) -> Result<()> {
        let BlockType::Style = block.block_type() else {
            return Err(CaptionError::UnsupportedContent(format!(
                "expected a style block, got {}",
                block.block_type()
            )));
        };
        let id = match &block.data {
            crate::block::BlockData::Style(s) => s.id.clone(),
            _ => unreachable!(),
        };
        self.aux.blocks.push(block);
        self.aux.style.insert(id, self.aux.blocks.len() - 1);
        Ok(())
    }

    /// Register a metadata block under an id.
    pub fn add_metadata(&mut self, id: &str, block: Block) -> Result<()> {
        let BlockType::Metadata = block.block_type() else {
            return Err(CaptionError::UnsupportedContent(format!(
                "expected a metadata block, got {}",
                block.block_type()
            )));
        };
        self.aux.blocks.push(block);
        self.aux
            .metadata
            .insert(id.to_string(), self.aux.blocks.len() - 1);
        Ok(())
    }

    /// Look up a layout block by id.
    #[must_use]
    pub fn layout_by_id(&self, id: &str) -> Option<&Block> {
        self.aux.layout.get(id).map(|&i| &self.aux.blocks[i])
    }

    /// Look up a style block by id.
    #[must_use]
    pub fn style_by_id(&self, id: &str) -> Option<&Block> {
        self.aux.style.get(id).map(|&i| &self.aux.blocks[i])
    }

    /// Look up a metadata block by id.
    #[must_use]
    pub fn metadata_by_id(&self, id: &str) -> Option<&Block> {
        self.aux.metadata.get(id).map(|&i| &self.aux.blocks[i])
    }

    /// Iterate over registered layout blocks in id order.
    pub fn layouts(&self) -> impl Iterator<Item = &Block> {
        self.aux.layout.values().map(|&i| &self.aux.blocks[i])
    }

    /// Iterate over registered style blocks in id order.
    pub fn styles(&self) -> impl Iterator<Item = &Block> {
        self.aux.style.values().map(|&i| &self.aux.blocks[i])
    }

    /// Iterate over registered metadata blocks in id order.
    pub fn metadata_blocks(&self) -> impl Iterator<Item = &Block> {
        self.aux.metadata.values().map(|&i| &self.aux.blocks[i])
    }

    /// Remove an auxiliary block by id, whichever table holds it. The arena
    /// entry and the index entry go together; remaining indices are
    /// compacted. Returns whether anything was removed.
    pub fn remove_aux(&mut self, id: &str) -> bool {
        let index = self
            .aux
            .layout
            .get(id)
            .or_else(|| self.aux.style.get(id))
            .or_else(|| self.aux.metadata.get(id))
            .copied();
        match index {
            Some(index) => {
                self.remove_aux_index(index);
                true
            }
            None => false,
        }
    }

    fn remove_aux_index(&mut self, index: usize) {
        self.aux.blocks.remove(index);
        for table in [
            &mut self.aux.layout,
            &mut self.aux.style,
            &mut self.aux.metadata,
        ] {
            table.retain(|_, i| *i != index);
            for i in table.values_mut() {
                if *i > index {
                    *i -= 1;
                }
            }
        }
    }

    /// Allocate a fresh synthetic style id (`style1`, `style2`, ...),
    /// recording the identifier the source file used when there was one.
    pub fn allocate_style_id(&mut self, original: Option<&str>) -> String {
        self.aux.style_ids.counter += 1;
        let id = format!("style{}", self.aux.style_ids.counter);
        if let Some(original) = original {
            self.aux
                .style_ids
                .identifier_to_original
                .insert(id.clone(), original.to_string());
            self.aux
                .style_ids
                .identifier_to_new
                .insert(original.to_string(), id.clone());
        }
        id
    }

    // --- codec plumbing --------------------------------------------------

    /// Read content through a codec, then apply the caller's time offset
    /// exactly once to every block the codec appended.
    pub fn read_content(
        &mut self,
        codec: &dyn CaptionsCodec,
        content: &str,
        options: &ReadOptions,
    ) -> Result<()> {
        let first_new = self.blocks.len();
        codec.read_into(content, self, options)?;

        if let Some(offset) = options.time_offset {
            if !offset.is_zero() {
                for block in &mut self.blocks[first_new..] {
                    block.shift_time(offset);
                }
                if let Some(length) = &mut self.time_length {
                    *length += offset;
                }
            }
        }
        Ok(())
    }

    /// Render this document in a format.
    pub fn render(&self, format: CaptionFormat, options: &WriteOptions) -> Result<String> {
        format.codec()?.render(self, options)
    }

    /// Save this document to a file, injecting the requested languages into
    /// the filename unless suppressed. Returns the path actually written.
    pub fn save(
        &self,
        filename: impl AsRef<Path>,
        format: CaptionFormat,
        options: &WriteOptions,
    ) -> Result<PathBuf> {
        let rendered = self.render(format, options)?;
        self.write_output(filename, format, options, rendered)
    }

    /// Save with a caller-supplied generator that maps each caption block to
    /// its output lines, overriding the default per-language joiner.
    pub fn save_with<F>(
        &self,
        filename: impl AsRef<Path>,
        format: CaptionFormat,
        options: &WriteOptions,
        generator: F,
    ) -> Result<PathBuf>
    where
        F: Fn(&Block, &[String]) -> Vec<String>,
    {
        let rendered = format
            .codec()?
            .render_lines(self, options, Some(&generator))?;
        self.write_output(filename, format, options, rendered)
    }

    fn write_output(
        &self,
        filename: impl AsRef<Path>,
        format: CaptionFormat,
        options: &WriteOptions,
        rendered: String,
    ) -> Result<PathBuf> {
        let languages = if options.languages.is_empty() {
            vec![self.default_language.clone()]
        } else {
            options.languages.clone()
        };
        let path = make_filename(
            filename,
            &format!(".{}", format.extension()),
            &languages,
            options.include_languages_in_filename,
        );
        fs::write(&path, rendered)
            .map_err(|e| CaptionError::io(path.display().to_string(), e))?;
        Ok(path)
    }

}

impl fmt::Display for CaptionDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "{i}. {block}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a CaptionDocument {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
