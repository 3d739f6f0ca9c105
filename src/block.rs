//! The document unit: one timed or auxiliary block.
//!
//! A block is a caption cue, a comment, a style-sheet fragment, a layout
//! region, or a free-form metadata record. Each kind carries only the fields
//! valid for it, as a tagged union.

use crate::style::{plain_text, StyledSpan};
use crate::time::MicroTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// A timed caption cue.
    Caption,
    /// A comment (SRT has none; VTT `NOTE`).
    Comment,
    /// A style-sheet fragment (VTT `STYLE`, TTML `style`).
    Style,
    /// A layout/region descriptor (VTT `REGION`, TTML `region`, SRT
    /// coordinate boxes).
    Layout,
    /// Free-form metadata (VTT header values, JSON cues, TTML metadata).
    Metadata,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Caption => "caption",
            BlockType::Comment => "comment",
            BlockType::Style => "style",
            BlockType::Layout => "layout",
            BlockType::Metadata => "metadata",
        };
        write!(f, "{name}")
    }
}

/// One line of caption text as a sequence of styled runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptionLine {
    /// The styled runs making up the line.
    pub spans: Vec<StyledSpan>,
}

impl CaptionLine {
    /// Create a line from spans.
    #[must_use]
    pub fn new(spans: Vec<StyledSpan>) -> Self {
        Self { spans }
    }

    /// Create an unstyled line.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![StyledSpan::plain(text)],
        }
    }

    /// The line's text with styling dropped.
    #[must_use]
    pub fn plain_text(&self) -> String {
        plain_text(&self.spans)
    }
}

/// Payload of a caption cue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptionData {
    /// Optional cue identifier (VTT cue id, TTML `xml:id`).
    pub id: Option<String>,
    /// Lines per normalized language tag.
    pub text: BTreeMap<String, Vec<CaptionLine>>,
    /// Referenced style ids in the document's style table.
    pub style_refs: Vec<String>,
    /// Referenced layout id in the document's layout table.
    pub layout_ref: Option<String>,
    /// Format-specific cue settings kept verbatim (VTT settings string).
    pub settings: Option<String>,
}

/// Payload of a comment block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommentData {
    /// The comment lines.
    pub lines: Vec<String>,
}

/// Payload of a style block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleData {
    /// The style's id in the document's style table.
    pub id: String,
    /// The declarations.
    pub declarations: crate::style::StyleDeclarations,
}

/// Payload of a layout/region block. All geometry is normalized to 0..1
/// fractions of the rendering area.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutData {
    /// The region's id in the document's layout table.
    pub id: String,
    /// Where the region sits in the viewport (SRT box corner, TTML
    /// `tts:origin`, VTT `viewportanchor`).
    pub origin: Option<(f64, f64)>,
    /// The point within the region pinned to `origin` (VTT `regionanchor`);
    /// `None` means the top-left corner.
    pub region_anchor: Option<(f64, f64)>,
    /// Width and height. The height is zero when the source format does not
    /// define one (VTT regions size themselves by `lines`).
    pub extent: Option<(f64, f64)>,
    /// Number of text lines the region holds (VTT `lines`).
    pub lines: Option<u32>,
    /// Whether the region scrolls up.
    pub scroll_up: bool,
}

/// Payload of a metadata block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataData {
    /// Optional metadata id in the document's metadata table.
    pub id: Option<String>,
    /// Key/value entries. Raw JSON cues live under the `"json"` key.
    pub entries: BTreeMap<String, String>,
}

/// Per-kind payload of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockData {
    /// A caption cue.
    Caption(CaptionData),
    /// A comment.
    Comment(CommentData),
    /// A style fragment.
    Style(StyleData),
    /// A layout region.
    Layout(LayoutData),
    /// A metadata record.
    Metadata(MetadataData),
}

/// One timed unit of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Start time; meaningful for captions and timed metadata.
    pub start: Option<MicroTime>,
    /// End time; `None` means open-ended.
    pub end: Option<MicroTime>,
    /// The payload.
    pub data: BlockData,
}

impl Block {
    /// Create a caption block.
    #[must_use]
    pub fn caption(start: MicroTime, end: MicroTime, data: CaptionData) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            data: BlockData::Caption(data),
        }
    }

    /// Create an untimed comment block.
    #[must_use]
    pub fn comment(lines: Vec<String>) -> Self {
        Self {
            start: None,
            end: None,
            data: BlockData::Comment(CommentData { lines }),
        }
    }

    /// Create an untimed style block.
    #[must_use]
    pub fn style(data: StyleData) -> Self {
        Self {
            start: None,
            end: None,
            data: BlockData::Style(data),
        }
    }

    /// Create an untimed layout block.
    #[must_use]
    pub fn layout(data: LayoutData) -> Self {
        Self {
            start: None,
            end: None,
            data: BlockData::Layout(data),
        }
    }

    /// Create a metadata block, timed or not.
    #[must_use]
    pub fn metadata(start: Option<MicroTime>, end: Option<MicroTime>, data: MetadataData) -> Self {
        Self {
            start,
            end,
            data: BlockData::Metadata(data),
        }
    }

    /// The block's kind.
    #[must_use]
    pub fn block_type(&self) -> BlockType {
        match &self.data {
            BlockData::Caption(_) => BlockType::Caption,
            BlockData::Comment(_) => BlockType::Comment,
            BlockData::Style(_) => BlockType::Style,
            BlockData::Layout(_) => BlockType::Layout,
            BlockData::Metadata(_) => BlockType::Metadata,
        }
    }

    /// Access the caption payload, if this is a caption.
    #[must_use]
    pub fn as_caption(&self) -> Option<&CaptionData> {
        match &self.data {
            BlockData::Caption(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable access to the caption payload, if this is a caption.
    pub fn as_caption_mut(&mut self) -> Option<&mut CaptionData> {
        match &mut self.data {
            BlockData::Caption(c) => Some(c),
            _ => None,
        }
    }

    /// Shift both times forward.
    pub fn shift_time(&mut self, offset: MicroTime) {
        if let Some(start) = &mut self.start {
            *start += offset;
        }
        if let Some(end) = &mut self.end {
            *end += offset;
        }
    }

    /// Shift both times backward, clamping at zero.
    pub fn shift_time_back(&mut self, offset: MicroTime) {
        if let Some(start) = &mut self.start {
            *start = start.saturating_sub(&offset);
        }
        if let Some(end) = &mut self.end {
            *end = end.saturating_sub(&offset);
        }
    }

    /// Shift only the start time forward.
    pub fn shift_start(&mut self, offset: MicroTime) {
        if let Some(start) = &mut self.start {
            *start += offset;
        }
    }

    /// Shift only the end time forward.
    pub fn shift_end(&mut self, offset: MicroTime) {
        if let Some(end) = &mut self.end {
            *end += offset;
        }
    }

    /// Merge another block's caption text into this one, language by
    /// language (the `+=` semantics: lines are appended, times are kept).
    pub fn merge(&mut self, other: &Block) {
        let (Some(mine), Some(theirs)) = (self.as_caption_mut(), other.as_caption()) else {
            return;
        };
        for (language, lines) in &theirs.text {
            mine.text
                .entry(language.clone())
                .or_default()
                .extend(lines.iter().cloned());
        }
    }

    /// Remove one language's text. The block stays even when no languages
    /// remain.
    pub fn remove_language(&mut self, language: &str) {
        if let Some(caption) = self.as_caption_mut() {
            caption.text.remove(language);
        }
    }

    /// Languages present on this block.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        match self.as_caption() {
            Some(c) => c.text.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// The block's lines for one language, styling dropped.
    #[must_use]
    pub fn plain_lines(&self, language: &str) -> Vec<String> {
        self.as_caption()
            .and_then(|c| c.text.get(language))
            .map(|lines| lines.iter().map(CaptionLine::plain_text).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => write!(f, "[{} --> {}] ", start, end)?,
            (Some(start), None) => write!(f, "[{} --> ] ", start)?,
            _ => {}
        }
        match &self.data {
            BlockData::Caption(c) => {
                let mut first = true;
                for (language, lines) in &c.text {
                    if !first {
                        write!(f, " | ")?;
                    }
                    first = false;
                    let text: Vec<String> = lines.iter().map(CaptionLine::plain_text).collect();
                    write!(f, "{language}: {}", text.join(" / "))?;
                }
                Ok(())
            }
            BlockData::Comment(c) => write!(f, "comment: {}", c.lines.join(" / ")),
            BlockData::Style(s) => write!(f, "style #{}", s.id),
            BlockData::Layout(l) => write!(f, "layout #{}", l.id),
            BlockData::Metadata(m) => {
                write!(f, "metadata")?;
                if let Some(id) = &m.id {
                    write!(f, " #{id}")?;
                }
                Ok(())
            }
        }
    }
}

/// Convenience builder for a single-language caption block.
#[must_use]
pub fn simple_caption(
    start: MicroTime,
    end: MicroTime,
    language: &str,
    lines: &[&str],
) -> Block {
    let mut text = BTreeMap::new();
    text.insert(
        language.to_string(),
        lines.iter().map(|l| CaptionLine::plain(*l)).collect(),
    );
    Block::caption(
        start,
        end,
        CaptionData {
            text,
            ..CaptionData::default()
        },
    )
}
