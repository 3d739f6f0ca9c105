//! The codec protocol, format detection, and the open/convert lifecycle.
//!
//! Every wire format implements [`CaptionsCodec`], a detect/read/render
//! triad, and [`CaptionFormat`] is the sum type that dispatches to the one
//! implementation per format. The stub formats (LRC, SAMI, USF) are
//! recognized by extension but their operations fail with
//! `UnsupportedOperation`.

use crate::block::{Block, CaptionLine};
use crate::document::CaptionDocument;
use crate::error::{CaptionError, Result};
use crate::language::{languages_from_filename, normalize_tag, UND};
use crate::style::{plain_text, StyleMode, StyledSpan};
use crate::time::MicroTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// The supported caption formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionFormat {
    /// SubRip (`.srt`).
    Srt,
    /// WebVTT (`.vtt`).
    Vtt,
    /// MicroDVD (`.sub`).
    Sub,
    /// Timed Text Markup Language (`.ttml`).
    Ttml,
    /// LRC lyrics. Recognized, not implemented.
    Lrc,
    /// SAMI. Recognized, not implemented.
    Sami,
    /// Universal Subtitle Format. Recognized, not implemented.
    Usf,
}

impl CaptionFormat {
    /// The formats with a working codec.
    pub const IMPLEMENTED: [CaptionFormat; 4] = [
        CaptionFormat::Srt,
        CaptionFormat::Vtt,
        CaptionFormat::Sub,
        CaptionFormat::Ttml,
    ];

    /// The typical file extension, without the dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            CaptionFormat::Srt => "srt",
            CaptionFormat::Vtt => "vtt",
            CaptionFormat::Sub => "sub",
            CaptionFormat::Ttml => "ttml",
            CaptionFormat::Lrc => "lrc",
            CaptionFormat::Sami => "smi",
            CaptionFormat::Usf => "usf",
        }
    }

    /// The MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            CaptionFormat::Srt => "application/x-subrip",
            CaptionFormat::Vtt => "text/vtt",
            CaptionFormat::Sub => "text/x-microdvd",
            CaptionFormat::Ttml => "application/ttml+xml",
            CaptionFormat::Lrc => "text/x-lrc",
            CaptionFormat::Sami => "application/x-sami",
            CaptionFormat::Usf => "application/x-usf",
        }
    }

    /// Detect the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "srt" => Some(CaptionFormat::Srt),
            "vtt" | "webvtt" => Some(CaptionFormat::Vtt),
            "sub" => Some(CaptionFormat::Sub),
            "ttml" | "dfxp" | "xml" => Some(CaptionFormat::Ttml),
            "lrc" => Some(CaptionFormat::Lrc),
            "smi" | "sami" => Some(CaptionFormat::Sami),
            "usf" => Some(CaptionFormat::Usf),
            _ => None,
        }
    }

    /// Whether a codec exists for this format.
    #[must_use]
    pub fn is_implemented(&self) -> bool {
        Self::IMPLEMENTED.contains(self)
    }

    /// The codec for this format, or `UnsupportedOperation` for the stubs.
    pub fn codec(&self) -> Result<&'static dyn CaptionsCodec> {
        match self {
            CaptionFormat::Srt => Ok(&crate::srt::SrtCodec),
            CaptionFormat::Vtt => Ok(&crate::vtt::VttCodec),
            CaptionFormat::Sub => Ok(&crate::sub::SubCodec),
            CaptionFormat::Ttml => Ok(&crate::ttml::TtmlCodec),
            stub => Err(CaptionError::unsupported(*stub, "codec")),
        }
    }
}

impl fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptionFormat::Srt => "SRT",
            CaptionFormat::Vtt => "WebVTT",
            CaptionFormat::Sub => "MicroDVD",
            CaptionFormat::Ttml => "TTML",
            CaptionFormat::Lrc => "LRC",
            CaptionFormat::Sami => "SAMI",
            CaptionFormat::Usf => "USF",
        };
        write!(f, "{name}")
    }
}

/// Options for reading caption content.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Languages to assign text lines to, in declared order. Empty means
    /// the document's default language.
    pub languages: Vec<String>,
    /// Offset applied exactly once to every block the read appends.
    pub time_offset: Option<MicroTime>,
    /// Frame rate for frame-indexed times (MicroDVD, TTML frame clocks).
    pub frame_rate: Option<f64>,
    /// Sub-frame rate for TTML sub-frame digits.
    pub sub_frame_rate: Option<u32>,
}

/// Options for rendering and saving caption content.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Languages to emit, in order. Empty means the document default.
    pub languages: Vec<String>,
    /// How much styling to emit.
    pub style: StyleMode,
    /// Maximum lines per cue; overflow lines are merged into the last one.
    pub lines: Option<usize>,
    /// Separator joining a cue's lines on output.
    pub new_line: String,
    /// Frame rate for frame-indexed output (MicroDVD).
    pub frame_rate: Option<f64>,
    /// Whether `save` injects the language tags into the filename.
    pub include_languages_in_filename: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            style: StyleMode::Full,
            lines: None,
            new_line: "\n".to_string(),
            frame_rate: None,
            include_languages_in_filename: true,
        }
    }
}

/// Text encoding handling for `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Strict UTF-8; invalid bytes are an error.
    #[default]
    Utf8,
    /// Best effort: UTF-8 with invalid bytes replaced. Byte-level charset
    /// detection is an external collaborator, not part of this crate.
    Auto,
}

/// Options for [`open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// How to decode the file's bytes.
    pub encoding: Encoding,
    /// Explicit format; otherwise the extension decides, then sniffing.
    pub format: Option<CaptionFormat>,
    /// Read options. Empty `languages` means: infer from the filename.
    pub read: ReadOptions,
}

/// A caller-supplied generator mapping a caption block and the requested
/// languages to the lines that should be written for it.
pub type LineGenerator<'a> = &'a dyn Fn(&Block, &[String]) -> Vec<String>;

/// The detect/read/render triad each wire format implements.
pub trait CaptionsCodec {
    /// The format this codec handles.
    fn format(&self) -> CaptionFormat;

    /// Cheap, non-destructive peek at the first line or two. Never scans
    /// the whole content.
    fn detect(&self, content: &str) -> bool;

    /// Consume the whole content, appending blocks to the document.
    fn read_into(
        &self,
        content: &str,
        doc: &mut CaptionDocument,
        options: &ReadOptions,
    ) -> Result<()>;

    /// Render the document in this codec's format with the default
    /// per-language line joiner.
    fn render(&self, doc: &CaptionDocument, options: &WriteOptions) -> Result<String> {
        self.render_lines(doc, options, None)
    }

    /// Render with an optional caller-supplied line generator.
    fn render_lines(
        &self,
        doc: &CaptionDocument,
        options: &WriteOptions,
        generator: Option<LineGenerator<'_>>,
    ) -> Result<String>;
}

/// Detect the format of in-memory content by asking each live codec.
pub fn detect_format(content: &str) -> Result<CaptionFormat> {
    for format in CaptionFormat::IMPLEMENTED {
        let codec = format.codec()?;
        if codec.detect(content) {
            return Ok(format);
        }
    }
    Err(CaptionError::UnsupportedContent(
        "content does not match any supported caption format".to_string(),
    ))
}

/// Parse in-memory content with an explicit format. Strict: a failed
/// `detect` is returned as `DetectionMismatch` for the caller to decide on.
pub fn read_str(
    content: &str,
    format: CaptionFormat,
    options: &ReadOptions,
) -> Result<CaptionDocument> {
    let codec = format.codec()?;
    if !codec.detect(content) {
        return Err(CaptionError::DetectionMismatch { format });
    }

    let mut doc = CaptionDocument::new();
    if let Some(first) = options.languages.first() {
        doc.set_default_language(first);
    }
    doc.read_content(codec, content, options)?;
    Ok(doc)
}

/// Parse in-memory content, auto-detecting the format.
pub fn read_auto(content: &str, options: &ReadOptions) -> Result<(CaptionDocument, CaptionFormat)> {
    let format = detect_format(content)?;
    let doc = read_str(content, format, options)?;
    Ok((doc, format))
}

/// Convert content from one format to another.
pub fn convert(
    content: &str,
    from: CaptionFormat,
    to: CaptionFormat,
    read_options: &ReadOptions,
    write_options: &WriteOptions,
) -> Result<String> {
    let doc = read_str(content, from, read_options)?;
    doc.render(to, write_options)
}

/// Convert content to a format, auto-detecting the source.
pub fn convert_auto(content: &str, to: CaptionFormat) -> Result<String> {
    let (doc, _) = read_auto(content, &ReadOptions::default())?;
    doc.render(to, &WriteOptions::default())
}

/// Open a caption file and build a document from it.
///
/// A `.json` extension restores a snapshot. Anything else is decoded,
/// matched to a codec (explicit format, then extension, then sniffing) and
/// read; languages come from the filename unless given in `options.read`.
/// A failed `detect` is soft: the document comes back empty with a warning.
pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<CaptionDocument> {
    let path = path.as_ref();

    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        return crate::json::from_json_file(path);
    }

    let bytes =
        fs::read(path).map_err(|e| CaptionError::io(path.display().to_string(), e))?;
    let content = match options.encoding {
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|_| {
            CaptionError::UnsupportedContent(format!(
                "{} is not valid UTF-8; try Encoding::Auto",
                path.display()
            ))
        })?,
        Encoding::Auto => String::from_utf8_lossy(&bytes).into_owned(),
    };

    let format = match options.format {
        Some(format) => format,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(CaptionFormat::from_extension)
            .map_or_else(|| detect_format(&content), Ok)?,
    };
    let codec = format.codec()?;

    let mut doc = CaptionDocument::new();
    doc.filename = Some(path.to_path_buf());

    if !codec.detect(&content) {
        warn!(
            path = %path.display(),
            format = %format,
            "content did not match the expected format; returning an empty document"
        );
        return Ok(doc);
    }

    let mut read = options.read.clone();
    if read.languages.is_empty() {
        read.languages = languages_from_filename(path);
    }
    if let Some(first) = read.languages.first() {
        if doc.default_language == UND {
            doc.set_default_language(first);
        }
    }

    doc.read_content(codec, &content, &read)?;
    Ok(doc)
}

/// Produce the output lines for one caption block: the caller's generator
/// if given, otherwise the requested languages' lines zip-interleaved (the
/// inverse of the readers' line-cycling assignment), styled per `options`.
pub(crate) fn caption_output_lines(
    block: &Block,
    languages: &[String],
    options: &WriteOptions,
    generator: Option<LineGenerator<'_>>,
    to_markup: fn(&[StyledSpan]) -> String,
) -> Vec<String> {
    let mut lines = match generator {
        Some(generate) => generate(block, languages),
        None => {
            let Some(caption) = block.as_caption() else {
                return Vec::new();
            };
            let per_language: Vec<&Vec<CaptionLine>> = languages
                .iter()
                .filter_map(|lang| caption.text.get(lang))
                .collect();
            let longest = per_language.iter().map(|l| l.len()).max().unwrap_or(0);

            let mut lines = Vec::new();
            for index in 0..longest {
                for language_lines in &per_language {
                    if let Some(line) = language_lines.get(index) {
                        let rendered = match options.style {
                            StyleMode::Full => to_markup(&line.spans),
                            StyleMode::Plain => plain_text(&line.spans),
                        };
                        lines.push(rendered);
                    }
                }
            }
            lines
        }
    };

    if let Some(max) = options.lines {
        if max > 0 && lines.len() > max {
            let overflow = lines.split_off(max - 1).join(" ");
            lines.push(overflow);
        }
    }
    lines
}

/// Normalize the requested language list against a document default.
pub(crate) fn effective_languages(doc: &CaptionDocument, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec![doc.default_language.clone()]
    } else {
        requested.iter().map(|l| normalize_tag(l)).collect()
    }
}

/// Emit the one-time warning for unstyled output.
pub(crate) fn warn_plain_mode(format: CaptionFormat, mode: StyleMode) {
    if mode == StyleMode::Plain {
        warn!(%format, "style mode is not \"full\"; emitting plain text");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRT_SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n";
    const VTT_SAMPLE: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello\n";
    const SUB_SAMPLE: &str = "{25}{88}Hello\n";
    const TTML_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<tt xmlns="http://www.w3.org/ns/ttml"><body><div>
<p begin="1s" end="3.5s">Hello</p>
</div></body></tt>"#;

    #[test]
    fn test_extension_roundtrip() {
        for format in CaptionFormat::IMPLEMENTED {
            assert_eq!(
                CaptionFormat::from_extension(format.extension()),
                Some(format)
            );
        }
        assert_eq!(CaptionFormat::from_extension(".VTT"), Some(CaptionFormat::Vtt));
        assert_eq!(CaptionFormat::from_extension("bogus"), None);
    }

    #[test]
    fn test_stub_formats_are_unsupported() {
        for stub in [CaptionFormat::Lrc, CaptionFormat::Sami, CaptionFormat::Usf] {
            assert!(!stub.is_implemented());
            let err = stub.codec().err().unwrap();
            assert!(matches!(err, CaptionError::UnsupportedOperation { .. }));
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(SRT_SAMPLE).unwrap(), CaptionFormat::Srt);
        assert_eq!(detect_format(VTT_SAMPLE).unwrap(), CaptionFormat::Vtt);
        assert_eq!(detect_format(SUB_SAMPLE).unwrap(), CaptionFormat::Sub);
        assert_eq!(detect_format(TTML_SAMPLE).unwrap(), CaptionFormat::Ttml);
        assert!(detect_format("nothing recognizable").is_err());
    }

    #[test]
    fn test_read_str_strict_on_mismatch() {
        let err = read_str(VTT_SAMPLE, CaptionFormat::Srt, &ReadOptions::default()).unwrap_err();
        assert!(err.is_detection_mismatch());
    }

    #[test]
    fn test_convert_srt_to_vtt_scenario() {
        let vtt = convert_auto(SRT_SAMPLE, CaptionFormat::Vtt).unwrap();
        assert_eq!(
            vtt.trim_end(),
            "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello"
        );
    }

    #[test]
    fn test_read_applies_time_offset_once() {
        let options = ReadOptions {
            time_offset: Some(MicroTime::new(0, 0, 10, 0, 0)),
            ..ReadOptions::default()
        };
        let doc = read_str(SRT_SAMPLE, CaptionFormat::Srt, &options).unwrap();
        assert_eq!(
            doc.get(0).unwrap().start,
            Some(MicroTime::new(0, 0, 11, 0, 0))
        );
        assert_eq!(doc.time_length, Some(MicroTime::new(0, 0, 13, 500, 0)));
    }
}
