//! MicroDVD SUB codec.
//!
//! Frame-indexed: each line is `{start}{stop}text`, with `|` separating text
//! lines. The format has no absolute time of its own, so a frame rate must
//! come from the caller or from the `{1}{1}fps` header line some files open
//! with. Styling uses `{...}` control codes.

use crate::block::{Block, BlockData, BlockType, CaptionData, CaptionLine, MetadataData};
use crate::convert::{
    caption_output_lines, effective_languages, warn_plain_mode, CaptionFormat, CaptionsCodec,
    LineGenerator, ReadOptions, WriteOptions,
};
use crate::document::CaptionDocument;
use crate::error::{CaptionError, Result};
use crate::style::{spans_from_sub, spans_to_sub};
use crate::time::MicroTime;
use regex::Regex;
use std::collections::BTreeMap;

/// The MicroDVD codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubCodec;

impl CaptionsCodec for SubCodec {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Sub
    }

    fn detect(&self, content: &str) -> bool {
        let Some(first) = content.lines().find(|l| !l.trim().is_empty()) else {
            return false;
        };
        Regex::new(r"^\{\d+\}\{\d+\}")
            .unwrap()
            .is_match(first.trim())
    }

    fn read_into(
        &self,
        content: &str,
        doc: &mut CaptionDocument,
        options: &ReadOptions,
    ) -> Result<()> {
        let languages = effective_languages(doc, &options.languages);
        let line_regex = Regex::new(r"^\{(\d+)\}\{(\d+)\}(.*)$").unwrap();

        let mut frame_rate = options.frame_rate;
        let mut first_content_line = true;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let captures = line_regex.captures(line).ok_or_else(|| {
                CaptionError::malformed_block(
                    CaptionFormat::Sub,
                    line_no + 1,
                    "expected a {start}{stop}text line",
                )
            })?;

            let start_frame: u64 = captures[1].parse().map_err(|_| {
                CaptionError::malformed_block(CaptionFormat::Sub, line_no + 1, "invalid start frame")
            })?;
            let end_frame: u64 = captures[2].parse().map_err(|_| {
                CaptionError::malformed_block(CaptionFormat::Sub, line_no + 1, "invalid stop frame")
            })?;
            let payload = &captures[3];

            // The {1}{1}fps header convention: the first cue may carry the
            // track's own frame rate as its payload.
            if first_content_line && start_frame == 1 && end_frame == 1 {
                if let Ok(fps) = payload.trim().replace(',', ".").parse::<f64>() {
                    if frame_rate.is_none() {
                        frame_rate = Some(fps);
                    }
                    let mut entries = BTreeMap::new();
                    entries.insert("frame_rate".to_string(), format!("{fps}"));
                    doc.add_metadata(
                        "frame_rate",
                        Block::metadata(
                            None,
                            None,
                            MetadataData {
                                id: Some("frame_rate".to_string()),
                                entries,
                            },
                        ),
                    )?;
                    first_content_line = false;
                    continue;
                }
            }
            first_content_line = false;

            let fps = frame_rate.ok_or(CaptionError::MissingFrameRate {
                format: CaptionFormat::Sub,
            })?;

            let mut text: BTreeMap<String, Vec<CaptionLine>> = BTreeMap::new();
            for (k, raw) in payload.split('|').enumerate() {
                let language = &languages[k % languages.len()];
                text.entry(language.clone())
                    .or_default()
                    .push(CaptionLine::new(spans_from_sub(raw)));
            }

            doc.append(Block::caption(
                MicroTime::from_frames(start_frame, fps),
                MicroTime::from_frames(end_frame, fps),
                CaptionData {
                    text,
                    ..CaptionData::default()
                },
            ));
        }
        Ok(())
    }

    fn render_lines(
        &self,
        doc: &CaptionDocument,
        options: &WriteOptions,
        generator: Option<LineGenerator<'_>>,
    ) -> Result<String> {
        let languages = effective_languages(doc, &options.languages);
        warn_plain_mode(CaptionFormat::Sub, options.style);

        let stored_rate = doc.metadata_by_id("frame_rate").and_then(|block| {
            let BlockData::Metadata(meta) = &block.data else {
                return None;
            };
            meta.entries.get("frame_rate")?.parse::<f64>().ok()
        });
        let fps = options
            .frame_rate
            .or(stored_rate)
            .ok_or(CaptionError::MissingFrameRate {
                format: CaptionFormat::Sub,
            })?;

        let mut output = String::new();
        if options.frame_rate.is_none() {
            // The rate came from the source file; keep the header line.
            if stored_rate.is_some() {
                output.push_str(&format!("{{1}}{{1}}{fps}\n"));
            }
        }

        for block in doc.iter() {
            if block.block_type() != BlockType::Caption {
                continue;
            }
            let Some(start) = block.start else {
                continue;
            };
            let end = block.end.unwrap_or(start);

            let lines =
                caption_output_lines(block, &languages, options, generator, spans_to_sub);
            output.push_str(&format!(
                "{{{}}}{{{}}}{}\n",
                start.to_frames(fps),
                end.to_frames(fps),
                lines.join("|")
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::read_str;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "{25}{88}Hello|World\n{100}{150}Second\n";

    fn with_fps(fps: f64) -> ReadOptions {
        ReadOptions {
            frame_rate: Some(fps),
            ..ReadOptions::default()
        }
    }

    #[test]
    fn test_detect() {
        assert!(SubCodec.detect(SAMPLE));
        assert!(!SubCodec.detect("WEBVTT\n"));
        assert!(!SubCodec.detect("1\n00:00:01,000 --> 00:00:02,000\nHi\n"));
    }

    #[test]
    fn test_read_requires_frame_rate() {
        let err = read_str(SAMPLE, CaptionFormat::Sub, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, CaptionError::MissingFrameRate { .. }));
    }

    #[test]
    fn test_read_with_frame_rate() {
        let doc = read_str(SAMPLE, CaptionFormat::Sub, &with_fps(25.0)).unwrap();
        assert_eq!(doc.len(), 2);

        let first = doc.get(0).unwrap();
        // Frame 25 at 25fps is exactly one second.
        assert_eq!(first.start, Some(MicroTime::new(0, 0, 1, 0, 0)));
        assert_eq!(first.plain_lines("und"), vec!["Hello", "World"]);
    }

    #[test]
    fn test_fps_header_line() {
        let sample = "{1}{1}23.976\n{24}{48}Hello\n";
        let doc = read_str(sample, CaptionFormat::Sub, &ReadOptions::default()).unwrap();

        // The header supplied the rate: frame 24 at 23.976fps is ~1001ms.
        assert_eq!(doc.len(), 1);
        assert_eq!(
            doc.get(0).unwrap().start,
            Some(MicroTime::new(0, 0, 1, 1, 1))
        );
        assert!(doc.metadata_by_id("frame_rate").is_some());
    }

    #[test]
    fn test_malformed_line_aborts() {
        let sample = "{25}{88}Fine\nnot a sub line\n";
        let err = read_str(sample, CaptionFormat::Sub, &with_fps(25.0)).unwrap_err();
        match err {
            CaptionError::MalformedBlock { format, line, .. } => {
                assert_eq!(format, CaptionFormat::Sub);
                assert_eq!(line, 2);
            }
            other => panic!("expected MalformedBlock, got {other}"),
        }
    }

    #[test]
    fn test_write_roundtrip() {
        let doc = read_str(SAMPLE, CaptionFormat::Sub, &with_fps(25.0)).unwrap();
        let options = WriteOptions {
            frame_rate: Some(25.0),
            ..WriteOptions::default()
        };
        let output = SubCodec.render(&doc, &options).unwrap();
        assert_eq!(output, SAMPLE);
    }

    #[test]
    fn test_write_keeps_fps_header() {
        let sample = "{1}{1}25\n{25}{50}Hello\n";
        let doc = read_str(sample, CaptionFormat::Sub, &ReadOptions::default()).unwrap();
        let output = SubCodec.render(&doc, &WriteOptions::default()).unwrap();
        assert_eq!(output, sample);
    }

    #[test]
    fn test_styling_survives() {
        let sample = "{25}{88}{y:i}Slanted\n";
        let doc = read_str(sample, CaptionFormat::Sub, &with_fps(25.0)).unwrap();
        assert!(doc.get(0).unwrap().as_caption().unwrap().text["und"][0].spans[0]
            .style
            .italic);

        let options = WriteOptions {
            frame_rate: Some(25.0),
            ..WriteOptions::default()
        };
        let output = SubCodec.render(&doc, &options).unwrap();
        assert_eq!(output, sample);
    }

    #[test]
    fn test_multi_language_lines() {
        let sample = "{25}{88}Hello|Bonjour\n";
        let options = ReadOptions {
            languages: vec!["en".into(), "fr".into()],
            frame_rate: Some(25.0),
            ..ReadOptions::default()
        };
        let doc = read_str(sample, CaptionFormat::Sub, &options).unwrap();
        let block = doc.get(0).unwrap();
        assert_eq!(block.plain_lines("en"), vec!["Hello"]);
        assert_eq!(block.plain_lines("fr"), vec!["Bonjour"]);
    }
}
