//! SRT (SubRip) codec.
//!
//! Blocks are `index`, a timing line (`start --> end`, optionally followed
//! by an `X1: X2: Y1: Y2:` pixel box), text lines, and a blank separator.
//! The pixel box becomes a normalized layout region using the document's
//! media dimensions. Multi-language tracks interleave their lines: text
//! line *k* belongs to language *k mod N*.

use crate::block::{Block, BlockType, CaptionData, CaptionLine, LayoutData};
use crate::convert::{
    caption_output_lines, effective_languages, warn_plain_mode, CaptionFormat, CaptionsCodec,
    LineGenerator, ReadOptions, WriteOptions,
};
use crate::document::CaptionDocument;
use crate::error::{CaptionError, Result};
use crate::style::{spans_from_srt, spans_to_srt};
use crate::time::MicroTime;
use std::collections::BTreeMap;

/// The SubRip codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrtCodec;

impl CaptionsCodec for SrtCodec {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Srt
    }

    fn detect(&self, content: &str) -> bool {
        // A numeric cue index, then a timing line. Two lines, nothing more.
        let content = content.trim_start_matches('\u{feff}');
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let Some(first) = lines.next() else {
            return false;
        };
        if first.trim().parse::<u64>().is_err() {
            return false;
        }
        match lines.next() {
            Some(second) => second.contains("-->"),
            None => false,
        }
    }

    fn read_into(
        &self,
        content: &str,
        doc: &mut CaptionDocument,
        options: &ReadOptions,
    ) -> Result<()> {
        let content = content.trim_start_matches('\u{feff}');
        let languages = effective_languages(doc, &options.languages);
        let mut lines = content.lines().enumerate().peekable();

        loop {
            while lines.peek().is_some_and(|(_, l)| l.trim().is_empty()) {
                lines.next();
            }
            let Some((index_no, index_line)) = lines.next() else {
                break;
            };

            index_line.trim().parse::<u64>().map_err(|_| {
                CaptionError::malformed_block(
                    CaptionFormat::Srt,
                    index_no + 1,
                    format!("expected a numeric cue index, got {:?}", index_line.trim()),
                )
            })?;

            let Some((timing_no, timing_line)) = lines.next() else {
                return Err(CaptionError::malformed_block(
                    CaptionFormat::Srt,
                    index_no + 1,
                    "truncated block: missing timing line",
                ));
            };
            let (start, end, layout) =
                parse_timing_line(timing_line.trim(), timing_no + 1, doc)?;

            let mut text_lines = Vec::new();
            while let Some((_, line)) = lines.peek() {
                if line.trim().is_empty() {
                    break;
                }
                text_lines.push(lines.next().unwrap().1);
            }

            let mut text: BTreeMap<String, Vec<CaptionLine>> = BTreeMap::new();
            for (k, raw) in text_lines.iter().enumerate() {
                let language = &languages[k % languages.len()];
                text.entry(language.clone())
                    .or_default()
                    .push(CaptionLine::new(spans_from_srt(raw)));
            }

            let layout_ref = match layout {
                Some(layout) => {
                    let id = layout.id.clone();
                    doc.add_layout(Block::layout(layout))?;
                    Some(id)
                }
                None => None,
            };

            doc.append(Block::caption(
                start,
                end,
                CaptionData {
                    text,
                    layout_ref,
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
        warn_plain_mode(CaptionFormat::Srt, options.style);

        let mut output = String::new();
        let mut index = 1usize;
        for block in doc.iter() {
            if block.block_type() != BlockType::Caption {
                // SRT has no comment or header syntax.
                continue;
            }
            let Some(start) = block.start else {
                continue;
            };
            let end = block.end.unwrap_or(start);

            output.push_str(&format!("{index}\n"));
            output.push_str(&format!("{} --> {}", start.to_srt(), end.to_srt()));
            if let Some(coords) = coordinate_suffix(doc, block) {
                output.push(' ');
                output.push_str(&coords);
            }
            output.push('\n');

            let lines =
                caption_output_lines(block, &languages, options, generator, spans_to_srt);
            output.push_str(&lines.join(&options.new_line));
            output.push_str("\n\n");
            index += 1;
        }
        Ok(output)
    }
}

fn parse_timing_line(
    line: &str,
    line_no: usize,
    doc: &CaptionDocument,
) -> Result<(MicroTime, MicroTime, Option<LayoutData>)> {
    let Some((start_part, rest)) = line.split_once("-->") else {
        return Err(CaptionError::malformed_block(
            CaptionFormat::Srt,
            line_no,
            "missing `-->` separator in timing line",
        ));
    };

    let start = MicroTime::from_srt(start_part.trim())?;
    let rest = rest.trim();
    let mut tokens = rest.split_whitespace();
    let end_token = tokens.next().ok_or_else(|| {
        CaptionError::malformed_block(CaptionFormat::Srt, line_no, "missing end time")
    })?;
    let end = MicroTime::from_srt(end_token)?;

    let remainder: Vec<&str> = tokens.collect();
    if remainder.is_empty() {
        return Ok((start, end, None));
    }

    let layout = parse_coordinate_box(&remainder, line_no, doc)?;
    Ok((start, end, Some(layout)))
}

/// Parse the extended `X1:.. X2:.. Y1:.. Y2:..` suffix into a normalized
/// layout region.
fn parse_coordinate_box(
    tokens: &[&str],
    line_no: usize,
    doc: &CaptionDocument,
) -> Result<LayoutData> {
    let mut coords: BTreeMap<String, f64> = BTreeMap::new();
    for token in tokens {
        let Some((key, value)) = token.split_once(':') else {
            return Err(CaptionError::malformed_block(
                CaptionFormat::Srt,
                line_no,
                format!("unrecognized timing-line token {token:?}"),
            ));
        };
        let value: f64 = value.parse().map_err(|_| {
            CaptionError::malformed_block(
                CaptionFormat::Srt,
                line_no,
                format!("invalid coordinate value {token:?}"),
            )
        })?;
        coords.insert(key.to_ascii_uppercase(), value);
    }

    let (Some(x1), Some(x2), Some(y1), Some(y2)) = (
        coords.get("X1"),
        coords.get("X2"),
        coords.get("Y1"),
        coords.get("Y2"),
    ) else {
        return Err(CaptionError::malformed_block(
            CaptionFormat::Srt,
            line_no,
            "incomplete coordinate box: need X1, X2, Y1 and Y2",
        ));
    };

    let width = doc.media_width as f64;
    let height = doc.media_height as f64;
    Ok(LayoutData {
        id: format!("box{}", doc.aux().layout.len() + 1),
        origin: Some((x1 / width, y1 / height)),
        region_anchor: None,
        extent: Some(((x2 - x1) / width, (y2 - y1) / height)),
        lines: None,
        scroll_up: false,
    })
}

/// Render a caption's layout reference back into the pixel-box suffix.
fn coordinate_suffix(doc: &CaptionDocument, block: &Block) -> Option<String> {
    let caption = block.as_caption()?;
    let layout_ref = caption.layout_ref.as_deref()?;
    let layout_block = doc.layout_by_id(layout_ref)?;
    let crate::block::BlockData::Layout(layout) = &layout_block.data else {
        return None;
    };
    let (ax, ay) = layout.origin?;
    let (ex, ey) = layout.extent?;

    let width = doc.media_width as f64;
    let height = doc.media_height as f64;
    let x1 = (ax * width).round() as i64;
    let y1 = (ay * height).round() as i64;
    let x2 = ((ax + ex) * width).round() as i64;
    let y2 = ((ay + ey) * height).round() as i64;
    Some(format!("X1:{x1} X2:{x2} Y1:{y1} Y2:{y2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::read_str;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n2\n00:00:05,000 --> 00:00:08,000\nSecond cue\nwith two lines\n\n";

    #[test]
    fn test_detect() {
        assert!(SrtCodec.detect(SAMPLE));
        assert!(!SrtCodec.detect("WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n"));
        assert!(!SrtCodec.detect(""));
        assert!(!SrtCodec.detect("1\njust text"));
    }

    #[test]
    fn test_read_simple() {
        let doc = read_str(SAMPLE, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
        assert_eq!(doc.len(), 2);

        let first = doc.get(0).unwrap();
        assert_eq!(first.start, Some(MicroTime::new(0, 0, 1, 0, 0)));
        assert_eq!(first.end, Some(MicroTime::new(0, 0, 3, 500, 0)));
        assert_eq!(first.plain_lines("und"), vec!["Hello"]);

        let second = doc.get(1).unwrap();
        assert_eq!(second.plain_lines("und"), vec!["Second cue", "with two lines"]);
        assert_eq!(doc.time_length, Some(MicroTime::new(0, 0, 8, 0, 0)));
    }

    #[test]
    fn test_missing_arrow_is_malformed() {
        let broken = "1\n00:00:01,000 00:00:03,500\nHello\n\n";
        let err = read_str(broken, CaptionFormat::Srt, &ReadOptions::default()).unwrap_err();
        match err {
            CaptionError::MalformedBlock { format, line, .. } => {
                assert_eq!(format, CaptionFormat::Srt);
                assert_eq!(line, 2);
            }
            other => panic!("expected MalformedBlock, got {other}"),
        }
    }

    #[test]
    fn test_truncated_block_is_malformed() {
        let broken = "1\n";
        let err = read_str(broken, CaptionFormat::Srt, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, CaptionError::MalformedBlock { .. }));
    }

    #[test]
    fn test_multi_language_line_cycling() {
        let sample = "1\n00:00:01,000 --> 00:00:03,000\nHello\nBonjour\n\n";
        let options = ReadOptions {
            languages: vec!["en".into(), "fr".into()],
            ..ReadOptions::default()
        };
        let doc = read_str(sample, CaptionFormat::Srt, &options).unwrap();

        let block = doc.get(0).unwrap();
        assert_eq!(block.plain_lines("en"), vec!["Hello"]);
        assert_eq!(block.plain_lines("fr"), vec!["Bonjour"]);
    }

    #[test]
    fn test_coordinate_box_becomes_layout() {
        let sample = "1\n00:00:01,000 --> 00:00:03,000 X1:192 X2:384 Y1:108 Y2:216\nBoxed\n\n";
        let doc = read_str(sample, CaptionFormat::Srt, &ReadOptions::default()).unwrap();

        let caption = doc.get(0).unwrap().as_caption().unwrap();
        let layout_id = caption.layout_ref.as_deref().unwrap();
        let layout_block = doc.layout_by_id(layout_id).unwrap();
        let crate::block::BlockData::Layout(layout) = &layout_block.data else {
            panic!("expected layout data");
        };

        // 1920x1080 media: 192px is 10% of the width, 108px 10% of height.
        assert_eq!(layout.origin, Some((0.1, 0.1)));
        assert_eq!(layout.extent, Some((0.1, 0.1)));
    }

    #[test]
    fn test_write_roundtrip() {
        let doc = read_str(SAMPLE, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
        let output = SrtCodec.render(&doc, &WriteOptions::default()).unwrap();
        assert_eq!(output, SAMPLE);
    }

    #[test]
    fn test_write_coordinates_roundtrip() {
        let sample = "1\n00:00:01,000 --> 00:00:03,000 X1:192 X2:384 Y1:108 Y2:216\nBoxed\n\n";
        let doc = read_str(sample, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
        let output = SrtCodec.render(&doc, &WriteOptions::default()).unwrap();
        assert_eq!(output, sample);
    }

    #[test]
    fn test_write_interleaves_languages() {
        let sample = "1\n00:00:01,000 --> 00:00:03,000\nHello\nBonjour\n\n";
        let options = ReadOptions {
            languages: vec!["en".into(), "fr".into()],
            ..ReadOptions::default()
        };
        let doc = read_str(sample, CaptionFormat::Srt, &options).unwrap();

        let write = WriteOptions {
            languages: vec!["en".into(), "fr".into()],
            ..WriteOptions::default()
        };
        let output = SrtCodec.render(&doc, &write).unwrap();
        assert_eq!(output, sample);
    }

    #[test]
    fn test_styled_text_survives() {
        let sample = "1\n00:00:01,000 --> 00:00:03,000\n<b>Bold</b> words\n\n";
        let doc = read_str(sample, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
        let output = SrtCodec.render(&doc, &WriteOptions::default()).unwrap();
        assert!(output.contains("<b>Bold</b> words"));
    }

    #[test]
    fn test_custom_generator() {
        let doc = read_str(SAMPLE, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
        let output = SrtCodec
            .render_lines(
                &doc,
                &WriteOptions::default(),
                Some(&|_block: &Block, _langs: &[String]| vec!["REPLACED".to_string()]),
            )
            .unwrap();
        assert!(output.contains("REPLACED"));
        assert!(!output.contains("Hello"));
    }
}
