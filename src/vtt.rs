//! WebVTT codec.
//!
//! A file is the `WEBVTT` header (optionally followed by `key: value`
//! metadata until the first blank line), then a body of `NOTE` comments,
//! `STYLE` blocks, `REGION` blocks and cues. `::cue(#id)` selectors are
//! rewritten to synthetic incrementing ids so identifiers from different
//! style blocks cannot collide; the original names are kept on the document.
//! A cue whose first text line starts with `{` is a timed metadata record
//! (the JSON-cue convention), not a caption.

use crate::block::{
    Block, BlockData, BlockType, CaptionData, CaptionLine, LayoutData, MetadataData, StyleData,
};
use crate::convert::{
    caption_output_lines, effective_languages, warn_plain_mode, CaptionFormat, CaptionsCodec,
    LineGenerator, ReadOptions, WriteOptions,
};
use crate::document::CaptionDocument;
use crate::error::{CaptionError, Result};
use crate::style::{declarations_from_css, declarations_to_css, spans_from_vtt, spans_to_vtt, StyleMode};
use crate::time::MicroTime;
use regex::Regex;
use std::collections::BTreeMap;

/// The WebVTT codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct VttCodec;

impl CaptionsCodec for VttCodec {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Vtt
    }

    fn detect(&self, content: &str) -> bool {
        content
            .trim_start_matches('\u{feff}')
            .lines()
            .next()
            .is_some_and(|l| l.trim_start().starts_with("WEBVTT"))
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

        // Header line, then optional key: value metadata until blank.
        lines.next();
        let mut header = BTreeMap::new();
        while let Some((_, line)) = lines.peek() {
            if line.trim().is_empty() {
                lines.next();
                break;
            }
            // A timing line this early means the blank separator was
            // omitted; the header is over.
            if line.contains("-->") {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                header.insert(key.trim().to_string(), value.trim().to_string());
            }
            lines.next();
        }
        if let Some(language) = header.get("Language") {
            if doc.default_language == crate::language::UND {
                doc.set_default_language(language);
            }
        }
        if !header.is_empty() {
            doc.add_metadata(
                "header",
                Block::metadata(
                    None,
                    None,
                    MetadataData {
                        id: Some("header".to_string()),
                        entries: header,
                    },
                ),
            )?;
        }

        let mut metadata_cues = 0usize;
        loop {
            while lines.peek().is_some_and(|(_, l)| l.trim().is_empty()) {
                lines.next();
            }
            let Some(&(line_no, line)) = lines.peek() else {
                break;
            };
            let trimmed = line.trim();

            if trimmed.starts_with("NOTE") {
                lines.next();
                let mut comment = Vec::new();
                let inline = trimmed.strip_prefix("NOTE").unwrap_or("").trim();
                if !inline.is_empty() {
                    comment.push(inline.to_string());
                }
                while let Some((_, l)) = lines.peek() {
                    if l.trim().is_empty() {
                        break;
                    }
                    comment.push(lines.next().unwrap().1.to_string());
                }
                doc.append(Block::comment(comment));
            } else if trimmed == "STYLE" || trimmed.starts_with("STYLE ") {
                lines.next();
                let mut body = String::new();
                while let Some((_, l)) = lines.peek() {
                    if l.trim().is_empty() {
                        break;
                    }
                    body.push_str(lines.next().unwrap().1);
                    body.push('\n');
                }
                read_style_block(&body, doc)?;
            } else if trimmed == "REGION" || trimmed.starts_with("REGION ") {
                lines.next();
                let mut settings = Vec::new();
                if let Some(inline) = trimmed.strip_prefix("REGION") {
                    settings.extend(inline.split_whitespace().map(str::to_string));
                }
                while let Some((_, l)) = lines.peek() {
                    if l.trim().is_empty() {
                        break;
                    }
                    settings.extend(
                        lines
                            .next()
                            .unwrap()
                            .1
                            .split_whitespace()
                            .map(str::to_string),
                    );
                }
                let layout = parse_region(&settings, line_no + 1)?;
                doc.add_layout(Block::layout(layout))?;
            } else {
                read_cue(&mut lines, doc, &languages, &mut metadata_cues)?;
            }
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
        warn_plain_mode(CaptionFormat::Vtt, options.style);

        let mut output = String::from("WEBVTT\n");

        if let Some(header) = doc.metadata_by_id("header") {
            if let BlockData::Metadata(meta) = &header.data {
                for (key, value) in &meta.entries {
                    output.push_str(&format!("{key}: {value}\n"));
                }
            }
        }
        output.push('\n');

        if options.style == StyleMode::Full {
            for style_block in doc.styles() {
                let BlockData::Style(style) = &style_block.data else {
                    continue;
                };
                output.push_str("STYLE\n");
                let selector = if doc
                    .aux()
                    .style_ids
                    .identifier_to_original
                    .contains_key(&style.id)
                {
                    format!("::cue(#{})", style.id)
                } else {
                    "::cue".to_string()
                };
                output.push_str(&format!(
                    "{selector} {{\n  {}\n}}\n\n",
                    declarations_to_css(&style.declarations)
                ));
            }
        }

        for layout_block in doc.layouts() {
            let BlockData::Layout(layout) = &layout_block.data else {
                continue;
            };
            output.push_str(&render_region(layout));
            output.push('\n');
        }

        for meta_block in doc.metadata_blocks() {
            let BlockData::Metadata(meta) = &meta_block.data else {
                continue;
            };
            let (Some(start), Some(json)) = (meta_block.start, meta.entries.get("json")) else {
                continue;
            };
            let end = meta_block.end.unwrap_or(start);
            if let Some(id) = &meta.id {
                output.push_str(&format!("{id}\n"));
            }
            output.push_str(&format!("{} --> {}\n{json}\n\n", start.to_vtt(), end.to_vtt()));
        }

        for block in doc.iter() {
            match (&block.data, block.block_type()) {
                (BlockData::Comment(comment), _) => {
                    if comment.lines.len() == 1 {
                        output.push_str(&format!("NOTE {}\n\n", comment.lines[0]));
                    } else {
                        output.push_str("NOTE\n");
                        for line in &comment.lines {
                            output.push_str(line);
                            output.push('\n');
                        }
                        output.push('\n');
                    }
                }
                (BlockData::Caption(caption), BlockType::Caption) => {
                    let Some(start) = block.start else {
                        continue;
                    };
                    let end = block.end.unwrap_or(start);

                    if let Some(id) = &caption.id {
                        output.push_str(&format!("{id}\n"));
                    }
                    output.push_str(&format!("{} --> {}", start.to_vtt(), end.to_vtt()));
                    if let Some(settings) = &caption.settings {
                        output.push(' ');
                        output.push_str(settings);
                    }
                    output.push('\n');

                    let lines =
                        caption_output_lines(block, &languages, options, generator, spans_to_vtt);
                    output.push_str(&lines.join(&options.new_line));
                    output.push_str("\n\n");
                }
                _ => {}
            }
        }

        // One trailing newline, not two.
        while output.ends_with("\n\n") {
            output.pop();
        }
        Ok(output)
    }
}

fn read_cue(
    lines: &mut std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'_>>>,
    doc: &mut CaptionDocument,
    languages: &[String],
    metadata_cues: &mut usize,
) -> Result<()> {
    let (first_no, first_line) = lines.next().expect("caller peeked");

    let (id, timing_line, timing_no) = if first_line.contains("-->") {
        (None, first_line, first_no)
    } else {
        let Some((no, line)) = lines.next() else {
            return Err(CaptionError::malformed_block(
                CaptionFormat::Vtt,
                first_no + 1,
                "truncated cue: identifier with no timing line",
            ));
        };
        (Some(first_line.trim().to_string()), line, no)
    };

    if !timing_line.contains("-->") {
        return Err(CaptionError::malformed_block(
            CaptionFormat::Vtt,
            timing_no + 1,
            "missing `-->` separator in cue timing line",
        ));
    }
    let (start_part, rest) = timing_line.split_once("-->").expect("checked above");
    let start = MicroTime::from_vtt(start_part.trim())?;
    let rest = rest.trim();
    let (end_token, settings) = match rest.split_once(char::is_whitespace) {
        Some((end, settings)) => (end, Some(settings.trim().to_string())),
        None => (rest, None),
    };
    let end = MicroTime::from_vtt(end_token)?;

    let mut text_lines = Vec::new();
    while let Some((_, l)) = lines.peek() {
        if l.trim().is_empty() {
            break;
        }
        text_lines.push(lines.next().unwrap().1);
    }

    // JSON-cue convention: a `{` opener marks timed metadata, not captions.
    if text_lines.first().is_some_and(|l| l.trim_start().starts_with('{')) {
        *metadata_cues += 1;
        let meta_id = id.unwrap_or_else(|| format!("meta{metadata_cues}"));
        let mut entries = BTreeMap::new();
        entries.insert("json".to_string(), text_lines.join("\n"));
        doc.add_metadata(
            &meta_id,
            Block::metadata(
                Some(start),
                Some(end),
                MetadataData {
                    id: Some(meta_id.clone()),
                    entries,
                },
            ),
        )?;
        return Ok(());
    }

    let mut text: BTreeMap<String, Vec<CaptionLine>> = BTreeMap::new();
    for (k, raw) in text_lines.iter().enumerate() {
        let language = &languages[k % languages.len()];
        text.entry(language.clone())
            .or_default()
            .push(CaptionLine::new(spans_from_vtt(raw)));
    }

    // A cue id matching a rewritten ::cue(#id) selector references that
    // style under its synthetic name.
    let style_refs = id
        .as_deref()
        .and_then(|id| doc.aux().style_ids.identifier_to_new.get(id))
        .map(|new_id| vec![new_id.clone()])
        .unwrap_or_default();

    doc.append(Block::caption(
        start,
        end,
        CaptionData {
            id,
            text,
            style_refs,
            layout_ref: None,
            settings,
        },
    ));
    Ok(())
}

/// Parse one `STYLE` block body, rewriting every `::cue(#id)` selector to a
/// synthetic id while recording the original name.
fn read_style_block(body: &str, doc: &mut CaptionDocument) -> Result<()> {
    let selector_regex = Regex::new(r"::cue(?:\(#([^)]+)\))?\s*\{([^}]*)\}").unwrap();

    for cap in selector_regex.captures_iter(body) {
        let original = cap.get(1).map(|m| m.as_str());
        let declarations = declarations_from_css(&cap[2]);
        let id = doc.allocate_style_id(original);
        doc.add_style(Block::style(StyleData { id, declarations }))?;
    }
    Ok(())
}

fn parse_region(settings: &[String], line_no: usize) -> Result<LayoutData> {
    let mut layout = LayoutData::default();
    for setting in settings {
        let Some((key, value)) = setting.split_once(':') else {
            continue;
        };
        match key {
            "id" => layout.id = value.to_string(),
            "width" => {
                layout.extent = Some((parse_percentage(value, line_no)?, 0.0));
            }
            "lines" => {
                layout.lines = Some(value.parse().map_err(|_| {
                    CaptionError::malformed_block(
                        CaptionFormat::Vtt,
                        line_no,
                        format!("invalid region line count {value:?}"),
                    )
                })?);
            }
            "regionanchor" => layout.region_anchor = Some(parse_anchor(value, line_no)?),
            "viewportanchor" => layout.origin = Some(parse_anchor(value, line_no)?),
            "scroll" => layout.scroll_up = value == "up",
            _ => {}
        }
    }
    if layout.id.is_empty() {
        layout.id = "region".to_string();
    }
    Ok(layout)
}

fn parse_percentage(value: &str, line_no: usize) -> Result<f64> {
    let number = value.trim().trim_end_matches('%');
    let parsed: f64 = number.parse().map_err(|_| {
        CaptionError::malformed_block(
            CaptionFormat::Vtt,
            line_no,
            format!("invalid percentage {value:?}"),
        )
    })?;
    Ok(parsed / 100.0)
}

fn parse_anchor(value: &str, line_no: usize) -> Result<(f64, f64)> {
    let Some((x, y)) = value.split_once(',') else {
        return Err(CaptionError::malformed_block(
            CaptionFormat::Vtt,
            line_no,
            format!("anchor {value:?} is not an x,y pair"),
        ));
    };
    Ok((
        parse_percentage(x, line_no)?,
        parse_percentage(y, line_no)?,
    ))
}

fn render_region(layout: &LayoutData) -> String {
    let mut out = String::from("REGION\n");
    out.push_str(&format!("id:{}\n", layout.id));
    if let Some((width, _)) = layout.extent {
        out.push_str(&format!("width:{}\n", format_percentage(width)));
    }
    if let Some(lines) = layout.lines {
        out.push_str(&format!("lines:{lines}\n"));
    }
    if let Some((x, y)) = layout.region_anchor {
        out.push_str(&format!(
            "regionanchor:{},{}\n",
            format_percentage(x),
            format_percentage(y)
        ));
    }
    if let Some((x, y)) = layout.origin {
        out.push_str(&format!(
            "viewportanchor:{},{}\n",
            format_percentage(x),
            format_percentage(y)
        ));
    }
    if layout.scroll_up {
        out.push_str("scroll:up\n");
    }
    out
}

fn format_percentage(fraction: f64) -> String {
    let percent = fraction * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{}%", percent.round() as i64)
    } else {
        format!("{percent}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::read_str;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello\n\n00:00:05.000 --> 00:00:08.000\nSecond cue\n";

    #[test]
    fn test_detect() {
        assert!(VttCodec.detect(SAMPLE));
        assert!(VttCodec.detect("\u{feff}WEBVTT - with title\n"));
        assert!(!VttCodec.detect("1\n00:00:01,000 --> 00:00:02,000\nHi\n"));
    }

    #[test]
    fn test_read_simple() {
        let doc = read_str(SAMPLE, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
        assert_eq!(doc.len(), 2);
        let first = doc.get(0).unwrap();
        assert_eq!(first.start, Some(MicroTime::new(0, 0, 1, 0, 0)));
        assert_eq!(first.plain_lines("und"), vec!["Hello"]);
    }

    #[test]
    fn test_header_metadata() {
        let sample = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        let header = doc.metadata_by_id("header").unwrap();
        let BlockData::Metadata(meta) = &header.data else {
            panic!("expected metadata");
        };
        assert_eq!(meta.entries.get("Kind").map(String::as_str), Some("captions"));
        // The header language seeds the default when none was set.
        assert_eq!(doc.default_language, "en");
    }

    #[test]
    fn test_notes_become_comments() {
        let sample =
            "WEBVTT\n\nNOTE This is a comment\nspanning two lines\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        assert_eq!(doc.len(), 2);
        let BlockData::Comment(comment) = &doc.get(0).unwrap().data else {
            panic!("expected comment");
        };
        assert_eq!(comment.lines.len(), 2);
    }

    #[test]
    fn test_style_blocks_get_synthetic_ids() {
        let sample = "WEBVTT\n\nSTYLE\n::cue(#speaker) {\n  color: lime;\n}\n\nSTYLE\n::cue(#speaker) {\n  color: red;\n}\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        // Two source blocks with the same visual id get distinct ids.
        assert!(doc.style_by_id("style1").is_some());
        assert!(doc.style_by_id("style2").is_some());
        assert_eq!(
            doc.aux().style_ids.identifier_to_original.get("style1"),
            Some(&"speaker".to_string())
        );
    }

    #[test]
    fn test_cue_with_id_references_style() {
        let sample = "WEBVTT\n\nSTYLE\n::cue(#intro) {\n  color: yellow;\n}\n\nintro\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        let caption = doc.get(0).unwrap().as_caption().unwrap();
        assert_eq!(caption.id.as_deref(), Some("intro"));
        assert_eq!(caption.style_refs, vec!["style1".to_string()]);
    }

    #[test]
    fn test_region_block() {
        let sample = "WEBVTT\n\nREGION\nid:fred\nwidth:40%\nlines:3\nregionanchor:0%,100%\nviewportanchor:10%,90%\nscroll:up\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        let BlockData::Layout(layout) = &doc.layout_by_id("fred").unwrap().data else {
            panic!("expected layout");
        };
        assert_eq!(layout.extent.map(|e| e.0), Some(0.4));
        assert_eq!(layout.lines, Some(3));
        assert_eq!(layout.region_anchor, Some((0.0, 1.0)));
        assert_eq!(layout.origin, Some((0.1, 0.9)));
        assert!(layout.scroll_up);
    }

    #[test]
    fn test_json_cue_is_metadata() {
        let sample =
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n{\"kind\": \"chapter\"}\n\n00:00:03.000 --> 00:00:04.000\nReal caption\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        // Only the real caption lands in the block list.
        assert_eq!(doc.len(), 1);
        let meta = doc.metadata_by_id("meta1").unwrap();
        assert_eq!(meta.block_type(), BlockType::Metadata);
        assert_eq!(meta.start, Some(MicroTime::new(0, 0, 1, 0, 0)));
    }

    #[test]
    fn test_cue_settings_roundtrip() {
        let sample =
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000 position:10% line:90% align:start\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
        let caption = doc.get(0).unwrap().as_caption().unwrap();
        assert_eq!(
            caption.settings.as_deref(),
            Some("position:10% line:90% align:start")
        );

        let output = VttCodec.render(&doc, &WriteOptions::default()).unwrap();
        assert!(output.contains("00:00:01.000 --> 00:00:02.000 position:10% line:90% align:start"));
    }

    #[test]
    fn test_missing_arrow_is_malformed() {
        let sample = "WEBVTT\n\nsome-id\nnot a timing line\nHi\n";
        let err = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, CaptionError::MalformedBlock { .. }));
    }

    #[test]
    fn test_write_roundtrip() {
        let doc = read_str(SAMPLE, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
        let output = VttCodec.render(&doc, &WriteOptions::default()).unwrap();
        let again = read_str(&output, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();

        assert_eq!(doc.len(), again.len());
        for (a, b) in doc.iter().zip(again.iter()) {
            assert_eq!(a.start, b.start);
            assert_eq!(a.end, b.end);
            assert_eq!(a.plain_lines("und"), b.plain_lines("und"));
        }
    }

    #[test]
    fn test_write_emits_styles_and_regions() {
        let sample = "WEBVTT\n\nSTYLE\n::cue(#talker) {\n  color: red;\n}\n\nREGION\nid:bottom\nwidth:50%\nlines:2\nviewportanchor:25%,90%\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
        let output = VttCodec.render(&doc, &WriteOptions::default()).unwrap();

        assert!(output.contains("STYLE\n::cue(#style1) {"));
        assert!(output.contains("color: #FF0000;"));
        assert!(output.contains("REGION\nid:bottom\nwidth:50%\nlines:2\n"));
    }

    #[test]
    fn test_plain_mode_drops_styles() {
        let sample = "WEBVTT\n\nSTYLE\n::cue {\n  color: red;\n}\n\n00:00:01.000 --> 00:00:02.000\n<b>Hi</b>\n";
        let doc = read_str(sample, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
        let output = VttCodec
            .render(
                &doc,
                &WriteOptions {
                    style: StyleMode::Plain,
                    ..WriteOptions::default()
                },
            )
            .unwrap();

        assert!(!output.contains("STYLE"));
        assert!(!output.contains("<b>"));
        assert!(output.contains("Hi"));
    }
}
