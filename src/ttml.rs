//! TTML (Timed Text Markup Language) codec.
//!
//! Reading walks the XML event stream: `head/styling/style` elements feed
//! the style table, `head/layout/region` the layout table, `head/metadata`
//! children the metadata table, and `body/div/p` paragraphs become caption
//! blocks. Times follow the TTML polymorphic model (`begin`/`dur`/`end`,
//! metric offsets or clock strings, `ttp:frameRate` honored from the root).
//! Styling maps through the `tts:` property table both ways.

use crate::block::{
    Block, BlockData, BlockType, CaptionData, CaptionLine, LayoutData, MetadataData, StyleData,
};
use crate::convert::{
    caption_output_lines, effective_languages, warn_plain_mode, CaptionFormat, CaptionsCodec,
    LineGenerator, ReadOptions, WriteOptions,
};
use crate::document::CaptionDocument;
use crate::error::{CaptionError, Result};
use crate::style::{
    canonical_property, ttml_attribute, ttml_value, StyleDeclarations, StyledSpan,
};
use crate::time::{resolve_ttml_interval, TtmlTimeContext};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// The TTML codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtmlCodec;

impl CaptionsCodec for TtmlCodec {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Ttml
    }

    fn detect(&self, content: &str) -> bool {
        // The root element shows up in the first line or two.
        content
            .lines()
            .take(2)
            .any(|line| line.contains("<tt ") || line.contains("<tt>") || line.contains("<tt:tt"))
    }

    fn read_into(
        &self,
        content: &str,
        doc: &mut CaptionDocument,
        options: &ReadOptions,
    ) -> Result<()> {
        TtmlReader::new(content, doc, options).run()
    }

    fn render_lines(
        &self,
        doc: &CaptionDocument,
        options: &WriteOptions,
        generator: Option<LineGenerator<'_>>,
    ) -> Result<String> {
        render(doc, options, generator)
    }
}

// --- reading -------------------------------------------------------------

struct TtmlReader<'a> {
    content: &'a str,
    doc: &'a mut CaptionDocument,
    languages: Vec<String>,
    ctx: TtmlTimeContext,
    path: Vec<String>,
    div_langs: Vec<Option<String>>,
    tt_lang: Option<String>,
    head_metadata: BTreeMap<String, String>,
    metadata_element: Option<String>,
    region: Option<LayoutData>,
    paragraph: Option<Paragraph>,
}

struct Paragraph {
    start: Option<crate::time::MicroTime>,
    end: Option<crate::time::MicroTime>,
    id: Option<String>,
    region: Option<String>,
    style_refs: Vec<String>,
    lang: Option<String>,
    lines: Vec<CaptionLine>,
    spans: Vec<StyledSpan>,
    text: String,
    style: StyleDeclarations,
    stack: Vec<StyleDeclarations>,
}

impl<'a> TtmlReader<'a> {
    fn new(content: &'a str, doc: &'a mut CaptionDocument, options: &ReadOptions) -> Self {
        let languages = effective_languages(doc, &options.languages);
        Self {
            content,
            doc,
            languages,
            ctx: TtmlTimeContext {
                frame_rate: options.frame_rate,
                sub_frame_rate: options.sub_frame_rate,
            },
            path: Vec::new(),
            div_langs: Vec::new(),
            tt_lang: None,
            head_metadata: BTreeMap::new(),
            metadata_element: None,
            region: None,
            paragraph: None,
        }
    }

    fn run(mut self) -> Result<()> {
        let mut reader = Reader::from_str(self.content);

        loop {
            let position = reader.buffer_position() as usize;
            match reader.read_event() {
                Err(err) => {
                    return Err(CaptionError::malformed_block(
                        CaptionFormat::Ttml,
                        line_of(self.content, position),
                        err.to_string(),
                    ))
                }
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    let name = local_name(&e);
                    self.open_element(&name, &e, position)?;
                    self.path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = local_name(&e);
                    self.open_element(&name, &e, position)?;
                    self.close_element(&name)?;
                }
                Ok(Event::End(e)) => {
                    let name = e
                        .name()
                        .as_ref()
                        .split(|b| *b == b':')
                        .last()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    self.path.pop();
                    self.close_element(&name)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| {
                        CaptionError::malformed_block(
                            CaptionFormat::Ttml,
                            line_of(self.content, position),
                            err.to_string(),
                        )
                    })?;
                    self.text(&text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    self.text(&text);
                }
                Ok(_) => {}
            }
        }

        if !self.head_metadata.is_empty() {
            let entries = std::mem::take(&mut self.head_metadata);
            self.doc.add_metadata(
                "head",
                Block::metadata(
                    None,
                    None,
                    MetadataData {
                        id: Some("head".to_string()),
                        entries,
                    },
                ),
            )?;
        }
        Ok(())
    }

    fn open_element(&mut self, name: &str, e: &BytesStart<'_>, position: usize) -> Result<()> {
        let attrs = attributes(e, self.content, position)?;
        match name {
            "tt" => {
                if let Some(rate) = attrs.get("ttp:frameRate") {
                    if self.ctx.frame_rate.is_none() {
                        self.ctx.frame_rate = rate.parse().ok();
                    }
                }
                if let Some(rate) = attrs.get("ttp:subFrameRate") {
                    if self.ctx.sub_frame_rate.is_none() {
                        self.ctx.sub_frame_rate = rate.parse().ok();
                    }
                }
                self.tt_lang = attrs.get("xml:lang").cloned().filter(|l| !l.is_empty());
                if let Some(lang) = &self.tt_lang {
                    if self.doc.default_language == crate::language::UND {
                        self.doc.set_default_language(lang);
                    }
                }
            }
            "style" if self.in_path(&["head", "styling"]) => {
                let id = attrs
                    .get("xml:id")
                    .cloned()
                    .unwrap_or_else(|| format!("style{}", self.doc.aux().style.len() + 1));
                let declarations = declarations_from_attrs(&attrs);
                self.doc
                    .add_style(Block::style(StyleData { id, declarations }))?;
            }
            "style" if self.region.is_some() => {
                // Regions may carry their geometry on a nested style child.
                let region = self.region.as_mut().expect("checked");
                apply_region_attrs(region, &attrs);
            }
            "region" if self.in_path(&["head", "layout"]) => {
                let mut layout = LayoutData {
                    id: attrs
                        .get("xml:id")
                        .cloned()
                        .unwrap_or_else(|| format!("region{}", self.doc.aux().layout.len() + 1)),
                    ..LayoutData::default()
                };
                apply_region_attrs(&mut layout, &attrs);
                self.region = Some(layout);
            }
            "div" if self.in_path(&["body"]) => {
                self.div_langs
                    .push(attrs.get("xml:lang").cloned().filter(|l| !l.is_empty()));
            }
            "p" if self.paragraph.is_none() => {
                let (start, end) = resolve_ttml_interval(
                    attrs.get("begin").map(String::as_str),
                    attrs.get("dur").map(String::as_str),
                    attrs.get("end").map(String::as_str),
                    &self.ctx,
                )?;
                self.paragraph = Some(Paragraph {
                    start,
                    end,
                    id: attrs.get("xml:id").cloned(),
                    region: attrs.get("region").cloned(),
                    style_refs: attrs
                        .get("style")
                        .map(|s| s.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default(),
                    lang: attrs.get("xml:lang").cloned().filter(|l| !l.is_empty()),
                    lines: Vec::new(),
                    spans: Vec::new(),
                    text: String::new(),
                    style: StyleDeclarations::default(),
                    stack: Vec::new(),
                });
            }
            "span" => {
                if let Some(p) = &mut self.paragraph {
                    flush_text(p);
                    p.stack.push(p.style.clone());
                    for (key, value) in &attrs {
                        if let Some(canonical) = canonical_property(key) {
                            p.style
                                .apply_css_property(canonical, &css_value(canonical, value));
                        }
                    }
                }
            }
            "br" => {
                if let Some(p) = &mut self.paragraph {
                    flush_text(p);
                    finish_line(p);
                }
            }
            _ if self.in_path(&["head", "metadata"]) => {
                self.metadata_element = Some(name.to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn close_element(&mut self, name: &str) -> Result<()> {
        match name {
            "region" => {
                if let Some(region) = self.region.take() {
                    self.doc.add_layout(Block::layout(region))?;
                }
            }
            "div" => {
                self.div_langs.pop();
            }
            "span" => {
                if let Some(p) = &mut self.paragraph {
                    flush_text(p);
                    if let Some(previous) = p.stack.pop() {
                        p.style = previous;
                    }
                }
            }
            "p" => {
                if let Some(mut p) = self.paragraph.take() {
                    flush_text(&mut p);
                    finish_line(&mut p);
                    self.finish_paragraph(p);
                }
            }
            _ => {
                if self.metadata_element.as_deref() == Some(name) {
                    self.metadata_element = None;
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(element) = &self.metadata_element {
            if !text.trim().is_empty() {
                self.head_metadata
                    .entry(element.clone())
                    .or_default()
                    .push_str(text.trim());
            }
            return;
        }
        if let Some(p) = &mut self.paragraph {
            if !text.trim().is_empty() {
                p.text.push_str(text);
            }
        }
    }

    fn finish_paragraph(&mut self, p: Paragraph) {
        let language = p
            .lang
            .clone()
            .or_else(|| self.div_langs.last().cloned().flatten())
            .or_else(|| self.tt_lang.clone());

        let mut text: BTreeMap<String, Vec<CaptionLine>> = BTreeMap::new();
        match language {
            Some(language) => {
                text.insert(crate::language::normalize_tag(&language), p.lines);
            }
            None => {
                for (k, line) in p.lines.into_iter().enumerate() {
                    let language = &self.languages[k % self.languages.len()];
                    text.entry(language.clone()).or_default().push(line);
                }
            }
        }

        let block = Block {
            start: p.start,
            end: p.end,
            data: BlockData::Caption(CaptionData {
                id: p.id,
                text,
                style_refs: p.style_refs,
                layout_ref: p.region,
                settings: None,
            }),
        };
        self.doc.append(block);
    }

    fn in_path(&self, suffix: &[&str]) -> bool {
        self.path.len() >= suffix.len()
            && self.path[self.path.len() - suffix.len()..]
                .iter()
                .zip(suffix)
                .all(|(a, b)| a == b)
    }
}

fn flush_text(p: &mut Paragraph) {
    if !p.text.is_empty() {
        let text = normalize_space(&std::mem::take(&mut p.text));
        p.spans.push(StyledSpan::new(text, p.style.clone()));
    }
}

fn finish_line(p: &mut Paragraph) {
    if !p.spans.is_empty() {
        p.lines.push(CaptionLine::new(std::mem::take(&mut p.spans)));
    }
}

/// Collapse runs of whitespace (pretty-printed XML indentation) to single
/// spaces, keeping a single leading/trailing space when one was present.
fn normalize_space(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::new();
    if text.starts_with(char::is_whitespace) && !collapsed.is_empty() {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) && !collapsed.is_empty() {
        out.push(' ');
    }
    out
}

fn local_name(e: &BytesStart<'_>) -> String {
    e.name()
        .as_ref()
        .split(|b| *b == b':')
        .last()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

fn attributes(
    e: &BytesStart<'_>,
    content: &str,
    position: usize,
) -> Result<BTreeMap<String, String>> {
    let mut attrs = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            CaptionError::malformed_block(
                CaptionFormat::Ttml,
                line_of(content, position),
                err.to_string(),
            )
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| {
                CaptionError::malformed_block(
                    CaptionFormat::Ttml,
                    line_of(content, position),
                    err.to_string(),
                )
            })?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn declarations_from_attrs(attrs: &BTreeMap<String, String>) -> StyleDeclarations {
    let mut declarations = StyleDeclarations::default();
    for (key, value) in attrs {
        if let Some(canonical) = canonical_property(key) {
            declarations.apply_css_property(canonical, &css_value(canonical, value));
        }
    }
    declarations
}

/// TTML spells `lineThrough` where CSS says `line-through`.
fn css_value(canonical: &str, value: &str) -> String {
    if canonical == "text-decoration" {
        value.replace("lineThrough", "line-through")
    } else {
        value.to_string()
    }
}

fn apply_region_attrs(layout: &mut LayoutData, attrs: &BTreeMap<String, String>) {
    if let Some(origin) = attrs.get("tts:origin") {
        layout.origin = parse_percent_pair(origin);
    }
    if let Some(extent) = attrs.get("tts:extent") {
        layout.extent = parse_percent_pair(extent);
    }
}

fn parse_percent_pair(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split_whitespace();
    let x = parts.next()?.trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    let y = parts.next()?.trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    Some((x, y))
}

fn line_of(content: &str, byte_position: usize) -> usize {
    let upto = byte_position.min(content.len());
    content[..upto].bytes().filter(|b| *b == b'\n').count() + 1
}

// --- writing -------------------------------------------------------------

fn render(
    doc: &CaptionDocument,
    options: &WriteOptions,
    generator: Option<LineGenerator<'_>>,
) -> Result<String> {
    let languages = effective_languages(doc, &options.languages);
    warn_plain_mode(CaptionFormat::Ttml, options.style);
    let styled = options.style == crate::style::StyleMode::Full;

    let mut output = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    output.push_str(&format!(
        "<tt xmlns=\"http://www.w3.org/ns/ttml\" xmlns:tts=\"http://www.w3.org/ns/ttml#styling\" xmlns:ttm=\"http://www.w3.org/ns/ttml#metadata\" xml:lang=\"{}\">\n",
        escape(doc.default_language.as_str())
    ));

    let head_metadata = doc.metadata_by_id("head").and_then(|b| match &b.data {
        BlockData::Metadata(m) => Some(&m.entries),
        _ => None,
    });
    let has_styles = styled && doc.styles().next().is_some();
    let has_layout = doc.layouts().next().is_some();

    if head_metadata.is_some() || has_styles || has_layout {
        output.push_str("  <head>\n");
        if let Some(entries) = head_metadata {
            output.push_str("    <metadata>\n");
            for (key, value) in entries {
                output.push_str(&format!(
                    "      <ttm:{key}>{}</ttm:{key}>\n",
                    escape(value.as_str())
                ));
            }
            output.push_str("    </metadata>\n");
        }
        if has_styles {
            output.push_str("    <styling>\n");
            for style_block in doc.styles() {
                let BlockData::Style(style) = &style_block.data else {
                    continue;
                };
                output.push_str(&format!(
                    "      <style xml:id=\"{}\"",
                    escape(style.id.as_str())
                ));
                for (canonical, value) in style.declarations.css_pairs() {
                    if let Some(attr) = ttml_attribute(canonical) {
                        let value = ttml_value(canonical, &value);
                        output.push_str(&format!(" {attr}=\"{}\"", escape(value.as_str())));
                    }
                }
                output.push_str("/>\n");
            }
            output.push_str("    </styling>\n");
        }
        if has_layout {
            output.push_str("    <layout>\n");
            for layout_block in doc.layouts() {
                let BlockData::Layout(layout) = &layout_block.data else {
                    continue;
                };
                output.push_str(&format!(
                    "      <region xml:id=\"{}\"",
                    escape(layout.id.as_str())
                ));
                if let Some((x, y)) = layout.origin {
                    output.push_str(&format!(
                        " tts:origin=\"{} {}\"",
                        format_percent(x),
                        format_percent(y)
                    ));
                }
                if let Some((w, h)) = layout.extent {
                    output.push_str(&format!(
                        " tts:extent=\"{} {}\"",
                        format_percent(w),
                        format_percent(h)
                    ));
                }
                output.push_str("/>\n");
            }
            output.push_str("    </layout>\n");
        }
        output.push_str("  </head>\n");
    }

    output.push_str("  <body>\n");
    for language in &languages {
        output.push_str(&format!(
            "    <div xml:lang=\"{}\">\n",
            escape(language.as_str())
        ));
        for block in doc.iter() {
            if block.block_type() != BlockType::Caption {
                continue;
            }
            let Some(caption) = block.as_caption() else {
                continue;
            };
            if !caption.text.contains_key(language) && generator.is_none() {
                continue;
            }

            output.push_str("      <p");
            if let Some(id) = &caption.id {
                output.push_str(&format!(" xml:id=\"{}\"", escape(id.as_str())));
            }
            if let Some(start) = block.start {
                output.push_str(&format!(" begin=\"{}\"", start.to_ttml()));
            }
            if let Some(end) = block.end {
                output.push_str(&format!(" end=\"{}\"", end.to_ttml()));
            }
            if styled && !caption.style_refs.is_empty() {
                let refs = caption.style_refs.join(" ");
                output.push_str(&format!(" style=\"{}\"", escape(refs.as_str())));
            }
            if let Some(region) = &caption.layout_ref {
                output.push_str(&format!(" region=\"{}\"", escape(region.as_str())));
            }
            output.push('>');

            let one_language = [language.clone()];
            let lines = caption_output_lines(
                block,
                &one_language,
                options,
                generator,
                render_spans_markup,
            );
            // In a single-line context a break is a plain space.
            let separator = if options.lines == Some(1) { " " } else { "<br/>" };
            if styled && generator.is_none() {
                output.push_str(&lines.join(separator));
            } else {
                let escaped: Vec<String> =
                    lines.iter().map(|l| escape(l.as_str()).into_owned()).collect();
                output.push_str(&escaped.join(separator));
            }

            output.push_str("</p>\n");
        }
        output.push_str("    </div>\n");
    }
    output.push_str("  </body>\n</tt>\n");
    Ok(output)
}

/// Render one line's spans as TTML inline markup (text and `span` elements).
fn render_spans_markup(spans: &[StyledSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        if span.style.has_styling() {
            let mut element = String::from("<span");
            for (canonical, value) in span.style.css_pairs() {
                if let Some(attr) = ttml_attribute(canonical) {
                    let value = ttml_value(canonical, &value);
                    element.push_str(&format!(" {attr}=\"{}\"", escape(value.as_str())));
                }
            }
            element.push('>');
            if let Some(label) = &span.style.label {
                element.push_str(&format!("[{}] ", escape(label.as_str())));
            }
            element.push_str(&escape(span.text.as_str()));
            element.push_str("</span>");
            out.push_str(&element);
        } else {
            out.push_str(&escape(span.text.as_str()));
        }
    }
    out
}

fn format_percent(fraction: f64) -> String {
    let percent = fraction * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{}%", percent.round() as i64)
    } else {
        format!("{percent}%")
    }
}
