//! Inline-style parsing and generation.
//!
//! Each wire format carries styling its own way: SRT uses HTML-like tags,
//! WebVTT uses class and voice spans, MicroDVD uses `{...}` control codes,
//! TTML uses `tts:` attributes. All of them translate to and from one
//! CSS-like declaration model, [`StyleDeclarations`], property by property.
//! Translation is table-driven where the target has named properties
//! ([`TTML_STYLE_PROPERTIES`], the CSS declaration pairs) and tag-driven
//! where it has markup.

use crate::color::Color;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How much styling a writer should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StyleMode {
    /// Translate the full declaration model into the target format.
    #[default]
    Full,
    /// Strip all markup and emit plain text.
    Plain,
}

/// Canonical CSS-like style declarations for one span of text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleDeclarations {
    /// Bold text.
    pub bold: bool,
    /// Italic text.
    pub italic: bool,
    /// Underlined text.
    pub underline: bool,
    /// Struck-through text.
    pub strikethrough: bool,
    /// Text color.
    pub color: Option<Color>,
    /// Background color.
    pub background_color: Option<Color>,
    /// Font family name.
    pub font_family: Option<String>,
    /// Font size, kept as written (`16px`, `80%`, `5`).
    pub font_size: Option<String>,
    /// Speaker or metadata label attached to the span. Formats with no
    /// native carrier render it as a visible `[label] ` prefix.
    pub label: Option<String>,
}

impl StyleDeclarations {
    /// Create an empty declaration set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any declaration is set.
    #[must_use]
    pub fn has_styling(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.strikethrough
            || self.color.is_some()
            || self.background_color.is_some()
            || self.font_family.is_some()
            || self.font_size.is_some()
            || self.label.is_some()
    }

    /// Apply one canonical CSS property to this declaration set. Unknown
    /// properties are ignored; bad color values degrade to black.
    pub fn apply_css_property(&mut self, property: &str, value: &str) {
        let value = value.trim();
        match property.trim() {
            "color" => self.color = Some(Color::parse_lossy(value)),
            "background-color" => self.background_color = Some(Color::parse_lossy(value)),
            "font-family" => self.font_family = Some(value.trim_matches('"').to_string()),
            "font-size" => self.font_size = Some(value.to_string()),
            "font-weight" => self.bold = matches!(value, "bold" | "bolder" | "700" | "800" | "900"),
            "font-style" => self.italic = matches!(value, "italic" | "oblique"),
            "text-decoration" => {
                self.underline = value.contains("underline");
                self.strikethrough = value.contains("line-through");
            }
            _ => {}
        }
    }

    /// The canonical property/value pairs currently set, in a stable order.
    #[must_use]
    pub fn css_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(color) = &self.color {
            pairs.push(("color", format!("#{}", color.to_hex_rgb())));
        }
        if let Some(bg) = &self.background_color {
            pairs.push(("background-color", format!("#{}", bg.to_hex_rgb())));
        }
        if let Some(family) = &self.font_family {
            pairs.push(("font-family", family.clone()));
        }
        if let Some(size) = &self.font_size {
            pairs.push(("font-size", size.clone()));
        }
        if self.bold {
            pairs.push(("font-weight", "bold".to_string()));
        }
        if self.italic {
            pairs.push(("font-style", "italic".to_string()));
        }
        match (self.underline, self.strikethrough) {
            (true, true) => pairs.push(("text-decoration", "underline line-through".to_string())),
            (true, false) => pairs.push(("text-decoration", "underline".to_string())),
            (false, true) => pairs.push(("text-decoration", "line-through".to_string())),
            (false, false) => {}
        }
        pairs
    }
}

/// A run of text with one style applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSpan {
    /// The text content.
    pub text: String,
    /// The style of this run.
    pub style: StyleDeclarations,
}

impl StyledSpan {
    /// Create a styled span.
    pub fn new(text: impl Into<String>, style: StyleDeclarations) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create an unstyled span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: StyleDeclarations::default(),
        }
    }
}

/// Concatenate spans into plain text, dropping all styling. The "no style"
/// rendering every writer falls back to in [`StyleMode::Plain`].
#[must_use]
pub fn plain_text(spans: &[StyledSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// Canonical property name to `tts:` attribute name, both directions.
pub const TTML_STYLE_PROPERTIES: &[(&str, &str)] = &[
    ("color", "tts:color"),
    ("background-color", "tts:backgroundColor"),
    ("font-family", "tts:fontFamily"),
    ("font-size", "tts:fontSize"),
    ("font-style", "tts:fontStyle"),
    ("font-weight", "tts:fontWeight"),
    ("text-decoration", "tts:textDecoration"),
];

/// Map a `tts:` attribute name back to its canonical property.
#[must_use]
pub fn canonical_property(ttml_attribute: &str) -> Option<&'static str> {
    TTML_STYLE_PROPERTIES
        .iter()
        .find(|(_, attr)| *attr == ttml_attribute)
        .map(|(canonical, _)| *canonical)
}

/// Map a canonical property to its `tts:` attribute name.
#[must_use]
pub fn ttml_attribute(canonical: &str) -> Option<&'static str> {
    TTML_STYLE_PROPERTIES
        .iter()
        .find(|(c, _)| *c == canonical)
        .map(|(_, attr)| *attr)
}

/// TTML value mapping for text-decoration differs from CSS.
#[must_use]
pub fn ttml_value(canonical: &str, value: &str) -> String {
    match (canonical, value) {
        ("text-decoration", "line-through") => "lineThrough".to_string(),
        ("text-decoration", "underline line-through") => "underline lineThrough".to_string(),
        _ => value.to_string(),
    }
}

/// Parse one CSS declaration block body (`color: red; font-weight: bold`)
/// into declarations.
#[must_use]
pub fn declarations_from_css(body: &str) -> StyleDeclarations {
    let mut style = StyleDeclarations::default();
    for declaration in body.split(';') {
        if let Some((property, value)) = declaration.split_once(':') {
            style.apply_css_property(property, value);
        }
    }
    style
}

/// Render declarations as a CSS declaration block body.
#[must_use]
pub fn declarations_to_css(style: &StyleDeclarations) -> String {
    style
        .css_pairs()
        .iter()
        .map(|(property, value)| format!("{property}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

// --- SRT markup ---------------------------------------------------------

/// Parse SRT inline markup (`<b> <i> <u> <s>` and `<font>`) into spans.
///
/// Tags are scoped to the line: an unclosed tag styles the rest of the line.
#[must_use]
pub fn spans_from_srt(line: &str) -> Vec<StyledSpan> {
    let tag_regex = Regex::new(r"<(/?)([bius]|font[^>]*)>").unwrap();
    let color_regex = Regex::new(r#"color\s*=\s*["']?([^"'\s>]+)["']?"#).unwrap();
    let face_regex = Regex::new(r#"face\s*=\s*["']?([^"'>]+)["']?"#).unwrap();
    let size_regex = Regex::new(r#"size\s*=\s*["']?([^"'\s>]+)["']?"#).unwrap();

    scan_tags(line, &tag_regex, |style, tag, _annotation| match tag {
        "b" => style.bold = true,
        "i" => style.italic = true,
        "u" => style.underline = true,
        "s" => style.strikethrough = true,
        font if font.starts_with("font") => {
            if let Some(cap) = color_regex.captures(font) {
                style.color = Some(Color::parse_lossy(&cap[1]));
            }
            if let Some(cap) = face_regex.captures(font) {
                style.font_family = Some(cap[1].trim().to_string());
            }
            if let Some(cap) = size_regex.captures(font) {
                style.font_size = Some(cap[1].to_string());
            }
        }
        _ => {}
    })
}

/// Render spans as SRT inline markup.
#[must_use]
pub fn spans_to_srt(spans: &[StyledSpan]) -> String {
    let mut output = String::new();
    for span in spans {
        let mut text = span.text.clone();

        let mut font_attrs = String::new();
        if let Some(color) = &span.style.color {
            font_attrs.push_str(&format!(" color=\"#{}\"", color.to_hex_rgb()));
        }
        if let Some(family) = &span.style.font_family {
            font_attrs.push_str(&format!(" face=\"{family}\""));
        }
        if let Some(size) = &span.style.font_size {
            font_attrs.push_str(&format!(" size=\"{size}\""));
        }
        if !font_attrs.is_empty() {
            text = format!("<font{font_attrs}>{text}</font>");
        }
        if span.style.strikethrough {
            text = format!("<s>{text}</s>");
        }
        if span.style.underline {
            text = format!("<u>{text}</u>");
        }
        if span.style.italic {
            text = format!("<i>{text}</i>");
        }
        if span.style.bold {
            text = format!("<b>{text}</b>");
        }
        if let Some(label) = &span.style.label {
            // SRT has no native carrier for a span label.
            text = format!("[{label}] {text}");
        }
        output.push_str(&text);
    }
    output
}

// --- WebVTT markup -------------------------------------------------------

/// Parse WebVTT cue text markup (`<b> <i> <u>`, `<c.class>`, `<v Speaker>`)
/// into spans.
#[must_use]
pub fn spans_from_vtt(line: &str) -> Vec<StyledSpan> {
    let tag_regex =
        Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*(?:\.[^\s>]*)?)(?:\s+([^>]*))?>").unwrap();

    scan_tags(line, &tag_regex, |style, tag, annotation| {
        let base = tag.split('.').next().unwrap_or(tag);
        match base {
            "b" => style.bold = true,
            "i" => style.italic = true,
            "u" => style.underline = true,
            "c" => {
                for class in tag.split('.').skip(1) {
                    apply_vtt_class(style, class);
                }
            }
            "v" => {
                if let Some(annotation) = annotation {
                    style.label = Some(annotation.to_string());
                }
            }
            // lang, ruby, rt: recognized, no styling to carry.
            _ => {}
        }
    })
}

fn apply_vtt_class(style: &mut StyleDeclarations, class: &str) {
    if let Some(body) = class.strip_prefix("bg_") {
        style.background_color = Some(Color::parse_lossy(body));
    } else if let Some(hex) = class.strip_prefix("color") {
        style.color = Some(Color::parse_lossy(&format!("#{hex}")));
    } else {
        match Color::parse(class) {
            Ok(color) => style.color = Some(color),
            // Not a color class; treat it as a metadata label.
            Err(_) => style.label = Some(class.to_string()),
        }
    }
}

/// Render spans as WebVTT cue text markup.
#[must_use]
pub fn spans_to_vtt(spans: &[StyledSpan]) -> String {
    let mut output = String::new();
    for span in spans {
        let mut text = span.text.clone();

        if let Some(color) = &span.style.color {
            let class = match *color {
                Color::WHITE => "white".to_string(),
                Color::BLACK => "black".to_string(),
                Color::RED => "red".to_string(),
                Color::GREEN => "green".to_string(),
                Color::LIME => "lime".to_string(),
                Color::BLUE => "blue".to_string(),
                Color::YELLOW => "yellow".to_string(),
                Color::CYAN => "cyan".to_string(),
                Color::MAGENTA => "magenta".to_string(),
                other => format!("color{}", other.to_hex_rgb()),
            };
            text = format!("<c.{class}>{text}</c>");
        }
        if span.style.underline {
            text = format!("<u>{text}</u>");
        }
        if span.style.italic {
            text = format!("<i>{text}</i>");
        }
        if span.style.bold {
            text = format!("<b>{text}</b>");
        }
        if let Some(label) = &span.style.label {
            text = format!("<v {label}>{text}</v>");
        }
        output.push_str(&text);
    }
    output
}

// --- MicroDVD control codes ----------------------------------------------

/// Parse MicroDVD `{...}` control codes at the start of a line.
///
/// `{y:b,i}` toggles styles, `{c:$BBGGRR}` sets the color, `{f:name}` the
/// font, `{s:size}` the size. Codes are case-insensitive on the key; the
/// whole line becomes one span.
#[must_use]
pub fn spans_from_sub(line: &str) -> Vec<StyledSpan> {
    let mut style = StyleDeclarations::default();
    let mut rest = line;

    while let Some(stripped) = rest.strip_prefix('{') {
        let Some(close) = stripped.find('}') else {
            break;
        };
        let code = &stripped[..close];
        rest = &stripped[close + 1..];

        let Some((key, value)) = code.split_once(':') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "y" => {
                for flag in value.split(',') {
                    match flag.trim().to_ascii_lowercase().as_str() {
                        "b" => style.bold = true,
                        "i" => style.italic = true,
                        "u" => style.underline = true,
                        "s" => style.strikethrough = true,
                        _ => {}
                    }
                }
            }
            "c" => match Color::from_microdvd(value.trim()) {
                Ok(color) => style.color = Some(color),
                Err(_) => {
                    warn!(value, "unrecognized MicroDVD color code, falling back to black");
                    style.color = Some(Color::BLACK);
                }
            },
            "f" => style.font_family = Some(value.trim().to_string()),
            "s" => style.font_size = Some(value.trim().to_string()),
            _ => {}
        }
    }

    vec![StyledSpan::new(rest, style)]
}

/// Render spans as a MicroDVD line with `{...}` control codes.
///
/// MicroDVD styling is line-scoped, so the first styled span's declarations
/// win for the whole line.
#[must_use]
pub fn spans_to_sub(spans: &[StyledSpan]) -> String {
    let style = spans
        .iter()
        .map(|s| &s.style)
        .find(|s| s.has_styling())
        .cloned()
        .unwrap_or_default();

    let mut codes = String::new();
    let mut flags = Vec::new();
    if style.bold {
        flags.push("b");
    }
    if style.italic {
        flags.push("i");
    }
    if style.underline {
        flags.push("u");
    }
    if style.strikethrough {
        flags.push("s");
    }
    if !flags.is_empty() {
        codes.push_str(&format!("{{y:{}}}", flags.join(",")));
    }
    if let Some(color) = &style.color {
        codes.push_str(&format!("{{c:{}}}", color.to_microdvd()));
    }
    if let Some(family) = &style.font_family {
        codes.push_str(&format!("{{f:{family}}}"));
    }
    if let Some(size) = &style.font_size {
        codes.push_str(&format!("{{s:{size}}}"));
    }

    let text = plain_text(spans);
    match &style.label {
        Some(label) => format!("{codes}[{label}] {text}"),
        None => format!("{codes}{text}"),
    }
}

// --- shared tag scanner --------------------------------------------------

/// Scan `text` for markup tags, maintaining a style stack. `apply` mutates
/// the current style for an opening tag; closing tags pop the stack. An
/// unclosed tag styles the remainder of the text.
fn scan_tags<F>(text: &str, tag_regex: &Regex, apply: F) -> Vec<StyledSpan>
where
    F: Fn(&mut StyleDeclarations, &str, Option<&str>),
{
    let mut spans = Vec::new();
    let mut current_text = String::new();
    let mut current_style = StyleDeclarations::default();
    let mut stack: Vec<StyleDeclarations> = Vec::new();
    let mut last_end = 0;

    for cap in tag_regex.captures_iter(text) {
        let whole = cap.get(0).unwrap();
        if whole.start() > last_end {
            current_text.push_str(&text[last_end..whole.start()]);
        }

        if !current_text.is_empty() {
            spans.push(StyledSpan::new(
                std::mem::take(&mut current_text),
                current_style.clone(),
            ));
        }

        let closing = &cap[1] == "/";
        if closing {
            if let Some(previous) = stack.pop() {
                current_style = previous;
            }
        } else {
            stack.push(current_style.clone());
            apply(&mut current_style, &cap[2], cap.get(3).map(|m| m.as_str()));
        }

        last_end = whole.end();
    }

    if last_end < text.len() {
        current_text.push_str(&text[last_end..]);
    }
    if !current_text.is_empty() {
        spans.push(StyledSpan::new(current_text, current_style));
    }
    if spans.is_empty() {
        spans.push(StyledSpan::plain(text));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_srt_tags_roundtrip() {
        let spans = spans_from_srt("<b>Bold</b> and <i>italic</i>");
        assert_eq!(spans.len(), 3);
        assert!(spans[0].style.bold);
        assert_eq!(spans[0].text, "Bold");
        assert!(spans[2].style.italic);

        assert_eq!(spans_to_srt(&spans), "<b>Bold</b> and <i>italic</i>");
    }

    #[test]
    fn test_srt_font_color() {
        let spans = spans_from_srt(r##"<font color="#FF0000">Red text</font>"##);
        let red = spans.iter().find(|s| s.text.contains("Red")).unwrap();
        assert_eq!(red.style.color, Some(Color::RED));

        assert_eq!(
            spans_to_srt(&spans),
            r##"<font color="#FF0000">Red text</font>"##
        );
    }

    #[test]
    fn test_srt_font_face_and_size() {
        let spans = spans_from_srt(r#"<font face="Arial" size="12">text</font>"#);
        assert_eq!(spans[0].style.font_family.as_deref(), Some("Arial"));
        assert_eq!(spans[0].style.font_size.as_deref(), Some("12"));
    }

    #[test]
    fn test_srt_unclosed_tag_styles_rest_of_line() {
        let spans = spans_from_srt("plain <i>slanted to the end");
        assert_eq!(spans.len(), 2);
        assert!(!spans[0].style.italic);
        assert!(spans[1].style.italic);
    }

    #[test]
    fn test_vtt_class_colors() {
        let spans = spans_from_vtt("<c.red>Red text</c>");
        assert_eq!(spans[0].style.color, Some(Color::RED));

        let spans = spans_from_vtt("<c.colorFF8000>Orange-ish</c>");
        assert_eq!(spans[0].style.color, Some(Color::rgb(255, 128, 0)));

        assert_eq!(spans_to_vtt(&spans), "<c.colorFF8000>Orange-ish</c>");
    }

    #[test]
    fn test_vtt_voice_label() {
        let spans = spans_from_vtt("<v Mary>Hello there</v>");
        assert_eq!(spans[0].style.label.as_deref(), Some("Mary"));
        assert_eq!(spans[0].text, "Hello there");

        assert_eq!(spans_to_vtt(&spans), "<v Mary>Hello there</v>");
        // SRT has no voice span; the label becomes a visible prefix.
        assert_eq!(spans_to_srt(&spans), "[Mary] Hello there");
    }

    #[test]
    fn test_vtt_nested_styles() {
        let spans = spans_from_vtt("<b><i>both</i></b> plain");
        assert!(spans[0].style.bold && spans[0].style.italic);
        assert!(!spans[1].style.bold);
    }

    #[test]
    fn test_sub_control_codes() {
        let spans = spans_from_sub("{y:b,i}{c:$0000FF}Styled line");
        assert!(spans[0].style.bold);
        assert!(spans[0].style.italic);
        assert_eq!(spans[0].style.color, Some(Color::RED));
        assert_eq!(spans[0].text, "Styled line");

        assert_eq!(spans_to_sub(&spans), "{y:b,i}{c:$0000FF}Styled line");
    }

    #[test]
    fn test_sub_bad_color_degrades() {
        let spans = spans_from_sub("{c:$XYZ}text");
        assert_eq!(spans[0].style.color, Some(Color::BLACK));
    }

    #[test]
    fn test_plain_strips_everything() {
        let spans = spans_from_srt("<b>Bold</b> and <font color=\"red\">red</font>");
        assert_eq!(plain_text(&spans), "Bold and red");
    }

    #[test]
    fn test_css_declarations_roundtrip() {
        let style = declarations_from_css("color: #FF0000; font-weight: bold");
        assert!(style.bold);
        assert_eq!(style.color, Some(Color::RED));

        assert_eq!(
            declarations_to_css(&style),
            "color: #FF0000; font-weight: bold;"
        );
    }

    #[test]
    fn test_css_text_decoration() {
        let style = declarations_from_css("text-decoration: underline line-through");
        assert!(style.underline);
        assert!(style.strikethrough);
        assert!(declarations_to_css(&style).contains("underline line-through"));
    }

    #[test]
    fn test_ttml_property_table_symmetric() {
        for (canonical, attr) in TTML_STYLE_PROPERTIES {
            assert_eq!(ttml_attribute(canonical), Some(*attr));
            assert_eq!(canonical_property(attr), Some(*canonical));
        }
        assert_eq!(ttml_attribute("color"), Some("tts:color"));
        assert_eq!(canonical_property("tts:backgroundColor"), Some("background-color"));
    }

    #[test]
    fn test_ttml_value_mapping() {
        assert_eq!(ttml_value("text-decoration", "line-through"), "lineThrough");
        assert_eq!(ttml_value("color", "#FF0000"), "#FF0000");
    }
}
