//! # captionio
//!
//! A caption and subtitle interchange library supporting SRT, WebVTT,
//! MicroDVD SUB and TTML over one canonical document model.
//!
//! ## Features
//!
//! - Parse and write SRT, WebVTT, MicroDVD and TTML caption tracks
//! - One in-memory document preserving timing, multi-language text, inline
//!   styling and layout/region metadata across conversions
//! - Microsecond-precision time type covering clock, frame-indexed and
//!   metric time encodings
//! - Structural operations: time shift, track concatenation, positional
//!   merge, per-language stripping
//! - Self-describing JSON snapshots that restore the full document state
//! - `movie.en.fr.srt`-style filename language tags on open and save
//!
//! ## Quick Start
//!
//! ### Parsing captions
//!
//! ```rust
//! use captionio::{read_str, CaptionFormat, ReadOptions};
//!
//! let srt = "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n";
//! let doc = read_str(srt, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
//! assert_eq!(doc.len(), 1);
//! assert_eq!(doc.get(0).unwrap().plain_lines("und"), vec!["Hello"]);
//! ```
//!
//! ### Converting between formats
//!
//! ```rust
//! use captionio::{convert_auto, CaptionFormat};
//!
//! let srt = "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n";
//! let vtt = convert_auto(srt, CaptionFormat::Vtt).unwrap();
//! assert!(vtt.starts_with("WEBVTT"));
//! ```
//!
//! ### Building a track by hand
//!
//! ```rust
//! use captionio::{simple_caption, CaptionDocument, CaptionFormat, MicroTime, WriteOptions};
//!
//! let mut doc = CaptionDocument::with_default_language("en");
//! doc.append(simple_caption(
//!     MicroTime::new(0, 0, 1, 0, 0),
//!     MicroTime::new(0, 0, 4, 0, 0),
//!     "en",
//!     &["Hello, world!"],
//! ));
//!
//! let output = doc.render(CaptionFormat::Srt, &WriteOptions::default()).unwrap();
//! assert!(output.contains("Hello, world!"));
//! ```

pub mod block;
pub mod color;
pub mod convert;
pub mod document;
pub mod error;
pub mod json;
pub mod language;
pub mod srt;
pub mod style;
pub mod sub;
pub mod time;
pub mod ttml;
pub mod vtt;

// Re-export the types most callers need at the crate root.
pub use block::{
    simple_caption, Block, BlockData, BlockType, CaptionData, CaptionLine, CommentData,
    LayoutData, MetadataData, StyleData,
};
pub use color::Color;
pub use convert::{
    convert, convert_auto, detect_format, open, read_auto, read_str, CaptionFormat,
    CaptionsCodec, Encoding, LineGenerator, OpenOptions, ReadOptions, WriteOptions,
};
pub use document::{AuxTables, CaptionDocument, StyleIdMap};
pub use error::{CaptionError, Result};
pub use json::{from_json_file, from_json_str, from_json_value, CaptionSummary};
pub use language::{
    is_well_formed, languages_from_filename, make_filename, normalize_tag, split_filename,
    stem_from_filename,
};
pub use style::{StyleDeclarations, StyleMode, StyledSpan};
pub use time::{MicroTime, TtmlTimeContext};

/// Prelude module for convenient imports.
///
/// ```rust
/// use captionio::prelude::*;
/// ```
pub mod prelude {
    pub use crate::block::{simple_caption, Block, BlockData, BlockType, CaptionData, CaptionLine};
    pub use crate::convert::{
        convert, convert_auto, detect_format, open, read_auto, read_str, CaptionFormat,
        CaptionsCodec, OpenOptions, ReadOptions, WriteOptions,
    };
    pub use crate::document::CaptionDocument;
    pub use crate::error::{CaptionError, Result};
    pub use crate::style::{StyleDeclarations, StyleMode, StyledSpan};
    pub use crate::time::MicroTime;
}
