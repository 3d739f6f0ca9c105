//! Cross-format interchange integration tests.
//!
//! End-to-end coverage: file open/save, format conversion, structural
//! operations, the filename language convention, and JSON snapshots.

use captionio::{
    convert_auto, detect_format, open, read_str, simple_caption, CaptionDocument, CaptionError,
    CaptionFormat, MicroTime, OpenOptions, ReadOptions, WriteOptions,
};
use pretty_assertions::assert_eq;

fn seconds(s: u64) -> MicroTime {
    MicroTime::new(0, 0, s, 0, 0)
}

/// Test microsecond total round-trip and subtraction inverse.
#[test]
fn test_microtime_properties() {
    for total in [0u64, 1, 999_999, 5_445_500_123] {
        assert_eq!(MicroTime::from_micros(total).total_micros(), total);
    }

    let t1 = MicroTime::new(0, 0, 1, 250, 0);
    let t2 = MicroTime::new(0, 2, 3, 750, 500);
    let diff = (t2 - t1).unwrap();
    assert_eq!(diff + t1, t2);
}

/// Test SRT time strings round-trip on their canonical formatting.
#[test]
fn test_srt_time_format_roundtrip() {
    for s in ["00:00:00,000", "01:23:45,678", "11:59:59,999"] {
        assert_eq!(MicroTime::from_srt(s).unwrap().to_srt(), s);
    }
}

/// Test the filename language convention.
#[test]
fn test_filename_language_convention() {
    assert_eq!(
        captionio::languages_from_filename("movie.en.fr.srt"),
        vec!["en", "fr"]
    );
    assert_eq!(captionio::stem_from_filename("movie.en.fr.srt"), "movie");
}

/// Test that join offsets every copied block by the current track length.
#[test]
fn test_join_concatenates_tracks() {
    let mut first = CaptionDocument::with_default_language("en");
    first.append(simple_caption(seconds(1), seconds(3), "en", &["One"]));
    first.append(simple_caption(seconds(4), seconds(6), "en", &["Two"]));

    let mut second = CaptionDocument::with_default_language("en");
    second.append(simple_caption(seconds(0), seconds(2), "en", &["Three"]));

    let length = first.time_length.unwrap();
    first.join(&second, true, MicroTime::ZERO);

    assert_eq!(first.len(), 3);
    assert_eq!(first.get(2).unwrap().start, Some(seconds(0) + length));
    assert_eq!(first.get(2).unwrap().end, Some(seconds(2) + length));
}

/// Test reading then writing the same format reproduces cue text and times.
#[test]
fn test_content_roundtrip_per_format() {
    let srt = "1\n00:00:01,000 --> 00:00:03,500\nHello there\n\n2\n00:00:05,000 --> 00:00:08,000\nSecond cue\n\n";
    let doc = read_str(srt, CaptionFormat::Srt, &ReadOptions::default()).unwrap();
    let out = doc
        .render(CaptionFormat::Srt, &WriteOptions::default())
        .unwrap();
    assert_eq!(out, srt);

    let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello there\n";
    let doc = read_str(vtt, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
    let out = doc
        .render(CaptionFormat::Vtt, &WriteOptions::default())
        .unwrap();
    let again = read_str(&out, CaptionFormat::Vtt, &ReadOptions::default()).unwrap();
    assert_eq!(doc.get(0).unwrap(), again.get(0).unwrap());
}

/// Test the SRT to VTT scenario end to end.
#[test]
fn test_srt_to_vtt_scenario() {
    let vtt = convert_auto(
        "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n",
        CaptionFormat::Vtt,
    )
    .unwrap();
    assert_eq!(
        vtt.trim_end(),
        "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello"
    );
}

/// Test a malformed SRT cue aborts the read, not silently skips.
#[test]
fn test_malformed_srt_raises() {
    let broken = "1\n00:00:01,000 00:00:03,500\nHello\n\n";
    let err = read_str(broken, CaptionFormat::Srt, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, CaptionError::MalformedBlock { .. }));
}

/// Test HSL color normalization.
#[test]
fn test_hsl_normalizes_to_rgb() {
    assert_eq!(
        captionio::Color::parse("hsl(0,100%,50%)")
            .unwrap()
            .to_hex_rgb(),
        "FF0000"
    );
}

/// Test the JSON snapshot dict round-trip.
#[test]
fn test_json_snapshot_roundtrip() {
    let mut doc = CaptionDocument::with_default_language("en");
    doc.append(simple_caption(seconds(1), seconds(3), "en", &["Hello"]));
    doc.append(simple_caption(seconds(4), seconds(6), "en", &["World"]));

    let value = doc.to_json_value().unwrap();
    let restored = captionio::from_json_value(value).unwrap();

    assert_eq!(doc.len(), restored.len());
    assert_eq!(doc.time_length, restored.time_length);
    for (a, b) in doc.iter().zip(restored.iter()) {
        assert_eq!(a, b);
    }
}

/// Test saving injects language tags into the filename and open reads them
/// back out.
#[test]
fn test_save_and_open_with_language_tags() {
    let dir = tempfile::tempdir().unwrap();

    let mut doc = CaptionDocument::with_default_language("en");
    doc.append(simple_caption(seconds(1), seconds(3), "en", &["Hello"]));

    let written = doc
        .save(
            dir.path().join("movie.srt"),
            CaptionFormat::Srt,
            &WriteOptions::default(),
        )
        .unwrap();
    assert!(written.to_string_lossy().ends_with("movie.en.srt"));

    let opened = open(&written, &OpenOptions::default()).unwrap();
    assert_eq!(opened.default_language, "en");
    assert_eq!(opened.len(), 1);
    assert_eq!(opened.get(0).unwrap().plain_lines("en"), vec!["Hello"]);
}

/// Test multi-language save splits and open re-aligns by filename tags.
#[test]
fn test_multi_language_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let srt = "1\n00:00:01,000 --> 00:00:03,000\nHello\nBonjour\n\n";
    let options = ReadOptions {
        languages: vec!["en".into(), "fr".into()],
        ..ReadOptions::default()
    };
    let doc = read_str(srt, CaptionFormat::Srt, &options).unwrap();

    let written = doc
        .save(
            dir.path().join("movie.srt"),
            CaptionFormat::Srt,
            &WriteOptions {
                languages: vec!["en".into(), "fr".into()],
                ..WriteOptions::default()
            },
        )
        .unwrap();
    assert!(written.to_string_lossy().ends_with("movie.en.fr.srt"));

    let opened = open(&written, &OpenOptions::default()).unwrap();
    let block = opened.get(0).unwrap();
    assert_eq!(block.plain_lines("en"), vec!["Hello"]);
    assert_eq!(block.plain_lines("fr"), vec!["Bonjour"]);
}

/// Test open restores a snapshot when the extension is .json.
#[test]
fn test_open_json_snapshot() {
    let dir = tempfile::tempdir().unwrap();

    let mut doc = CaptionDocument::with_default_language("en");
    doc.append(simple_caption(seconds(1), seconds(3), "en", &["Hello"]));
    let path = doc.to_json_file(dir.path().join("track")).unwrap();

    let restored = open(&path, &OpenOptions::default()).unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored.default_language, "en");
}

/// Test a detection mismatch on open is soft: empty document, no error.
#[test]
fn test_open_detection_mismatch_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.srt");
    std::fs::write(&path, "this is not a subtitle file\n").unwrap();

    let doc = open(&path, &OpenOptions::default()).unwrap();
    assert!(doc.is_empty());
}

/// Test opening a missing file reports the underlying OS error with path.
#[test]
fn test_open_missing_file() {
    let err = open("definitely/not/here.srt", &OpenOptions::default()).unwrap_err();
    match err {
        CaptionError::Io { path, .. } => assert!(path.contains("not/here.srt")),
        other => panic!("expected Io, got {other}"),
    }
}

/// Test MicroDVD needs a frame rate end to end.
#[test]
fn test_sub_frame_rate_through_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.sub");
    std::fs::write(&path, "{25}{88}Hello\n").unwrap();

    let err = open(&path, &OpenOptions::default()).unwrap_err();
    assert!(matches!(err, CaptionError::MissingFrameRate { .. }));

    let options = OpenOptions {
        read: ReadOptions {
            frame_rate: Some(25.0),
            ..ReadOptions::default()
        },
        ..OpenOptions::default()
    };
    let doc = open(&path, &options).unwrap();
    assert_eq!(doc.get(0).unwrap().start, Some(seconds(1)));
}

/// Test detection across all implemented formats.
#[test]
fn test_detect_format_all() {
    assert_eq!(
        detect_format("1\n00:00:01,000 --> 00:00:02,000\nHi\n").unwrap(),
        CaptionFormat::Srt
    );
    assert_eq!(detect_format("WEBVTT\n").unwrap(), CaptionFormat::Vtt);
    assert_eq!(detect_format("{1}{25}Hi\n").unwrap(), CaptionFormat::Sub);
    assert_eq!(
        detect_format("<tt xmlns=\"http://www.w3.org/ns/ttml\"><body/></tt>").unwrap(),
        CaptionFormat::Ttml
    );
}

/// Test joining a second track straight from a file.
#[test]
fn test_join_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extra.en.srt");
    std::fs::write(&path, "1\n00:00:00,000 --> 00:00:02,000\nAppended\n\n").unwrap();

    let mut doc = CaptionDocument::with_default_language("en");
    doc.append(simple_caption(seconds(1), seconds(10), "en", &["Base"]));

    doc.join_file(&path, true, MicroTime::ZERO, &OpenOptions::default())
        .unwrap();

    assert_eq!(doc.len(), 2);
    // Shifted behind the existing ten seconds of track.
    assert_eq!(doc.get(1).unwrap().start, Some(seconds(10)));
    assert_eq!(doc.get(1).unwrap().end, Some(seconds(12)));
}

/// Test stripping a language keeps blocks and merge brings it back.
#[test]
fn test_language_strip_and_merge() {
    let mut doc = CaptionDocument::with_default_language("en");
    doc.append(simple_caption(seconds(1), seconds(3), "en", &["Hello"]));

    let mut french = CaptionDocument::with_default_language("fr");
    french.append(simple_caption(seconds(1), seconds(3), "fr", &["Bonjour"]));

    doc.merge(&french);
    assert_eq!(doc.get(0).unwrap().languages(), vec!["en", "fr"]);

    doc.remove_language("en");
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.get(0).unwrap().languages(), vec!["fr"]);
}

/// Test a full styled conversion chain keeps the styling it can express.
#[test]
fn test_styled_chain() {
    let srt = "1\n00:00:01,000 --> 00:00:04,000\n<font color=\"#FF0000\"><b>Loud</b></font>\n\n";
    let doc = read_str(srt, CaptionFormat::Srt, &ReadOptions::default()).unwrap();

    let ttml = doc
        .render(CaptionFormat::Ttml, &WriteOptions::default())
        .unwrap();
    assert!(ttml.contains("tts:color=\"#FF0000\""));
    assert!(ttml.contains("tts:fontWeight=\"bold\""));

    let doc2 = read_str(&ttml, CaptionFormat::Ttml, &ReadOptions::default()).unwrap();
    let back = doc2
        .render(CaptionFormat::Srt, &WriteOptions::default())
        .unwrap();
    assert!(back.contains("<b>"));
    assert!(back.contains("color=\"#FF0000\""));
}
