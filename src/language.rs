//! Language tags and the filename language convention.
//!
//! Caption files carry their languages in the filename: `movie.en.fr.srt` is
//! an English+French track of `movie`. The helpers here split dot-segments
//! into language tags and the real stem, and rebuild the pattern on save.
//!
//! Tag validation is syntactic BCP-47 well-formedness (subtag shapes and
//! case conventions), not registry lookup. Anything that fails validation
//! normalizes to `"und"` rather than raising.

use std::path::{Path, PathBuf};

/// The undetermined-language tag used whenever a tag fails validation.
pub const UND: &str = "und";

/// Check whether a string is a well-formed BCP-47 language tag.
///
/// Accepts `language[-script][-region][-variant...]` with the usual subtag
/// shapes: 2-3 letter primary (the ISO 639 shape), 4 letter script, 2 letter
/// or 3 digit region, 4-8 alphanumeric variants.
#[must_use]
pub fn is_well_formed(tag: &str) -> bool {
    let mut subtags = tag.split('-');

    let primary = match subtags.next() {
        Some(p) => p,
        None => return false,
    };
    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    // Walk the remaining subtags in order: script, region, then variants.
    let mut seen_script = false;
    let mut seen_region = false;
    for sub in subtags {
        let is_script = sub.len() == 4 && sub.chars().all(|c| c.is_ascii_alphabetic());
        let is_region = (sub.len() == 2 && sub.chars().all(|c| c.is_ascii_alphabetic()))
            || (sub.len() == 3 && sub.chars().all(|c| c.is_ascii_digit()));
        let is_variant = ((5..=8).contains(&sub.len())
            || (sub.len() == 4 && sub.starts_with(|c: char| c.is_ascii_digit())))
            && sub.chars().all(|c| c.is_ascii_alphanumeric());

        if is_script && !seen_script && !seen_region {
            seen_script = true;
        } else if is_region && !seen_region {
            seen_region = true;
        } else if is_variant {
            seen_region = true; // variants end the script/region window
        } else {
            return false;
        }
    }
    true
}

/// Normalize a language tag to BCP-47 case conventions.
///
/// Underscores become hyphens, the primary subtag is lowercased, scripts are
/// titlecased, two-letter regions uppercased. Tags that are not well-formed
/// fail closed to [`UND`].
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim().replace('_', "-");
    if !is_well_formed(&tag) {
        return UND.to_string();
    }

    let mut out = Vec::new();
    for (i, sub) in tag.split('-').enumerate() {
        let normalized = if i == 0 {
            sub.to_ascii_lowercase()
        } else if sub.len() == 4 && sub.chars().all(|c| c.is_ascii_alphabetic()) {
            let mut chars = sub.chars();
            let first = chars.next().unwrap_or_default().to_ascii_uppercase();
            let rest: String = chars.map(|c| c.to_ascii_lowercase()).collect();
            format!("{first}{rest}")
        } else if sub.len() == 2 && sub.chars().all(|c| c.is_ascii_alphabetic()) {
            sub.to_ascii_uppercase()
        } else {
            sub.to_ascii_lowercase()
        };
        out.push(normalized);
    }
    out.join("-")
}

/// Extract the language tags embedded in a filename.
///
/// `movie.en.fr.srt` yields `["en", "fr"]`. Returns an empty vec when no
/// dot-segment is a well-formed tag.
#[must_use]
pub fn languages_from_filename(filename: impl AsRef<Path>) -> Vec<String> {
    let (languages, _) = split_stem(filename.as_ref());
    languages
}

/// Extract the real stem of a filename, dropping language segments and the
/// extension. `movie.en.fr.srt` yields `movie`.
#[must_use]
pub fn stem_from_filename(filename: impl AsRef<Path>) -> String {
    let (_, stem) = split_stem(filename.as_ref());
    stem
}

/// Partition a filename into its language tags and its stem in one pass.
#[must_use]
pub fn split_filename(filename: impl AsRef<Path>) -> (Vec<String>, String) {
    split_stem(filename.as_ref())
}

fn split_stem(path: &Path) -> (Vec<String>, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let segments: Vec<&str> = stem.split('.').collect();
    if segments.len() < 2 {
        return (Vec::new(), stem);
    }

    let mut languages = Vec::new();
    let mut rest = Vec::new();
    for segment in segments {
        if is_well_formed(segment) {
            languages.push(segment.to_string());
        } else {
            rest.push(segment);
        }
    }

    // A filename that is nothing but language-shaped segments has no stem to
    // recover; treat it as a plain name instead.
    if rest.is_empty() {
        return (Vec::new(), stem);
    }
    (languages, rest.join("."))
}

/// Build an output filename with the requested languages injected before the
/// extension: `movie` + `["en", "fr"]` + `.srt` → `movie.en.fr.srt`.
///
/// With `include_languages` false the stem is kept as-is. Existing language
/// segments in `filename` are stripped first so tags are never duplicated.
#[must_use]
pub fn make_filename(
    filename: impl AsRef<Path>,
    extension: &str,
    languages: &[String],
    include_languages: bool,
) -> PathBuf {
    let path = filename.as_ref();
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    let (_, stem) = split_stem(path);

    let name = if include_languages && !languages.is_empty() {
        format!("{stem}.{}{extension}", languages.join("."))
    } else {
        format!("{stem}{extension}")
    };
    directory.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("en"));
        assert!(is_well_formed("eng"));
        assert!(is_well_formed("en-US"));
        assert!(is_well_formed("zh-Hant-TW"));
        assert!(is_well_formed("de-1901"));

        assert!(!is_well_formed(""));
        assert!(!is_well_formed("e"));
        assert!(!is_well_formed("en-"));
        assert!(!is_well_formed("123"));
        assert!(!is_well_formed("movie"));
        assert!(!is_well_formed("en-US-x"));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("EN"), "en");
        assert_eq!(normalize_tag("en_us"), "en-US");
        assert_eq!(normalize_tag("zh-hant-tw"), "zh-Hant-TW");
        // Fails closed, never raises.
        assert_eq!(normalize_tag("not a tag"), "und");
        assert_eq!(normalize_tag(""), "und");
    }

    #[test]
    fn test_languages_from_filename() {
        assert_eq!(languages_from_filename("movie.en.fr.srt"), vec!["en", "fr"]);
        assert_eq!(
            languages_from_filename("/some/dir/movie.en.srt"),
            vec!["en"]
        );
        assert!(languages_from_filename("movie.srt").is_empty());
        assert!(languages_from_filename("show.s01e02.srt").is_empty());
    }

    #[test]
    fn test_stem_from_filename() {
        assert_eq!(stem_from_filename("movie.en.fr.srt"), "movie");
        assert_eq!(stem_from_filename("movie.srt"), "movie");
        assert_eq!(stem_from_filename("my.movie.en.srt"), "my.movie");
    }

    #[test]
    fn test_split_filename() {
        let (languages, stem) = split_filename("movie.en.fr.srt");
        assert_eq!(languages, vec!["en", "fr"]);
        assert_eq!(stem, "movie");
    }

    #[test]
    fn test_make_filename() {
        assert_eq!(
            make_filename("movie.srt", ".vtt", &["en".into(), "fr".into()], true),
            PathBuf::from("movie.en.fr.vtt")
        );
        // Existing tags are stripped before new ones go in.
        assert_eq!(
            make_filename("movie.en.srt", ".srt", &["de".into()], true),
            PathBuf::from("movie.de.srt")
        );
        assert_eq!(
            make_filename("movie.en.srt", ".srt", &["de".into()], false),
            PathBuf::from("movie.srt")
        );
    }

    #[test]
    fn test_make_filename_keeps_directory() {
        assert_eq!(
            make_filename("/tmp/movie.srt", ".vtt", &["en".into()], true),
            PathBuf::from("/tmp/movie.en.vtt")
        );
    }
}
