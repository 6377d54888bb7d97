//! Artifact naming.
//!
//! Generated files are named `{slug}-{id_prefix}.{extension}`. The slug keeps
//! names readable; uniqueness comes from the id prefix.

use std::sync::LazyLock;

use regex::Regex;

use crate::job::OutputFormat;
use crate::types::JobId;

/// Default maximum slug length.
pub const DEFAULT_SLUG_MAX_LEN: usize = 50;

/// Number of leading id characters appended to artifact names.
pub const ID_PREFIX_LEN: usize = 8;

/// Slug used when a prompt contains no ASCII alphanumerics at all.
const EMPTY_SLUG: &str = "untitled";

const SEPARATOR: char = '-';

/// Any run of characters outside `[a-z0-9]`. Applied after lowercasing.
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Lower-case `text`, collapse every run of non-`[a-z0-9]` characters into a
/// single `-`, strip leading/trailing separators and truncate to `max_len`.
///
/// Truncation never leaves a trailing separator, so the result may be
/// shorter than `max_len` when the cut lands on one.
///
/// # Examples
///
/// ```
/// use melody_core::naming::slugify;
///
/// assert_eq!(slugify("Hello, World!! 123", 50), "hello-world-123");
/// assert_eq!(slugify("  --Deep   House--  ", 50), "deep-house");
/// ```
pub fn slugify(text: &str, max_len: usize) -> String {
    let lowered = text.to_lowercase();
    let collapsed = NON_SLUG_RE.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches(SEPARATOR);

    // Only ASCII remains at this point, so byte slicing is char-safe.
    let cut = &trimmed[..trimmed.len().min(max_len)];
    cut.trim_end_matches(SEPARATOR).to_string()
}

/// Build the artifact file name for a job.
///
/// # Examples
///
/// ```
/// use melody_core::job::OutputFormat;
/// use melody_core::naming::artifact_filename;
///
/// let id = "3f2a9c1e-0000-4000-8000-000000000000".parse().unwrap();
/// assert_eq!(
///     artifact_filename("Rainy Jazz!", id, OutputFormat::Flac, 50),
///     "rainy-jazz-3f2a9c1e.flac"
/// );
/// ```
pub fn artifact_filename(prompt: &str, id: JobId, format: OutputFormat, slug_max_len: usize) -> String {
    let mut slug = slugify(prompt, slug_max_len);
    if slug.is_empty() {
        slug = EMPTY_SLUG.to_string();
    }
    let id_str = id.simple().to_string();
    let prefix = &id_str[..ID_PREFIX_LEN];
    format!("{slug}-{prefix}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_collapses_to_single_separator() {
        assert_eq!(slugify("Hello, World!! 123", 50), "hello-world-123");
    }

    #[test]
    fn strips_leading_and_trailing_separators() {
        assert_eq!(slugify("!!!ambient???", 50), "ambient");
    }

    #[test]
    fn non_ascii_letters_become_separators() {
        assert_eq!(slugify("Café Über Jazz", 50), "caf-ber-jazz");
    }

    #[test]
    fn truncates_to_exact_length() {
        let long = "a".repeat(80);
        let slug = slugify(&long, 50);
        assert_eq!(slug.len(), 50);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn truncation_never_leaves_trailing_separator() {
        // The cut at 5 lands right after "abcd-".
        let slug = slugify("abcd efgh", 5);
        assert_eq!(slug, "abcd");
    }

    #[test]
    fn punctuation_only_yields_empty_slug() {
        assert_eq!(slugify("?!  ...", 50), "");
    }

    #[test]
    fn slugify_is_deterministic() {
        let a = slugify("Dreamy synthwave, 80s", 50);
        let b = slugify("Dreamy synthwave, 80s", 50);
        assert_eq!(a, b);
        assert_eq!(a, "dreamy-synthwave-80s");
    }

    #[test]
    fn artifact_name_uses_id_prefix_and_extension() {
        let id: JobId = "a1b2c3d4-e5f6-4711-8899-aabbccddeeff".parse().unwrap();
        assert_eq!(
            artifact_filename("Chill Beats", id, OutputFormat::Mp3, 50),
            "chill-beats-a1b2c3d4.mp3"
        );
    }

    #[test]
    fn artifact_name_falls_back_for_empty_slug() {
        let id: JobId = "a1b2c3d4-e5f6-4711-8899-aabbccddeeff".parse().unwrap();
        assert_eq!(
            artifact_filename("???", id, OutputFormat::Wav, 50),
            "untitled-a1b2c3d4.wav"
        );
    }

    #[test]
    fn same_prompt_different_ids_do_not_collide() {
        let a = artifact_filename("same", JobId::new_v4(), OutputFormat::Wav, 50);
        let b = artifact_filename("same", JobId::new_v4(), OutputFormat::Wav, 50);
        assert_ne!(a, b);
    }
}
