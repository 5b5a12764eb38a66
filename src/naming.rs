//! Output filename policy.
use std::path::Path;

/// Characters that are illegal in Windows file names.
const ILLEGAL: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Longest display text (in characters) kept as a file name.
pub const MAX_NAME_CHARS: usize = 100;

/// Descriptions are cut to this many characters before sanitizing.
pub const MAX_DESCRIPTION_CHARS: usize = 80;

/// Removes illegal characters, flattens line breaks and trims.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL.contains(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Picks the base file name (no extension) for a download.
///
/// Falls back to `<prefix>_<video_id>` when the text is empty after
/// sanitizing or longer than [`MAX_NAME_CHARS`].
pub fn display_name(text: &str, fallback_prefix: &str, video_id: &str) -> String {
    let safe = sanitize_filename(text);
    let len = safe.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        format!("{fallback_prefix}_{video_id}")
    } else {
        safe
    }
}

/// Shortens description text the way it is used for names.
pub fn truncate_description(text: &str) -> String {
    text.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// `name`, or `name (1)`, `name (2)`, ... the first stem for which every
/// `stem + suffix` is free in `dir`.
///
/// Pass each file a job may write (e.g. `.mp4` and `_tmp.mp4`) so a leftover
/// temp file from an earlier failed job is never reused.
pub fn unique_stem(dir: &Path, base: &str, suffixes: &[&str]) -> String {
    let taken = |stem: &str| suffixes.iter().any(|s| dir.join(format!("{stem}{s}")).exists());
    let mut candidate = base.to_string();
    let mut counter = 1u32;
    while taken(&candidate) {
        candidate = format!("{base} ({counter})");
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn strips_illegal_characters() {
        assert_eq!(sanitize_filename("Hello/World:Test"), "HelloWorldTest");
        assert_eq!(sanitize_filename(r#"  a\b/c:d*e?f"g<h>i|j  "#), "abcdefghij");
        let out = sanitize_filename("<<?>>\"|*:/\\ x");
        assert!(!out.chars().any(|c| ILLEGAL.contains(&c)));
        assert_eq!(out, "x");
    }

    #[test]
    fn flattens_newlines() {
        assert_eq!(sanitize_filename("line one\nline two\r\n"), "line one line two");
    }

    #[test]
    fn falls_back_for_empty_or_long_names() {
        assert_eq!(display_name("  ///  ", "twitter", "42"), "twitter_42");
        let long = "视".repeat(MAX_NAME_CHARS + 1);
        assert_eq!(display_name(&long, "xhs", "abc"), "xhs_abc");
        let exact = "视".repeat(MAX_NAME_CHARS);
        assert_eq!(display_name(&exact, "xhs", "abc"), exact);
    }

    #[test]
    fn truncates_descriptions_by_characters() {
        let text = "字".repeat(200);
        assert_eq!(truncate_description(&text).chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(truncate_description("short"), "short");
    }

    #[test]
    fn avoids_collisions_with_increasing_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_stem(dir.path(), "name", &[".mp4"]), "name");

        File::create(dir.path().join("name.mp4")).unwrap();
        assert_eq!(unique_stem(dir.path(), "name", &[".mp4"]), "name (1)");

        File::create(dir.path().join("name (1).mp4")).unwrap();
        assert_eq!(unique_stem(dir.path(), "name", &[".mp4"]), "name (2)");
    }

    #[test]
    fn any_taken_suffix_skips_the_stem() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("clip_tmp.mp4")).unwrap();
        assert_eq!(unique_stem(dir.path(), "clip", &[".mp4"]), "clip");
        assert_eq!(unique_stem(dir.path(), "clip", &[".mp4", "_tmp.mp4"]), "clip (1)");
    }
}
