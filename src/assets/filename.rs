//! Device-safe media file names.
//!
//! Device file systems often reject non-ASCII names. Staged media keep
//! ASCII names as they are; a non-ASCII root is replaced by its punycode
//! form (RFC 3492) behind an `xn--` marker, so distinct sources map to
//! distinct staged names.

use std::path::Path;

/// Marker prefixed to encoded roots.
pub const ACE_PREFIX: &str = "xn--";

/// Whether `root` is kept as is on the device.
///
/// ASCII roots that already carry the marker are encoded too, so they never
/// collide with the encoded form of a non-ASCII root.
fn is_device_safe(root: &str) -> bool {
    root.is_ascii()
        && !root
            .get(..ACE_PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(ACE_PREFIX))
}

/// Split a file name into root and extension (with its dot).
///
/// A leading dot does not start an extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(at) if at > 0 => name.split_at(at),
        _ => (name, ""),
    }
}

/// Device-safe name for the final path component of `source`.
///
/// Spaces become underscores. A root that is not plain ASCII, or that
/// already starts with `xn--`, is punycode-encoded. When `to_ext` is given
/// the extension is replaced by it.
#[must_use]
pub fn staged_name(source: &str, to_ext: Option<&str>) -> String {
    let base = Path::new(source)
        .file_name()
        .map_or_else(|| source.to_string(), |n| n.to_string_lossy().into_owned());
    let base = base.replace(' ', "_");
    let (root, ext) = split_extension(&base);

    let root = if is_device_safe(root) {
        root.to_string()
    } else {
        idna::punycode::encode_str(root)
            .map_or_else(|| root.to_string(), |code| format!("{ACE_PREFIX}{code}"))
    };

    match to_ext {
        Some(new_ext) => format!("{root}.{}", new_ext.trim_start_matches('.')),
        None => format!("{root}{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("cat.png"), ("cat", ".png"));
        assert_eq!(split_extension("a.b.jpg"), ("a.b", ".jpg"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_staged_name() {
        assert_eq!(staged_name("pics/my cat.jpg", None), "my_cat.jpg");
        assert_eq!(staged_name("/abs/path/dog.GIF", Some("png")), "dog.png");
        assert_eq!(staged_name("bücher.wav", None), "xn--bcher-kva.wav");
        assert_eq!(staged_name("münchen.png", Some("bmp")), "xn--mnchen-3ya.bmp");
        assert_eq!(staged_name("noext", Some(".png")), "noext.png");
    }

    #[test]
    fn test_encoded_root_decodes_to_source() {
        for word in ["bücher", "日本語", "Ünïcödé_name", "ελληνικά"] {
            let staged = staged_name(&format!("{word}.png"), None);
            let (root, ext) = split_extension(&staged);
            assert_eq!(ext, ".png");
            let code = root.strip_prefix(ACE_PREFIX).unwrap();
            assert_eq!(idna::punycode::decode_to_string(code).unwrap(), word);
        }
    }

    #[test]
    fn test_distinct_sources_stay_distinct() {
        assert_ne!(staged_name("café.png", None), staged_name("cafe.png", None));
    }

    #[test]
    fn test_marker_named_ascii_source_does_not_collide() {
        let literal = staged_name("xn--bcher-kva.wav", None);
        assert_ne!(literal, staged_name("bücher.wav", None));
        assert!(literal.starts_with(ACE_PREFIX));
        assert_ne!(staged_name("XN--bcher-kva.wav", None), staged_name("bücher.wav", None));
        assert_eq!(staged_name("xn.wav", None), "xn.wav");
    }
}
