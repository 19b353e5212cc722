//! Magic-byte signatures for the supported raster formats.
//!
//! Validation compares the first bytes of a file against the signature set
//! implied by its extension, before any decoding takes place. WEBP is the
//! special case: `RIFF` at offset 0 and `WEBP` at offset 8.

use std::fmt;
use std::path::Path;

/// Number of header bytes needed to cover every signature, including the
/// WEBP marker at offset 8.
pub const HEADER_LEN: usize = 12;

/// Container formats the preprocessor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Tiff,
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Jpeg => "JPEG",
            FormatTag::Png => "PNG",
            FormatTag::Gif => "GIF",
            FormatTag::Bmp => "BMP",
            FormatTag::Webp => "WEBP",
            FormatTag::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

/// Signature prefixes per format. WEBP is validated structurally instead.
const SIGNATURES: &[(FormatTag, &[u8])] = &[
    (FormatTag::Jpeg, b"\xff\xd8\xff"),
    (FormatTag::Png, b"\x89PNG\r\n\x1a\n"),
    (FormatTag::Gif, b"GIF87a"),
    (FormatTag::Gif, b"GIF89a"),
    (FormatTag::Bmp, b"BM"),
    (FormatTag::Tiff, b"II*\x00"),
    (FormatTag::Tiff, b"MM\x00*"),
];

/// Format implied by a file extension; `None` for unknown extensions, which
/// skip magic validation entirely.
pub fn format_for_extension(path: &Path) -> Option<FormatTag> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(FormatTag::Jpeg),
        "png" => Some(FormatTag::Png),
        "gif" => Some(FormatTag::Gif),
        "bmp" => Some(FormatTag::Bmp),
        "webp" => Some(FormatTag::Webp),
        "tiff" | "tif" => Some(FormatTag::Tiff),
        _ => None,
    }
}

fn is_webp(header: &[u8]) -> bool {
    header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP"
}

/// Detect the actual format from a file header, if it is one we know.
pub fn detect_format(header: &[u8]) -> Option<FormatTag> {
    if is_webp(header) {
        return Some(FormatTag::Webp);
    }
    SIGNATURES
        .iter()
        .find(|(_, magic)| header.starts_with(magic))
        .map(|(tag, _)| *tag)
}

/// Result of a magic-byte check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicCheck {
    pub is_valid: bool,
    pub detected: Option<FormatTag>,
    pub expected: Option<FormatTag>,
}

/// Compare a file header against the format implied by the extension.
///
/// Unknown extensions validate trivially. Headers shorter than two bytes
/// never validate when an expectation exists.
pub fn validate_magic_bytes(path: &Path, header: &[u8]) -> MagicCheck {
    let Some(expected) = format_for_extension(path) else {
        return MagicCheck {
            is_valid: true,
            detected: None,
            expected: None,
        };
    };

    if header.len() < 2 {
        return MagicCheck {
            is_valid: false,
            detected: None,
            expected: Some(expected),
        };
    }

    let is_valid = match expected {
        FormatTag::Webp => is_webp(header),
        other => SIGNATURES
            .iter()
            .any(|(tag, magic)| *tag == other && header.starts_with(magic)),
    };

    MagicCheck {
        is_valid,
        detected: if is_valid { Some(expected) } else { detect_format(header) },
        expected: Some(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_header_validates_for_png_extension() {
        let header = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0d";
        let check = validate_magic_bytes(Path::new("image.png"), header);
        assert!(check.is_valid);
        assert_eq!(check.detected, Some(FormatTag::Png));
        assert_eq!(check.expected, Some(FormatTag::Png));
    }

    #[test]
    fn png_bytes_with_jpg_extension_report_both_formats() {
        let header = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0d";
        let check = validate_magic_bytes(Path::new("fake.jpg"), header);
        assert!(!check.is_valid);
        assert_eq!(check.detected, Some(FormatTag::Png));
        assert_eq!(check.expected, Some(FormatTag::Jpeg));
    }

    #[test]
    fn webp_needs_riff_and_webp_markers() {
        let good = b"RIFF\x10\x00\x00\x00WEBPVP8 ";
        assert!(validate_magic_bytes(Path::new("a.webp"), good).is_valid);

        let riff_only = b"RIFF\x10\x00\x00\x00AVI LIST";
        let check = validate_magic_bytes(Path::new("a.webp"), riff_only);
        assert!(!check.is_valid);
        assert_eq!(check.detected, None);
    }

    #[test]
    fn unknown_extension_skips_validation() {
        let check = validate_magic_bytes(Path::new("file.xyz"), b"random content");
        assert!(check.is_valid);
        assert_eq!(check.expected, None);
    }

    #[test]
    fn jpeg_variants_all_validate() {
        for header in [
            b"\xff\xd8\xff\xe0\x00\x10JFIF".as_slice(),
            b"\xff\xd8\xff\xe1\x00\x10Exif".as_slice(),
            b"\xff\xd8\xff\xdb\x00\x43\x00\x08".as_slice(),
        ] {
            assert!(validate_magic_bytes(Path::new("photo.jpeg"), header).is_valid);
        }
    }

    #[test]
    fn short_header_fails_known_extension() {
        let check = validate_magic_bytes(Path::new("x.png"), b"\x89");
        assert!(!check.is_valid);
    }
}
