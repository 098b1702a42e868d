//! Magic-byte content detection.
//!
//! Only the first [`SNIFF_LEN`] bytes of an upload are inspected. The result is compared
//! against the upload allow-list, so this only needs to recognize the allowed families and
//! classify everything else as something that is not on the list.

use image::ImageFormat;

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 2048;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const EMPTY: &str = "application/x-empty";

/// Detect the media type of a payload from its leading bytes.
pub fn sniff(prefix: &[u8]) -> &'static str {
    if prefix.is_empty() {
        return EMPTY;
    }

    let prefix = &prefix[..prefix.len().min(SNIFF_LEN)];

    if let Ok(format) = image::guess_format(prefix) {
        match format {
            ImageFormat::Png => return "image/png",
            ImageFormat::Jpeg => return "image/jpeg",
            ImageFormat::Gif => return "image/gif",
            ImageFormat::WebP => return "image/webp",
            _ => return OCTET_STREAM,
        }
    }

    if prefix.starts_with(b"%PDF-") {
        return "application/pdf";
    }

    if looks_like_text(prefix) {
        return "text/plain";
    }

    OCTET_STREAM
}

/// UTF-8 without control bytes other than tab, newline, carriage return and form feed.
/// The prefix may cut a multi-byte sequence in half; that tail is ignored.
fn looks_like_text(prefix: &[u8]) -> bool {
    let valid = match std::str::from_utf8(prefix) {
        Ok(text) => text.as_bytes(),
        Err(e) if e.error_len().is_none() => &prefix[..e.valid_up_to()],
        Err(_) => return false,
    };

    !valid.is_empty()
        && valid
            .iter()
            .all(|&b| !(b < 0x20 || b == 0x7f) || matches!(b, b'\t' | b'\n' | b'\r' | 0x0c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_signatures() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff(b"\xff\xd8\xff\xe0\0\x10JFIF\0"), "image/jpeg");
        assert_eq!(sniff(b"GIF89a\x01\0\x01\0"), "image/gif");
        assert_eq!(sniff(b"GIF87a\x01\0\x01\0"), "image/gif");
        assert_eq!(sniff(b"RIFF\x24\0\0\0WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_other_image_formats_are_not_allowed_types() {
        // BMP
        assert_eq!(sniff(b"BM\x36\0\0\0\0\0\0\0\x36\0\0\0"), OCTET_STREAM);
    }

    #[test]
    fn test_pdf() {
        assert_eq!(sniff(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"), "application/pdf");
        assert_eq!(sniff(b"%PD"), "text/plain");
    }

    #[test]
    fn test_text() {
        assert_eq!(sniff(b"hello world\n"), "text/plain");
        assert_eq!(sniff("caf\u{e9} na\u{ef}ve\r\n\tok".as_bytes()), "text/plain");
        assert_eq!(sniff(b"page one\x0cpage two"), "text/plain");
    }

    #[test]
    fn test_truncated_utf8_tail_is_tolerated() {
        let mut data = vec![b'a'; SNIFF_LEN - 1];
        data.extend_from_slice("\u{20ac}".as_bytes());
        // Cut inside the euro sign.
        assert_eq!(sniff(&data[..SNIFF_LEN]), "text/plain");
    }

    #[test]
    fn test_binary() {
        assert_eq!(sniff(b"MZ\x90\0\x03\0\0\0"), OCTET_STREAM);
        assert_eq!(sniff(b"PK\x03\x04\x14\0\0\0"), OCTET_STREAM);
        assert_eq!(sniff(b"text with a \0 nul"), OCTET_STREAM);
        assert_eq!(sniff(b"\xc3\x28 invalid utf8"), OCTET_STREAM);
        assert_eq!(sniff(b"bell\x07"), OCTET_STREAM);
    }

    #[test]
    fn test_empty() {
        assert_eq!(sniff(b""), EMPTY);
    }

    #[test]
    fn test_only_prefix_is_inspected() {
        let mut data = vec![b'x'; SNIFF_LEN];
        data.push(0);
        assert_eq!(sniff(&data), "text/plain");
    }
}
