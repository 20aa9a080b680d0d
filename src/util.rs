//! Text, path and media-type helpers shared by both backends.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Decode bytes to a string.
///
/// Tries UTF-8 first (BOM handled by encoding_rs), then the hint encoding,
/// then Windows-1252, which is what old MOBI files default to.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
        && encoding != encoding_rs::UTF_8
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve a single entity reference (without `&` and `;`).
///
/// Knows the XML entities, `nbsp`, and decimal/hex character references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

/// Replace HTML entity references in `text`. Unknown or malformed
/// references are kept verbatim.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let resolved = after
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| resolve_entity(&after[..semi]).map(|s| (s, semi)));
        match resolved {
            Some((s, semi)) => {
                out.push_str(&s);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Directory part of an archive path, without trailing slash.
pub fn parent_dir(path: &str) -> &str {
    path.rfind(['/', '\\']).map(|i| &path[..i]).unwrap_or("")
}

/// Join a relative href onto an archive directory and normalize it.
///
/// Percent-escapes are decoded, backslashes become forward slashes and
/// `.`/`..` segments are collapsed. Absolute hrefs (leading `/`) are taken
/// relative to the archive root.
pub fn join_path(base_dir: &str, href: &str) -> String {
    let decoded = percent_decode_str(href).decode_utf8_lossy();
    let href = decoded.replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    if !href.starts_with('/') {
        segments.extend(base_dir.split(['/', '\\']).filter(|s| !s.is_empty()));
    }
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Split an href into its path and fragment (fragment without `#`).
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.find('#') {
        Some(i) => (&href[..i], Some(&href[i + 1..])),
        None => (href, None),
    }
}

/// True for hrefs that leave the book (`http:`, `mailto:`, `data:`...).
pub fn is_external(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    !scheme.is_empty()
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Detect image type from magic bytes.
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG") {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Sniff the media type of a MOBI resource record.
pub fn detect_record_type(data: &[u8]) -> &'static str {
    if let Some(image) = detect_image_type(data) {
        return image;
    }
    if data.len() >= 4 && (&data[..4] == b"AUDI" || data.starts_with(b"ID3")) {
        return "audio/mpeg";
    }
    if data.len() >= 4 && &data[..4] == b"VIDE" {
        return "video/mp4";
    }
    "application/octet-stream"
}

/// File extension to use when persisting a resource of `media_type`.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "text/css" => "css",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "video/mp4" => "mp4",
        "font/ttf" | "application/x-font-truetype" => "ttf",
        "font/otf" | "application/vnd.ms-opentype" => "otf",
        "font/woff" | "application/font-woff" => "woff",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(&[0xEF, 0xBB, 0xBF, b'h', b'i']), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert_eq!(strip_bom(&[]), &[]);

        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"opf:meta"), b"meta");
        assert_eq!(local_name(b""), b"");
    }

    #[test]
    fn test_decode_text_cp1252_hint() {
        // 0x93/0x94 are curly quotes in Windows-1252
        let bytes = [0x93, b'h', b'i', 0x94];
        assert_eq!(decode_text(&bytes, Some("windows-1252")), "\u{201c}hi\u{201d}");
        assert_eq!(decode_text("caf\u{e9}".as_bytes(), Some("utf-8")), "caf\u{e9}");
    }

    #[test]
    fn test_decode_text_falls_back_to_cp1252() {
        let bytes = [b'a', 0xE9];
        assert_eq!(decode_text(&bytes, None), "a\u{e9}");
    }

    #[test]
    fn test_unescape_html_common_entities() {
        assert_eq!(unescape_html("&lt;div&gt;"), "<div>");
        assert_eq!(unescape_html("&amp;"), "&");
        assert_eq!(unescape_html("&quot;"), "\"");
        assert_eq!(unescape_html("&#39;"), "'");
    }

    #[test]
    fn test_unescape_html_numeric_entities() {
        assert_eq!(unescape_html("&#x1F600;"), "\u{1F600}");
        assert_eq!(unescape_html("&#x2764;&#xFE0F;"), "\u{2764}\u{FE0F}");
        assert_eq!(unescape_html("&#128512;"), "\u{1F600}");
        assert_eq!(unescape_html("&#9731;"), "\u{2603}");
    }

    #[test]
    fn test_unescape_html_keeps_unknown() {
        assert_eq!(unescape_html("&unknown;"), "&unknown;");
        assert_eq!(unescape_html("&ampx;"), "&ampx;");
        assert_eq!(unescape_html("&#invalid;"), "&#invalid;");
        assert_eq!(unescape_html("fish & chips"), "fish & chips");
    }

    #[test]
    fn test_unescape_html_mixed() {
        assert_eq!(
            unescape_html("&lt;div&gt;&#x1F600; &amp; &#128512;&lt;/div&gt;"),
            "<div>\u{1F600} & \u{1F600}</div>"
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(join_path("OEBPS/text", "../images/a.jpg"), "OEBPS/images/a.jpg");
        assert_eq!(join_path("", "./toc.ncx"), "toc.ncx");
        assert_eq!(join_path("OEBPS", "/cover.jpg"), "cover.jpg");
        assert_eq!(join_path("OEBPS", "my%20file.xhtml"), "OEBPS/my file.xhtml");
        assert_eq!(join_path("a\\b", "c\\d.png"), "a/b/c/d.png");
        assert_eq!(join_path("OEBPS\\text", "..\\images\\a.jpg"), "OEBPS/images/a.jpg");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("19033/content.opf"), "19033");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(parent_dir("a/b/c.xhtml"), "a/b");
        assert_eq!(parent_dir("OEBPS\\content.opf"), "OEBPS");
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("ch1.xhtml#sec"), ("ch1.xhtml", Some("sec")));
        assert_eq!(split_fragment("ch1.xhtml"), ("ch1.xhtml", None));
        assert_eq!(split_fragment("#top"), ("", Some("top")));
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://example.com"));
        assert!(is_external("mailto:someone@example.com"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(!is_external("text/ch1.xhtml"));
        assert!(!is_external("#note"));
        assert!(!is_external("dir/a:b.xhtml"));
    }

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_type(b"\x89PNG\r\n"), Some("image/png"));
        assert_eq!(detect_image_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(detect_image_type(b"FLIS...."), None);
        assert_eq!(detect_image_type(b"ab"), None);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("text/css"), "css");
        assert_eq!(extension_for("application/x-unknown"), "bin");
    }
}
