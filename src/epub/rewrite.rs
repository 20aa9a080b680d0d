//! Chapter rewriting for EPUB content documents.

use crate::markup::{TagScanner, render_tag, rewrite_tags};
use crate::model::{ProcessedChapter, StyleSheet};
use crate::util::{is_external, join_path, parent_dir, split_fragment, unescape_html};

/// Scheme prefix of rewritten in-book links: `epub:<archive path>#<fragment>`.
pub const LINK_SCHEME: &str = "epub:";

/// Elements whose attributes point at embedded resources.
const RESOURCE_ATTRS: &[(&str, &[&str])] = &[
    ("img", &["src"]),
    ("image", &["href", "xlink:href"]),
    ("video", &["src", "poster"]),
    ("audio", &["src"]),
    ("source", &["src"]),
];

/// Inner markup of `<body>`, or the whole document when there is none.
pub fn body_inner(markup: &str) -> &str {
    let mut start = None;
    let mut end = None;
    for tag in TagScanner::new(markup.as_bytes()) {
        if !tag.is("body") {
            continue;
        }
        if tag.is_end {
            end = Some(tag.span.start);
        } else if start.is_none() {
            start = Some(tag.span.end);
        }
    }
    match start {
        Some(start) => &markup[start..end.filter(|&e| e >= start).unwrap_or(markup.len())],
        None => markup,
    }
}

/// Rewrite an in-book link relative to `chapter_path` into the `epub:` form.
/// External links give `None`.
pub fn internal_link(chapter_path: &str, href: &str) -> Option<String> {
    if href.is_empty() || is_external(href) {
        return None;
    }
    let (path, fragment) = split_fragment(href);
    let target = if path.is_empty() {
        chapter_path.to_string()
    } else {
        join_path(parent_dir(chapter_path), path)
    };
    Some(match fragment {
        Some(fragment) => format!("{LINK_SCHEME}{target}#{fragment}"),
        None => format!("{LINK_SCHEME}{target}"),
    })
}

/// Rewrite a content document into a [`ProcessedChapter`].
///
/// `resolve` maps an archive path to a materialized resource location;
/// references it cannot map are logged and left as they were.
pub fn rewrite_chapter(
    markup: &str,
    chapter_path: &str,
    mut resolve: impl FnMut(&str) -> Option<String>,
) -> ProcessedChapter {
    let base_dir = parent_dir(chapter_path);
    let mut resolve_ref = |raw: &str| -> Option<String> {
        let value = unescape_html(raw);
        if value.is_empty() || is_external(&value) {
            return None;
        }
        let path = join_path(base_dir, split_fragment(&value).0);
        let location = resolve(&path);
        if location.is_none() {
            log::warn!("unresolvable reference {value:?} in {chapter_path}");
        }
        location
    };

    let mut css = Vec::new();
    for tag in TagScanner::new(markup.as_bytes()) {
        if tag.is_end || !tag.is("link") {
            continue;
        }
        let is_stylesheet = tag.attr_str("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("stylesheet"))
        });
        if let (true, Some(href)) = (is_stylesheet, tag.attr_str("href")) {
            let href = resolve_ref(href.as_ref()).unwrap_or_else(|| href.into_owned());
            css.push(StyleSheet { href });
        }
    }

    let body = body_inner(markup);
    let html = rewrite_tags(body, |tag| {
        if tag.is_end {
            return None;
        }

        let mut changes: Vec<(String, String)> = Vec::new();
        if tag.is("a") {
            if let Some(attr) = tag.attr("href")
                && let Some(link) = internal_link(chapter_path, &unescape_html(&attr.value_str()))
            {
                changes.push((String::from_utf8_lossy(attr.name).into_owned(), link));
            }
        } else if let Some((_, names)) = RESOURCE_ATTRS.iter().find(|(name, _)| tag.is(name)) {
            for attr in &tag.attrs {
                if names.iter().any(|n| attr.name.eq_ignore_ascii_case(n.as_bytes()))
                    && let Some(location) = resolve_ref(attr.value_str().as_ref())
                {
                    changes.push((String::from_utf8_lossy(attr.name).into_owned(), location));
                }
            }
        }

        if changes.is_empty() {
            return None;
        }
        let set: Vec<(&str, &str)> = changes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Some(render_tag(tag, body, &[], &set))
    });

    ProcessedChapter { html, css }
}
