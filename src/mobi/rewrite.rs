//! Chapter markup rewriting for MOBI.
//!
//! Images and media reference resource records by `recindex` /
//! `mediarecindex`; links point into the text stream by `filepos`. Links
//! become `filepos:N` hrefs and every link target gets an
//! `<a id="filepos:N">` anchor so the selector from href resolution
//! matches an element.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::markup::{TagScanner, render_tag, rewrite_tags};

pub const LINK_SCHEME: &str = "filepos:";

/// Every `filepos` link target in the stream.
pub fn collect_link_targets(stream: &[u8]) -> BTreeSet<usize> {
    TagScanner::new(stream)
        .filter(|tag| !tag.is_end && tag.is("a"))
        .filter_map(|tag| tag.attr("filepos")?.value_usize())
        .collect()
}

pub fn anchor(pos: usize) -> String {
    format!("<a id=\"{LINK_SCHEME}{pos}\"></a>")
}

/// Insert an anchor for each target into `content`, which starts at stream
/// offset `base`.
///
/// Targets before `content` (in the stripped marker or preamble) land at
/// its start, targets past it at its end. A target inside a tag is moved
/// to the start of that tag.
pub fn insert_anchors(content: &[u8], base: usize, targets: impl IntoIterator<Item = usize>) -> Vec<u8> {
    let spans: Vec<Range<usize>> = TagScanner::new(content).map(|tag| tag.span).collect();

    let mut out = Vec::with_capacity(content.len() + 64);
    let mut last = 0;
    for target in targets {
        let mut at = target.saturating_sub(base).min(content.len());
        let i = spans.partition_point(|span| span.end <= at);
        if let Some(span) = spans.get(i)
            && span.start < at
        {
            at = span.start;
        }
        let at = at.max(last);
        out.extend_from_slice(&content[last..at]);
        out.extend_from_slice(anchor(target).as_bytes());
        last = at;
    }
    out.extend_from_slice(&content[last..]);
    out
}

/// Rewrite resource and link references in chapter markup.
///
/// `resource` maps a 1-based record index to a location; references it
/// cannot resolve are left as they are.
pub fn rewrite_markup(markup: &str, mut resource: impl FnMut(usize) -> Option<String>) -> String {
    rewrite_tags(markup, |tag| {
        if tag.is_end {
            return None;
        }

        if tag.is("img") {
            let url = resource(tag.attr("recindex")?.value_usize()?)?;
            return Some(render_tag(tag, markup, &["recindex"], &[("src", url.as_str())]));
        }

        if tag.is("video") || tag.is("audio") {
            let media = tag
                .attr("mediarecindex")
                .and_then(|a| a.value_usize())
                .and_then(&mut resource);
            let poster = tag
                .attr("recindex")
                .and_then(|a| a.value_usize())
                .and_then(&mut resource);

            let mut remove = Vec::new();
            let mut set = Vec::new();
            if let Some(url) = &media {
                remove.push("mediarecindex");
                set.push(("src", url.as_str()));
            }
            if let Some(url) = &poster {
                remove.push("recindex");
                set.push(("poster", url.as_str()));
            }
            return (!set.is_empty()).then(|| render_tag(tag, markup, &remove, &set));
        }

        if tag.is("a") {
            let pos = tag.attr("filepos")?.value_usize()?;
            let href = format!("{LINK_SCHEME}{pos}");
            return Some(render_tag(tag, markup, &["filepos"], &[("href", href.as_str())]));
        }

        None
    })
}
