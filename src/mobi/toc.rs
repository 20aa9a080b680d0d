//! Table of contents reconstruction from the inline TOC chapter.
//!
//! The reference section names the TOC with
//! `<reference type="toc" filepos=N/>`. The chapter holding offset `N` is a
//! list of `<p>` entries, each with an `<a filepos=M>` link, where nesting
//! is expressed by `<blockquote>`.

use crate::markup::{NodeId, TagScanner, Tree, render_tag, rewrite_tags};
use crate::model::{Chapter, ChapterId, TocItem};
use crate::util::unescape_html;

/// Stream offset of the TOC named in the reference section.
pub fn find_toc_offset(reference: &[u8]) -> Option<usize> {
    TagScanner::new(reference)
        .filter(|tag| !tag.is_end && tag.is("reference"))
        .find(|tag| {
            tag.attr_str("type")
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("toc"))
        })
        .and_then(|tag| tag.attr("filepos")?.value_usize())
}

/// Quote every `filepos` attribute so the markup parses as XML.
pub fn normalize_filepos(markup: &str) -> String {
    rewrite_tags(markup, |tag| {
        if tag.is_end {
            return None;
        }
        let value = tag.attr("filepos")?.value_str();
        Some(render_tag(tag, markup, &[], &[("filepos", value.trim())]))
    })
}

/// Build the TOC tree from the TOC chapter's markup.
///
/// Entries whose link target falls in no chapter are dropped; their nested
/// entries move under the preceding entry of the same level, or up a level
/// when there is none.
pub fn parse_toc(markup: &str, chapters: &[Chapter]) -> Vec<TocItem> {
    let wrapped = format!("<wrapper>{}</wrapper>", normalize_filepos(markup));
    let tree = Tree::parse(&wrapped);
    match tree.find_descendant(tree.root(), "wrapper", |_| false) {
        Some(wrapper) => build_level(&tree, wrapper, chapters),
        None => Vec::new(),
    }
}

fn is_entry(name: &str) -> bool {
    name == "p" || name == "blockquote"
}

fn build_level(tree: &Tree, parent: NodeId, chapters: &[Chapter]) -> Vec<TocItem> {
    let mut items: Vec<TocItem> = Vec::new();
    for child in tree.element_children(parent) {
        let nested = build_level(tree, child, chapters);
        if !tree.name(child).is_some_and(is_entry) {
            items.extend(nested);
            continue;
        }
        match toc_entry(tree, child, chapters) {
            Some(mut item) => {
                item.children = nested;
                items.push(item);
            }
            None => match items.last_mut() {
                Some(previous) => previous.children.extend(nested),
                None => items.extend(nested),
            },
        }
    }
    items
}

fn toc_entry(tree: &Tree, entry: NodeId, chapters: &[Chapter]) -> Option<TocItem> {
    let link = tree.find_descendant(entry, "a", is_entry)?;
    let filepos: usize = tree.attr(link, "filepos")?.trim().parse().ok()?;
    let chapter = chapters.iter().position(|c| c.contains(filepos))?;

    let text = tree.text(link);
    let label = unescape_html(&text).split_whitespace().collect::<Vec<_>>().join(" ");
    Some(
        TocItem::new(label)
            .with_href(format!("filepos:{filepos}"))
            .with_chapter(ChapterId::Index(chapter)),
    )
}
