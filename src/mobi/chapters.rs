//! Splitting the text stream into chapters at page-break markers.

use std::ops::Range;

use crate::markup::TagScanner;
use crate::model::Chapter;
use crate::util::decode_text;

/// Chapters of a text stream plus the bookkeeping needed to rewrite them.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub chapters: Vec<Chapter>,
    /// Stream range of each chapter's markup, markers and the body
    /// preamble/epilogue excluded.
    pub content: Vec<Range<usize>>,
    /// The preamble before the first `<body>`, holding guide references.
    pub reference: Range<usize>,
}

impl Segmentation {
    /// Index of the chapter containing stream offset `pos`.
    pub fn chapter_at(&self, pos: usize) -> Option<usize> {
        self.chapters.iter().position(|c| c.contains(pos))
    }
}

fn is_page_break(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"mbp:pagebreak") || name.eq_ignore_ascii_case(b"pagebreak")
}

/// Start-tag spans of every page-break marker, in stream order.
pub fn find_page_breaks(stream: &[u8]) -> Vec<Range<usize>> {
    TagScanner::new(stream)
        .filter(|tag| !tag.is_end && is_page_break(tag.name))
        .map(|tag| tag.span)
        .collect()
}

/// Segment `stream` into chapters.
///
/// Chapter `i` runs from marker `i - 1` (or 0) to marker `i` (or the end
/// of the stream), so ranges are contiguous and cover the whole stream.
/// Without any marker the stream is one chapter.
pub fn segment(stream: &[u8], encoding: &str) -> Segmentation {
    let breaks = find_page_breaks(stream);

    let mut bounds = Vec::with_capacity(breaks.len() + 1);
    let mut start = 0;
    let mut content_start = 0;
    for marker in &breaks {
        bounds.push((start..marker.start, content_start..marker.start));
        start = marker.start;
        content_start = marker.end;
    }
    bounds.push((start..stream.len(), content_start..stream.len()));
    let sizes: Vec<usize> = bounds.iter().map(|(_, content)| content.len()).collect();

    let mut reference = 0..0;
    if let Some((_, first)) = bounds.first_mut()
        && let Some(body) = TagScanner::new(&stream[first.clone()]).find(|t| !t.is_end && t.is("body"))
    {
        reference = first.start..first.start + body.span.start;
        first.start += body.span.end;
    }
    if let Some((_, last)) = bounds.last_mut()
        && let Some(close) = TagScanner::new(&stream[last.clone()]).find(|t| t.is_end && t.is("body"))
    {
        last.end = last.start + close.span.start;
    }

    let (chapters, content) = bounds
        .into_iter()
        .zip(sizes)
        .enumerate()
        .map(|(id, ((range, content), size))| {
            let chapter = Chapter {
                id,
                text: decode_text(&stream[content.clone()], Some(encoding)).into_owned(),
                start: range.start,
                end: range.end,
                size,
            };
            (chapter, content)
        })
        .unzip();

    Segmentation {
        chapters,
        content,
        reference,
    }
}
