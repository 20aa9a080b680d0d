//! Parsers for the EPUB package files: `mimetype`, `META-INF/container.xml`,
//! the OPF package document and the NCX table of contents.
//!
//! All hrefs leaving this module are archive paths: re-based against the
//! directory of the document that declared them, percent-decoded, with the
//! fragment (if any) kept after `#`.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::model::{
    Collection, Contributor, GuideReference, Identifier, ManifestItem, Metadata, NavList,
    NavTarget, PageList, PageTarget, SpineItem, Subject, TocItem,
};
use crate::util::{is_external, join_path, local_name, resolve_entity, split_fragment};

pub const EPUB_MIME_TYPE: &str = "application/epub+zip";
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Validate the `mimetype` entry and return it trimmed.
pub fn parse_mimetype(content: &str) -> Result<String> {
    let mime = content.trim();
    if mime != EPUB_MIME_TYPE {
        return Err(Error::MalformedStructure(format!(
            "unexpected mimetype {mime:?}"
        )));
    }
    Ok(mime.to_string())
}

/// Extract the package document path from `container.xml`.
pub fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attributes(&e)?.remove("full-path")
                    && !path.is_empty()
                {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::MalformedStructure(
        "no rootfile in META-INF/container.xml".into(),
    ))
}

/// Re-base an href from a document in `base_dir`, keeping its fragment.
pub fn rebase_href(base_dir: &str, href: &str) -> String {
    if is_external(href) {
        return href.to_string();
    }
    match split_fragment(href) {
        (path, Some(fragment)) => format!("{}#{fragment}", join_path(base_dir, path)),
        (path, None) => join_path(base_dir, path),
    }
}

/// Everything the OPF package document declares.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub metadata: Metadata,
    /// Manifest in document order.
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub guide: Vec<GuideReference>,
    pub collections: Vec<Collection>,
    /// Archive path of the NCX, from the spine `toc` attribute or the
    /// first manifest item with the NCX media type.
    pub ncx_path: Option<String>,
    /// EPUB 2 `<meta name="cover" content="...">` manifest id.
    pub cover_meta: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Metadata,
    Manifest,
    Spine,
    Guide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Language,
    Creator,
    Contributor,
    Subject,
    Description,
    Publisher,
    Rights,
    Source,
    Identifier,
    Date,
    Meta,
}

impl Field {
    fn from_local(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"title" => Field::Title,
            b"language" => Field::Language,
            b"creator" => Field::Creator,
            b"contributor" => Field::Contributor,
            b"subject" => Field::Subject,
            b"description" => Field::Description,
            b"publisher" => Field::Publisher,
            b"rights" => Field::Rights,
            b"source" => Field::Source,
            b"identifier" => Field::Identifier,
            b"date" => Field::Date,
            b"meta" => Field::Meta,
            _ => return None,
        })
    }
}

/// A metadata element whose text is being collected.
struct PendingField {
    field: Field,
    attrs: HashMap<String, String>,
    text: String,
}

/// Where an element with an `id` ended up, for EPUB 3 `refines`.
#[derive(Debug, Clone, Copy)]
enum Refinable {
    Creator(usize),
    Contributor(usize),
    Subject(usize),
    Identifier(usize),
}

#[derive(Default)]
struct MetadataBuilder {
    metadata: Metadata,
    identifiers: Vec<(String, Identifier)>,
    ids: HashMap<String, Refinable>,
    refinements: Vec<(String, String, String)>,
    cover_meta: Option<String>,
}

impl MetadataBuilder {
    fn finish_field(&mut self, pending: PendingField) {
        let PendingField {
            field,
            mut attrs,
            text,
        } = pending;
        let text = text.trim().to_string();
        let id = attrs.remove("id");
        let metadata = &mut self.metadata;

        let refinable = match field {
            Field::Title if metadata.title.is_empty() => {
                metadata.title = text;
                None
            }
            Field::Language if metadata.language.is_empty() => {
                metadata.language = text;
                None
            }
            Field::Creator | Field::Contributor => {
                let person = Contributor {
                    name: text,
                    file_as: attrs.remove("file-as").unwrap_or_default(),
                    role: attrs.remove("role").unwrap_or_default(),
                };
                if field == Field::Creator {
                    metadata.creators.push(person);
                    Some(Refinable::Creator(metadata.creators.len() - 1))
                } else {
                    metadata.contributors.push(person);
                    Some(Refinable::Contributor(metadata.contributors.len() - 1))
                }
            }
            Field::Subject => {
                metadata.subjects.push(Subject {
                    value: text,
                    authority: attrs.remove("authority").unwrap_or_default(),
                    term: attrs.remove("term").unwrap_or_default(),
                });
                Some(Refinable::Subject(metadata.subjects.len() - 1))
            }
            Field::Description => {
                metadata.description.get_or_insert(text);
                None
            }
            Field::Publisher => {
                metadata.publisher.get_or_insert(text);
                None
            }
            Field::Rights => {
                metadata.rights.get_or_insert(text);
                None
            }
            Field::Source => {
                metadata.source.get_or_insert(text);
                None
            }
            Field::Identifier => {
                self.identifiers.push((
                    id.clone().unwrap_or_default(),
                    Identifier {
                        id: text,
                        scheme: attrs.remove("scheme").unwrap_or_default(),
                    },
                ));
                Some(Refinable::Identifier(self.identifiers.len() - 1))
            }
            Field::Date => {
                let event = attrs
                    .remove("event")
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "publication".to_string());
                metadata.dates.entry(event).or_insert(text);
                None
            }
            Field::Meta => {
                self.finish_meta(attrs, text);
                None
            }
            _ => None,
        };

        if let (Some(id), Some(target)) = (id, refinable) {
            self.ids.insert(id, target);
        }
    }

    fn finish_meta(&mut self, mut attrs: HashMap<String, String>, text: String) {
        // EPUB 2: <meta name="cover" content="item32"/>
        if let Some(name) = attrs.remove("name") {
            let content = attrs.remove("content").unwrap_or_default();
            if name == "cover" {
                self.cover_meta = Some(content.clone());
            }
            self.metadata.metas.entry(name).or_insert(content);
            return;
        }

        // EPUB 3: <meta property="..." refines="#id">text</meta>
        let Some(property) = attrs.remove("property") else {
            return;
        };
        match attrs.remove("refines") {
            Some(target) => {
                let target = target.trim_start_matches('#').to_string();
                self.refinements.push((target, property, text));
            }
            None => {
                self.metadata.metas.entry(property).or_insert(text);
            }
        }
    }

    fn build(mut self, unique_identifier: Option<&str>) -> (Metadata, Option<String>) {
        for (target, property, value) in std::mem::take(&mut self.refinements) {
            let Some(&refinable) = self.ids.get(&target) else {
                continue;
            };
            let metadata = &mut self.metadata;
            match (refinable, property.as_str()) {
                (Refinable::Creator(i), "file-as") => metadata.creators[i].file_as = value,
                (Refinable::Creator(i), "role") => metadata.creators[i].role = value,
                (Refinable::Contributor(i), "file-as") => {
                    metadata.contributors[i].file_as = value
                }
                (Refinable::Contributor(i), "role") => metadata.contributors[i].role = value,
                (Refinable::Subject(i), "authority") => metadata.subjects[i].authority = value,
                (Refinable::Subject(i), "term") => metadata.subjects[i].term = value,
                (Refinable::Identifier(i), "identifier-type") => {
                    self.identifiers[i].1.scheme = value
                }
                _ => {}
            }
        }

        let chosen = unique_identifier
            .and_then(|uid| self.identifiers.iter().position(|(id, _)| id == uid))
            .unwrap_or(0);
        if chosen < self.identifiers.len() {
            self.metadata.identifier = Some(self.identifiers.swap_remove(chosen).1);
        }

        (self.metadata, self.cover_meta)
    }
}

/// Parse the OPF package document. `base_dir` is the directory of the
/// package document inside the archive.
pub fn parse_package(content: &str, base_dir: &str) -> Result<Package> {
    let mut reader = Reader::from_str(content);

    let mut builder = MetadataBuilder::default();
    let mut manifest: Vec<ManifestItem> = Vec::new();
    let mut manifest_ids: HashMap<String, usize> = HashMap::new();
    let mut itemrefs: Vec<(String, bool, String)> = Vec::new();
    let mut guide = Vec::new();
    let mut collections = Vec::new();
    let mut collection_stack: Vec<Collection> = Vec::new();
    let mut toc_id: Option<String> = None;
    let mut unique_identifier: Option<String> = None;
    let mut seen_package = false;

    let mut section = Section::Outside;
    let mut pending: Option<PendingField> = None;

    loop {
        let event = reader.read_event()?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match (section, local) {
                    (_, b"package") => {
                        seen_package = true;
                        unique_identifier = attributes(&e)?.remove("unique-identifier");
                    }
                    (_, b"collection") => {
                        let role = attributes(&e)?.remove("role").unwrap_or_default();
                        let collection = Collection {
                            role,
                            ..Default::default()
                        };
                        if is_empty {
                            attach_collection(&mut collection_stack, &mut collections, collection);
                        } else {
                            collection_stack.push(collection);
                        }
                    }
                    (_, b"link") if !collection_stack.is_empty() => {
                        if let Some(href) = attributes(&e)?.remove("href")
                            && let Some(current) = collection_stack.last_mut()
                        {
                            current.links.push(rebase_href(base_dir, &href));
                        }
                    }
                    (Section::Outside, b"metadata") if collection_stack.is_empty() => {
                        section = Section::Metadata;
                    }
                    (Section::Outside, b"manifest") => section = Section::Manifest,
                    (Section::Outside, b"spine") => {
                        section = Section::Spine;
                        toc_id = attributes(&e)?.remove("toc");
                    }
                    (Section::Outside, b"guide") => section = Section::Guide,
                    (Section::Metadata, _) => {
                        if let Some(field) = Field::from_local(local) {
                            let field_state = PendingField {
                                field,
                                attrs: attributes(&e)?,
                                text: String::new(),
                            };
                            if is_empty {
                                builder.finish_field(field_state);
                            } else {
                                pending = Some(field_state);
                            }
                        }
                    }
                    (Section::Manifest, b"item") => {
                        let mut attrs = attributes(&e)?;
                        let id = attrs.remove("id").unwrap_or_default();
                        let href = attrs.remove("href").unwrap_or_default();
                        if id.is_empty() || href.is_empty() {
                            log::warn!("manifest item without id or href skipped");
                            continue;
                        }
                        if manifest_ids.contains_key(&id) {
                            log::warn!("duplicate manifest id {id:?} skipped");
                            continue;
                        }
                        manifest_ids.insert(id.clone(), manifest.len());
                        manifest.push(ManifestItem {
                            id,
                            href: rebase_href(base_dir, &href),
                            media_type: attrs.remove("media-type").unwrap_or_default(),
                            properties: attrs.remove("properties").unwrap_or_default(),
                            media_overlay: attrs.remove("media-overlay").unwrap_or_default(),
                        });
                    }
                    (Section::Spine, b"itemref") => {
                        let mut attrs = attributes(&e)?;
                        if let Some(idref) = attrs.remove("idref") {
                            let linear = attrs.remove("linear").is_none_or(|v| v.trim() != "no");
                            let properties = attrs.remove("properties").unwrap_or_default();
                            itemrefs.push((idref, linear, properties));
                        }
                    }
                    (Section::Guide, b"reference") => {
                        let mut attrs = attributes(&e)?;
                        if let Some(href) = attrs.remove("href") {
                            guide.push(GuideReference {
                                title: attrs.remove("title").unwrap_or_default(),
                                kind: attrs.remove("type").unwrap_or_default(),
                                href: rebase_href(base_dir, &href),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some(p) = pending.as_mut() {
                    p.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(p) = pending.as_mut() {
                    push_entity(&mut p.text, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if let Some(p) = pending.as_mut() {
                    p.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match (section, local) {
                    (Section::Metadata, b"metadata")
                    | (Section::Manifest, b"manifest")
                    | (Section::Spine, b"spine")
                    | (Section::Guide, b"guide") => section = Section::Outside,
                    (Section::Metadata, _) => {
                        if let Some(p) = pending.take() {
                            builder.finish_field(p);
                        }
                    }
                    (_, b"collection") => {
                        if let Some(collection) = collection_stack.pop() {
                            attach_collection(&mut collection_stack, &mut collections, collection);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_package {
        return Err(Error::MalformedStructure(
            "package document has no <package> element".into(),
        ));
    }

    let spine = itemrefs
        .into_iter()
        .filter_map(|(idref, linear, properties)| {
            let Some(item) = manifest_ids.get(&idref).map(|&i| &manifest[i]) else {
                log::warn!("spine itemref {idref:?} is not in the manifest");
                return None;
            };
            Some(SpineItem {
                id: idref,
                href: item.href.clone(),
                media_type: item.media_type.clone(),
                media_overlay: item.media_overlay.clone(),
                properties,
                linear,
            })
        })
        .collect();

    let ncx_path = toc_id
        .and_then(|id| manifest_ids.get(&id).map(|&i| manifest[i].href.clone()))
        .or_else(|| {
            manifest
                .iter()
                .find(|item| item.media_type == NCX_MEDIA_TYPE)
                .map(|item| item.href.clone())
        });

    let (metadata, cover_meta) = builder.build(unique_identifier.as_deref());

    Ok(Package {
        metadata,
        manifest,
        spine,
        guide,
        collections,
        ncx_path,
        cover_meta,
    })
}

fn attach_collection(stack: &mut [Collection], top: &mut Vec<Collection>, collection: Collection) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(collection),
        None => top.push(collection),
    }
}

/// Navigation structures declared by an NCX document.
#[derive(Debug, Clone, Default)]
pub struct Ncx {
    pub toc: Vec<TocItem>,
    pub page_list: Option<PageList>,
    pub nav_list: Option<NavList>,
}

/// Which NCX element a `navLabel/text` belongs to.
enum NcxNode {
    NavPoint(TocItem),
    PageList(PageList),
    PageTarget(PageTarget),
    NavList(NavList),
    NavTarget(NavTarget),
}

impl NcxNode {
    fn label_mut(&mut self) -> &mut String {
        match self {
            NcxNode::NavPoint(item) => &mut item.label,
            NcxNode::PageList(list) => &mut list.label,
            NcxNode::PageTarget(target) => &mut target.label,
            NcxNode::NavList(list) => &mut list.label,
            NcxNode::NavTarget(target) => &mut target.label,
        }
    }

    fn set_src(&mut self, src: String) {
        match self {
            NcxNode::NavPoint(item) => item.href = Some(src),
            NcxNode::PageTarget(target) => target.href = src,
            NcxNode::NavTarget(target) => target.href = src,
            NcxNode::PageList(_) | NcxNode::NavList(_) => {}
        }
    }
}

/// Parse an NCX document. `base_dir` is the NCX's own directory.
///
/// `navMap` becomes the TOC tree; `pageList` and `navList` are optional.
pub fn parse_ncx(content: &str, base_dir: &str) -> Result<Ncx> {
    let mut reader = Reader::from_str(content);

    let mut ncx = Ncx::default();
    let mut stack: Vec<NcxNode> = Vec::new();
    let mut label: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => {
                        let attrs = attributes(&e)?;
                        stack.push(NcxNode::NavPoint(TocItem {
                            play_order: attrs.get("playOrder").and_then(|v| v.trim().parse().ok()),
                            ..Default::default()
                        }));
                    }
                    b"pageList" => stack.push(NcxNode::PageList(PageList::default())),
                    b"pageTarget" => {
                        let mut attrs = attributes(&e)?;
                        stack.push(NcxNode::PageTarget(PageTarget {
                            value: attrs.remove("value").unwrap_or_default(),
                            kind: attrs.remove("type").unwrap_or_default(),
                            play_order: attrs.get("playOrder").and_then(|v| v.trim().parse().ok()),
                            correspond_id: attrs.remove("correspondId").unwrap_or_default(),
                            ..Default::default()
                        }));
                    }
                    b"navList" => stack.push(NcxNode::NavList(NavList::default())),
                    b"navTarget" => {
                        let mut attrs = attributes(&e)?;
                        stack.push(NcxNode::NavTarget(NavTarget {
                            id: attrs.remove("id").unwrap_or_default(),
                            play_order: attrs.get("playOrder").and_then(|v| v.trim().parse().ok()),
                            ..Default::default()
                        }));
                    }
                    b"text" => label = Some(String::new()),
                    b"content" => set_content_src(&e, &mut stack, base_dir)?,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    set_content_src(&e, &mut stack, base_dir)?;
                }
            }
            Event::Text(e) => {
                if let Some(text) = label.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(text) = label.as_mut() {
                    push_entity(text, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => {
                        if let Some(text) = label.take()
                            && let Some(node) = stack.last_mut()
                            && node.label_mut().is_empty()
                        {
                            *node.label_mut() = text.trim().to_string();
                        }
                    }
                    b"navPoint" | b"pageTarget" | b"navTarget" | b"pageList" | b"navList" => {
                        if let Some(node) = stack.pop() {
                            finish_ncx_node(node, &mut stack, &mut ncx);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ncx)
}

/// Point the innermost open node at a `<content src>` target.
fn set_content_src(e: &BytesStart<'_>, stack: &mut [NcxNode], base_dir: &str) -> Result<()> {
    if let Some(src) = attributes(e)?.remove("src")
        && let Some(node) = stack.last_mut()
    {
        node.set_src(rebase_href(base_dir, &src));
    }
    Ok(())
}

fn finish_ncx_node(node: NcxNode, stack: &mut [NcxNode], ncx: &mut Ncx) {
    match node {
        NcxNode::NavPoint(item) => match stack.last_mut() {
            Some(NcxNode::NavPoint(parent)) => parent.children.push(item),
            _ => ncx.toc.push(item),
        },
        NcxNode::PageTarget(target) => {
            if let Some(NcxNode::PageList(list)) = stack.last_mut() {
                list.page_targets.push(target);
            }
        }
        NcxNode::NavTarget(target) => {
            if let Some(NcxNode::NavList(list)) = stack.last_mut() {
                list.targets.push(target);
            }
        }
        NcxNode::PageList(list) => {
            ncx.page_list.get_or_insert(list);
        }
        NcxNode::NavList(list) => {
            ncx.nav_list.get_or_insert(list);
        }
    }
}

fn push_entity(out: &mut String, entity: &str) {
    match resolve_entity(entity) {
        Some(resolved) => out.push_str(&resolved),
        None => {
            out.push('&');
            out.push_str(entity);
            out.push(';');
        }
    }
}

/// Collect the attributes of an element keyed by local name, values
/// unescaped.
fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(local_name(attr.key.as_ref())).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        out.insert(key, crate::util::unescape_html(&raw).into_owned());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mimetype() {
        assert_eq!(parse_mimetype("application/epub+zip\n").unwrap(), EPUB_MIME_TYPE);
        assert!(matches!(
            parse_mimetype("application/zip"),
            Err(Error::MalformedStructure(_))
        ));
    }

    #[test]
    fn test_parse_container() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="19033/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(parse_container(xml).unwrap(), "19033/content.opf");
    }

    #[test]
    fn test_parse_container_without_rootfile() {
        let xml = r#"<container><rootfiles/></container>"#;
        assert!(matches!(
            parse_container(xml),
            Err(Error::MalformedStructure(_))
        ));
    }

    #[test]
    fn test_rebase_href() {
        assert_eq!(rebase_href("19033", "www.gutenberg.org@files@19033@19033-h@19033-h-0.htm#pgepubid00001"),
            "19033/www.gutenberg.org@files@19033@19033-h@19033-h-0.htm#pgepubid00001");
        assert_eq!(rebase_href("OEBPS/text", "../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(rebase_href("OEBPS", "http://example.com/x"), "http://example.com/x");
    }

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:opf="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="id">
  <metadata>
    <dc:rights>Public domain in the USA.</dc:rights>
    <dc:identifier opf:scheme="URI" id="id">http://www.gutenberg.org/ebooks/19033</dc:identifier>
    <dc:identifier opf:scheme="ISBN">978-0-00-000000-0</dc:identifier>
    <dc:creator opf:file-as="Carroll, Lewis">Lewis Carroll</dc:creator>
    <dc:contributor opf:file-as="Robinson, Gordon" opf:role="ill">Gordon Robinson</dc:contributor>
    <dc:title>Alice&apos;s Adventures in Wonderland</dc:title>
    <dc:language xsi:type="dcterms:RFC4646">en</dc:language>
    <dc:subject opf:authority="LCSH" opf:term="PZ">Fantasy &amp; fairy tales</dc:subject>
    <dc:date opf:event="publication">2006-08-12</dc:date>
    <dc:date opf:event="conversion">2010-02-16T12:34:12.754941+00:00</dc:date>
    <dc:source>http://www.gutenberg.org/files/19033/19033-h/19033-h.htm</dc:source>
    <meta name="cover" content="item32"/>
  </metadata>
  <manifest>
    <item href="pgepub.css" id="item29" media-type="text/css"/>
    <item href="images/cover.jpg" id="item32" media-type="image/jpeg"/>
    <item href="toc.ncx" id="ncx" media-type="application/x-dtbncx+xml"/>
    <item href="chapter1.html" id="item33" media-type="application/xhtml+xml"/>
    <item href="chapter2.html" id="item34" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="item33" linear="yes"/>
    <itemref idref="item34"/>
    <itemref idref="missing"/>
  </spine>
  <guide>
    <reference type="cover" title="Cover Image" href="images/cover.jpg"/>
  </guide>
</package>"#;

    #[test]
    fn test_parse_package_metadata() {
        let package = parse_package(OPF, "19033").unwrap();
        let m = &package.metadata;
        assert_eq!(m.title, "Alice's Adventures in Wonderland");
        assert_eq!(m.language, "en");
        assert_eq!(m.rights.as_deref(), Some("Public domain in the USA."));
        assert_eq!(
            m.identifier,
            Some(Identifier {
                id: "http://www.gutenberg.org/ebooks/19033".into(),
                scheme: "URI".into(),
            })
        );
        assert_eq!(m.creators[0].file_as, "Carroll, Lewis");
        assert_eq!(m.contributors[0].role, "ill");
        assert_eq!(m.subjects[0].value, "Fantasy & fairy tales");
        assert_eq!(m.subjects[0].authority, "LCSH");
        assert_eq!(m.dates.get("publication").map(String::as_str), Some("2006-08-12"));
        assert!(m.dates.contains_key("conversion"));
        assert_eq!(m.metas.get("cover").map(String::as_str), Some("item32"));
        assert_eq!(package.cover_meta.as_deref(), Some("item32"));
    }

    #[test]
    fn test_parse_package_structure() {
        let package = parse_package(OPF, "19033").unwrap();
        assert_eq!(package.manifest.len(), 5);
        assert_eq!(package.manifest[1].href, "19033/images/cover.jpg");
        assert_eq!(package.spine.len(), 2);
        assert!(package.spine[0].linear);
        assert_eq!(package.spine[1].href, "19033/chapter2.html");
        assert_eq!(package.ncx_path.as_deref(), Some("19033/toc.ncx"));
        assert_eq!(
            package.guide,
            vec![GuideReference {
                title: "Cover Image".into(),
                kind: "cover".into(),
                href: "19033/images/cover.jpg".into(),
            }]
        );
    }

    #[test]
    fn test_parse_package_epub3_refines_and_collections() {
        let opf = r##"<package version="3.0" unique-identifier="uid" xmlns="http://www.idpf.org/2007/opf">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:creator id="c1">Jane Doe</dc:creator>
    <meta refines="#c1" property="file-as">Doe, Jane</meta>
    <meta refines="#c1" property="role" scheme="marc:relators">aut</meta>
    <meta refines="#uid" property="identifier-type">uuid</meta>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c" href="c.xhtml" media-type="application/xhtml+xml"/>
    <item id="toc" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine><itemref idref="c" linear="no" properties="page-spread-left"/></spine>
  <collection role="index">
    <metadata><dc:title>Ignored</dc:title></metadata>
    <collection role="index-group"><link href="c.xhtml#idx"/></collection>
    <link href="c.xhtml"/>
  </collection>
</package>"##;
        let package = parse_package(opf, "OEBPS").unwrap();
        let m = &package.metadata;
        assert_eq!(m.title, "");
        assert_eq!(m.creators[0].file_as, "Doe, Jane");
        assert_eq!(m.creators[0].role, "aut");
        assert_eq!(m.identifier.as_ref().unwrap().scheme, "uuid");
        assert_eq!(
            m.metas.get("dcterms:modified").map(String::as_str),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(!package.spine[0].linear);
        assert_eq!(package.spine[0].properties, "page-spread-left");
        // no spine toc attribute: falls back to the NCX media type
        assert_eq!(package.ncx_path.as_deref(), Some("OEBPS/toc.ncx"));

        assert_eq!(package.collections.len(), 1);
        let index = &package.collections[0];
        assert_eq!(index.role, "index");
        assert_eq!(index.links, vec!["OEBPS/c.xhtml".to_string()]);
        assert_eq!(index.children[0].links, vec!["OEBPS/c.xhtml#idx".to_string()]);
    }

    #[test]
    fn test_parse_package_without_package_element() {
        assert!(matches!(
            parse_package("<metadata/>", ""),
            Err(Error::MalformedStructure(_))
        ));
    }

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="x"/></head>
  <docTitle><text>Alice</text></docTitle>
  <navMap>
    <navPoint id="np-1" playOrder="1">
      <navLabel><text>Chapter I</text></navLabel>
      <content src="chapter1.html#pgepubid00001"/>
      <navPoint id="np-2" playOrder="2">
        <navLabel><text>Down the Rabbit&#45;Hole</text></navLabel>
        <content src="chapter1.html#pgepubid00002"/>
      </navPoint>
    </navPoint>
    <navPoint id="np-3" playOrder="3">
      <navLabel><text>Chapter II</text></navLabel>
      <content src="chapter2.html"/>
    </navPoint>
  </navMap>
  <pageList>
    <navLabel><text>Pages</text></navLabel>
    <pageTarget id="p1" type="normal" value="1" playOrder="4">
      <navLabel><text>1</text></navLabel>
      <content src="chapter1.html#page1"/>
    </pageTarget>
    <pageTarget id="p2" type="normal" value="2" playOrder="5">
      <navLabel><text>2</text></navLabel>
      <content src="chapter2.html#page2"/>
    </pageTarget>
  </pageList>
  <navList>
    <navLabel><text>Illustrations</text></navLabel>
    <navTarget id="ill-1" playOrder="6">
      <navLabel><text>The White Rabbit</text></navLabel>
      <content src="chapter1.html#ill1"/>
    </navTarget>
  </navList>
</ncx>"#;

    #[test]
    fn test_parse_ncx_nav_map() {
        let ncx = parse_ncx(NCX, "19033").unwrap();
        assert_eq!(ncx.toc.len(), 2);
        let first = &ncx.toc[0];
        assert_eq!(first.label, "Chapter I");
        assert_eq!(first.href.as_deref(), Some("19033/chapter1.html#pgepubid00001"));
        assert_eq!(first.play_order, Some(1));
        assert_eq!(first.children.len(), 1);
        assert_eq!(first.children[0].label, "Down the Rabbit-Hole");
        assert!(ncx.toc[1].children.is_empty());
    }

    #[test]
    fn test_parse_ncx_page_and_nav_lists() {
        let ncx = parse_ncx(NCX, "19033").unwrap();
        let pages = ncx.page_list.unwrap();
        assert_eq!(pages.label, "Pages");
        assert_eq!(pages.page_targets.len(), 2);
        let last = &pages.page_targets[1];
        assert_eq!(last.label, "2");
        assert_eq!(last.value, "2");
        assert_eq!(last.kind, "normal");
        assert_eq!(last.play_order, Some(5));
        assert_eq!(last.href, "19033/chapter2.html#page2");

        let nav = ncx.nav_list.unwrap();
        assert_eq!(nav.label, "Illustrations");
        assert_eq!(nav.targets[0].id, "ill-1");
        assert_eq!(nav.targets[0].label, "The White Rabbit");
    }

    #[test]
    fn test_parse_ncx_without_optional_lists() {
        let ncx = parse_ncx("<ncx><navMap/></ncx>", "").unwrap();
        assert!(ncx.toc.is_empty());
        assert!(ncx.page_list.is_none());
        assert!(ncx.nav_list.is_none());
    }

    #[test]
    fn test_parse_ncx_content_with_end_tag() {
        let ncx = parse_ncx(
            "<ncx><navMap><navPoint id=\"a\"><navLabel><text>One</text></navLabel>\
             <content src=\"text/one.xhtml#s1\"></content></navPoint></navMap>\
             <pageList><pageTarget value=\"1\"><navLabel><text>1</text></navLabel>\
             <content src=\"text/one.xhtml#p1\"></content></pageTarget></pageList></ncx>",
            "OEBPS",
        )
        .unwrap();
        assert_eq!(ncx.toc[0].href.as_deref(), Some("OEBPS/text/one.xhtml#s1"));
        assert_eq!(ncx.page_list.unwrap().page_targets[0].href, "OEBPS/text/one.xhtml#p1");
    }
}
