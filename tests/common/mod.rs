//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// A 1x1 PNG.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x06\x00\x00\x00\x1f\x15\xc4\x89";
/// Start of a JPEG.
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00";

/// Zip `entries` in order; the `mimetype` entry is stored, others deflated.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let method = if *name == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        zip.start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Alice&apos;s Adventures in Wonderland</dc:title>
    <dc:creator opf:file-as="Carroll, Lewis" opf:role="aut">Lewis Carroll</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="BookId" opf:scheme="URI">http://www.gutenberg.org/11</dc:identifier>
    <dc:subject>Fantasy</dc:subject>
    <dc:date opf:event="publication">1865</dc:date>
    <dc:rights>Public domain</dc:rights>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="css" href="styles/main.css" media-type="text/css"/>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    <item id="cover" href="text/cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="notes" href="text/notes.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover" linear="no"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
    <itemref idref="notes"/>
  </spine>
  <guide>
    <reference type="cover" title="Cover" href="text/cover.xhtml"/>
  </guide>
</package>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="http://www.gutenberg.org/11"/></head>
  <docTitle><text>Alice</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Down the Rabbit-Hole</text></navLabel>
      <content src="text/ch1.xhtml#start"/>
      <navPoint id="np2" playOrder="2">
        <navLabel><text>The Bottle</text></navLabel>
        <content src="text/ch1.xhtml#bottle"/>
      </navPoint>
    </navPoint>
    <navPoint id="np3" playOrder="3">
      <navLabel><text>The Pool of Tears</text></navLabel>
      <content src="text/ch2.xhtml"/>
    </navPoint>
  </navMap>
  <pageList>
    <navLabel><text>Pages</text></navLabel>
    <pageTarget id="p1" type="normal" value="1" playOrder="4">
      <navLabel><text>1</text></navLabel>
      <content src="text/ch1.xhtml#page1"/>
    </pageTarget>
    <pageTarget id="p2" type="normal" value="2" playOrder="5">
      <navLabel><text>2</text></navLabel>
      <content src="text/ch2.xhtml#page2"/>
    </pageTarget>
  </pageList>
</ncx>"#;

pub const COVER_XHTML: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Cover</title></head>
<body><img src="../images/cover.png" alt="Cover"/></body></html>"#;

pub const CH1_XHTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Chapter I</title>
  <link rel="stylesheet" type="text/css" href="../styles/main.css"/>
</head>
<body>
  <h1 id="start">Down the Rabbit-Hole</h1>
  <p id="page1">Alice was beginning to get very tired.<a href="notes.xhtml#n1">1</a></p>
  <p id="bottle"><img src="../images/cover.png" alt="bottle"/> DRINK ME</p>
  <p><a href="http://www.gutenberg.org/">Gutenberg</a> <a href="ch2.xhtml">next</a></p>
</body>
</html>"#;

pub const CH2_XHTML: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head>
<link rel="stylesheet" href="../styles/missing.css"/></head>
<body><h1>The Pool of Tears</h1><p id="page2">Curiouser and curiouser!</p>
<img src="../images/absent.png"/></body></html>"#;

pub const NOTES_XHTML: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<p id="n1">A note.</p></body></html>"#;

pub const MAIN_CSS: &str = "body { margin: 0 }";

/// The sample EPUB used across the integration tests.
pub fn sample_epub() -> Vec<u8> {
    zip_bytes(&[
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", OPF.as_bytes()),
        ("OEBPS/toc.ncx", NCX.as_bytes()),
        ("OEBPS/styles/main.css", MAIN_CSS.as_bytes()),
        ("OEBPS/images/cover.png", PNG),
        ("OEBPS/text/cover.xhtml", COVER_XHTML.as_bytes()),
        ("OEBPS/text/ch1.xhtml", CH1_XHTML.as_bytes()),
        ("OEBPS/text/ch2.xhtml", CH2_XHTML.as_bytes()),
        ("OEBPS/text/notes.xhtml", NOTES_XHTML.as_bytes()),
    ])
}

/// Replace each ten-character `token` in `template` with the zero-padded
/// byte offset of the first occurrence of its `target`.
pub fn fill_filepos(template: &str, links: &[(&str, &str)]) -> String {
    let mut text = template.to_string();
    for (token, target) in links {
        assert_eq!(token.len(), 10, "filepos tokens are ten characters");
        let offset = template.find(target).expect("filepos target present");
        text = text.replace(token, &format!("{offset:010}"));
    }
    text
}

/// Text stream of the sample MOBI: a title page, an inline TOC, two
/// chapters and a notes chapter.
pub fn sample_mobi_text() -> String {
    let template = concat!(
        "<html><head><guide>",
        "<reference title=\"Cover\" type=\"cover\" filepos=FILEPOS_00 />",
        "<reference title=\"Table of Contents\" type=\"toc\" filepos=FILEPOS_01 />",
        "</guide></head><body>",
        "<p id=\"title\">Alice's Adventures in Wonderland</p>",
        "<mbp:pagebreak/>",
        "<div id=\"toc\"><p><a filepos=FILEPOS_02>Down the Rabbit-Hole</a></p>",
        "<blockquote><p><a filepos=FILEPOS_03>The Bottle</a></p>",
        "<p><a filepos=FILEPOS_04>The Cake</a></p></blockquote>",
        "<p><a filepos=FILEPOS_05>The Pool of Tears</a></p></div>",
        "<mbp:pagebreak/>",
        "<h1 id=\"c1\">Down the Rabbit-Hole</h1>",
        "<p>Alice was beginning to get very tired.<a filepos=FILEPOS_06>1</a></p>",
        "<p id=\"bottle\"><img recindex=\"00001\" /> DRINK ME</p>",
        "<p id=\"cake\">EAT ME</p>",
        "<mbp:pagebreak/>",
        "<h1 id=\"c2\">The Pool of Tears</h1><p>Curiouser and curiouser!</p>",
        "<video mediarecindex=\"00003\" recindex=\"00002\"></video>",
        "<mbp:pagebreak/>",
        "<p id=\"n1\">A note.</p>",
        "</body></html>",
    );
    fill_filepos(
        template,
        &[
            ("FILEPOS_00", "<p id=\"title\">"),
            ("FILEPOS_01", "<div id=\"toc\">"),
            ("FILEPOS_02", "<h1 id=\"c1\">"),
            ("FILEPOS_03", "<p id=\"bottle\">"),
            ("FILEPOS_04", "<p id=\"cake\">"),
            ("FILEPOS_05", "<h1 id=\"c2\">"),
            ("FILEPOS_06", "<p id=\"n1\">"),
        ],
    )
}

/// PalmDOC-encode `data` without back-references: every byte a plain
/// literal where possible, otherwise escaped as a one-byte literal run.
pub fn palmdoc_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            0x00 | 0x09..=0x7F => out.push(b),
            _ => out.extend_from_slice(&[0x01, b]),
        }
    }
    out
}

/// Builder for Mobipocket files.
pub struct MobiBuilder {
    pub name: String,
    pub text: Vec<u8>,
    pub record_size: usize,
    pub palmdoc: bool,
    /// Append a zero multibyte-overlap byte to every text record.
    pub trailing_multibyte: bool,
    pub utf8: bool,
    pub title: String,
    pub exth: Vec<(u32, Vec<u8>)>,
    pub resources: Vec<Vec<u8>>,
    pub encrypted: bool,
}

impl MobiBuilder {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        Self {
            name: "Sample_Book".into(),
            text: text.into(),
            record_size: 4096,
            palmdoc: false,
            trailing_multibyte: false,
            utf8: true,
            title: String::new(),
            exth: Vec::new(),
            resources: Vec::new(),
            encrypted: false,
        }
    }

    pub fn exth_string(mut self, kind: u32, value: &str) -> Self {
        self.exth.push((kind, value.as_bytes().to_vec()));
        self
    }

    pub fn exth_u32(mut self, kind: u32, value: u32) -> Self {
        self.exth.push((kind, value.to_be_bytes().to_vec()));
        self
    }

    fn record0(&self, text_records: usize) -> Vec<u8> {
        const HEADER_LEN: u32 = 0xE8;
        let mut r = vec![0u8; 16 + HEADER_LEN as usize];

        let compression: u16 = if self.palmdoc { 2 } else { 1 };
        r[0..2].copy_from_slice(&compression.to_be_bytes());
        r[4..8].copy_from_slice(&(self.text.len() as u32).to_be_bytes());
        r[8..10].copy_from_slice(&(text_records as u16).to_be_bytes());
        r[10..12].copy_from_slice(&(self.record_size as u16).to_be_bytes());
        r[12..14].copy_from_slice(&(self.encrypted as u16 * 2).to_be_bytes());

        r[16..20].copy_from_slice(b"MOBI");
        r[20..24].copy_from_slice(&HEADER_LEN.to_be_bytes());
        r[24..28].copy_from_slice(&2u32.to_be_bytes());
        let encoding: u32 = if self.utf8 { 65001 } else { 1252 };
        r[28..32].copy_from_slice(&encoding.to_be_bytes());
        r[0x5C..0x60].copy_from_slice(&0x0409u32.to_be_bytes());
        r[0x68..0x6C].copy_from_slice(&6u32.to_be_bytes());
        let first_resource = if self.resources.is_empty() {
            u32::MAX
        } else {
            text_records as u32 + 1
        };
        r[0x6C..0x70].copy_from_slice(&first_resource.to_be_bytes());
        r[0x70..0x74].copy_from_slice(&u32::MAX.to_be_bytes());
        let exth_flags: u32 = if self.exth.is_empty() { 0 } else { 0x40 };
        r[0x80..0x84].copy_from_slice(&exth_flags.to_be_bytes());
        let extra_flags: u16 = if self.trailing_multibyte { 1 } else { 0 };
        r[0xF2..0xF4].copy_from_slice(&extra_flags.to_be_bytes());

        if !self.exth.is_empty() {
            let mut body = Vec::new();
            for (kind, data) in &self.exth {
                body.extend_from_slice(&kind.to_be_bytes());
                body.extend_from_slice(&(data.len() as u32 + 8).to_be_bytes());
                body.extend_from_slice(data);
            }
            while body.len() % 4 != 0 {
                body.push(0);
            }
            r.extend_from_slice(b"EXTH");
            r.extend_from_slice(&(body.len() as u32 + 12).to_be_bytes());
            r.extend_from_slice(&(self.exth.len() as u32).to_be_bytes());
            r.extend_from_slice(&body);
        }

        let title_offset = r.len() as u32;
        r.extend_from_slice(self.title.as_bytes());
        r.extend_from_slice(&[0, 0]);
        r[0x54..0x58].copy_from_slice(&title_offset.to_be_bytes());
        r[0x58..0x5C].copy_from_slice(&(self.title.len() as u32).to_be_bytes());
        r
    }

    pub fn build(&self) -> Vec<u8> {
        let mut text_records: Vec<Vec<u8>> = self
            .text
            .chunks(self.record_size)
            .map(|chunk| {
                let mut record = if self.palmdoc {
                    palmdoc_literals(chunk)
                } else {
                    chunk.to_vec()
                };
                if self.trailing_multibyte {
                    record.push(0);
                }
                record
            })
            .collect();
        if text_records.is_empty() {
            text_records.push(Vec::new());
        }

        let mut records = vec![self.record0(text_records.len())];
        records.extend(text_records);
        records.extend(self.resources.iter().cloned());

        let mut header = vec![0u8; 78];
        let name = self.name.as_bytes();
        header[..name.len().min(31)].copy_from_slice(&name[..name.len().min(31)]);
        header[60..68].copy_from_slice(b"BOOKMOBI");
        header[76..78].copy_from_slice(&(records.len() as u16).to_be_bytes());

        let mut offset = 78 + records.len() * 8 + 2;
        for (i, record) in records.iter().enumerate() {
            header.extend_from_slice(&(offset as u32).to_be_bytes());
            header.extend_from_slice(&((i as u32) * 2).to_be_bytes());
            offset += record.len();
        }
        header.extend_from_slice(&[0, 0]);

        for record in records {
            header.extend_from_slice(&record);
        }
        header
    }
}

/// The sample MOBI: PNG illustration, JPEG poster and an audio clip, with
/// the JPEG named as cover.
pub fn sample_mobi() -> Vec<u8> {
    let mut audio = b"AUDI".to_vec();
    audio.extend_from_slice(&12u32.to_be_bytes());
    audio.extend_from_slice(&[0; 4]);
    audio.extend_from_slice(b"ID3\x03\x00audio");

    let mut builder = MobiBuilder::new(sample_mobi_text())
        .exth_string(100, "Lewis Carroll")
        .exth_string(101, "Macmillan")
        .exth_string(105, "Fantasy; Children")
        .exth_string(106, "1865")
        .exth_string(503, "Alice's Adventures in Wonderland")
        .exth_u32(201, 1);
    builder.palmdoc = true;
    builder.trailing_multibyte = true;
    builder.record_size = 256;
    builder.resources = vec![PNG.to_vec(), JPEG.to_vec(), audio];
    builder.build()
}
