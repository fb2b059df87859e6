//! The `epub` output filter: packages finished chapters as an EPUB 3 file.

use std::io::{Cursor, Write};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use folio_core::{Chapter, Filter, FilterFuture, ProcessingParams};
use folio_shared::{FolioError, Result, Spec};

use crate::book::{artifact_path, write_artifact};
use crate::dom::{self, escape_xml};

const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Metadata shared by the package documents.
struct BookMeta<'a> {
    identifier: String,
    title: &'a str,
    creator: Option<&'a str>,
    language: &'a str,
}

impl<'a> BookMeta<'a> {
    fn new(spec: &'a Spec) -> Self {
        Self {
            identifier: format!("urn:uuid:{}", Uuid::now_v7()),
            title: spec.display_title(),
            creator: spec.creator.as_deref(),
            language: spec.language.as_deref().unwrap_or("en"),
        }
    }
}

fn chapter_file(chapter: &Chapter) -> String {
    format!("chapter_{}.xhtml", chapter.id())
}

fn io_error(e: zip::result::ZipError) -> FolioError {
    FolioError::Output(format!("epub packaging failed: {e}"))
}

fn write_error(e: std::io::Error) -> FolioError {
    FolioError::Output(format!("epub packaging failed: {e}"))
}

// ---------------------------------------------------------------------------
// Package documents
// ---------------------------------------------------------------------------

fn generate_opf(meta: &BookMeta<'_>, chapters: &[Chapter]) -> String {
    let mut opf = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        meta.identifier
    ));
    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_xml(meta.title)));
    if let Some(creator) = meta.creator {
        opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", escape_xml(creator)));
    }
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(meta.language)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    ));
    opf.push_str("  </metadata>\n");

    opf.push_str(
        r#"  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    for chapter in chapters {
        opf.push_str(&format!(
            "    <item id=\"chapter_{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter.id(),
            chapter_file(chapter)
        ));
    }
    opf.push_str("  </manifest>\n");

    opf.push_str("  <spine toc=\"ncx\">\n");
    for chapter in chapters {
        opf.push_str(&format!("    <itemref idref=\"chapter_{}\"/>\n", chapter.id()));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

fn generate_ncx(meta: &BookMeta<'_>, chapters: &[Chapter]) -> String {
    let mut ncx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
    );
    ncx.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        meta.identifier
    ));
    ncx.push_str("    <meta name=\"dtb:depth\" content=\"1\"/>\n  </head>\n");
    ncx.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        escape_xml(meta.title)
    ));
    ncx.push_str("  <navMap>\n");
    for (order, chapter) in chapters.iter().enumerate() {
        ncx.push_str(&format!(
            r#"    <navPoint id="nav_{id}" playOrder="{play}"><navLabel><text>{title}</text></navLabel><content src="{src}"/></navPoint>"#,
            id = chapter.id(),
            play = order + 1,
            title = escape_xml(&chapter.title),
            src = chapter_file(chapter),
        ));
        ncx.push('\n');
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn xhtml_document(lang: &str, title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" \
         lang=\"{lang}\" xml:lang=\"{lang}\">\n\
         <head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n",
        lang = escape_xml(lang),
        title = escape_xml(title),
    )
}

fn generate_nav(meta: &BookMeta<'_>, chapters: &[Chapter]) -> String {
    let mut body = String::from("<nav epub:type=\"toc\" id=\"toc\">\n<h1>Contents</h1>\n<ol>\n");
    for chapter in chapters {
        body.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            chapter_file(chapter),
            escape_xml(&chapter.title)
        ));
    }
    body.push_str("</ol>\n</nav>");
    xhtml_document(meta.language, meta.title, &body)
}

fn chapter_xhtml(meta: &BookMeta<'_>, chapter: &Chapter) -> String {
    let body = format!(
        "<h1>{}</h1>\n{}",
        escape_xml(&chapter.title),
        dom::inner_xhtml(dom::body(&chapter.dom))
    );
    xhtml_document(meta.language, &chapter.title, &body)
}

// ---------------------------------------------------------------------------
// Epub
// ---------------------------------------------------------------------------

/// Writes `<stem>.epub` from the finished chapters.
pub struct Epub;

impl Epub {
    /// Build the EPUB archive in memory.
    pub fn package(spec: &Spec, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let meta = BookMeta::new(spec);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // mimetype must be the first entry, uncompressed.
        zip.start_file("mimetype", stored).map_err(io_error)?;
        zip.write_all(b"application/epub+zip").map_err(write_error)?;

        zip.start_file("META-INF/container.xml", deflated)
            .map_err(io_error)?;
        zip.write_all(CONTAINER_XML).map_err(write_error)?;

        let documents = [
            ("OEBPS/content.opf", generate_opf(&meta, chapters)),
            ("OEBPS/toc.ncx", generate_ncx(&meta, chapters)),
            ("OEBPS/nav.xhtml", generate_nav(&meta, chapters)),
        ];
        for (path, content) in documents {
            zip.start_file(path, deflated).map_err(io_error)?;
            zip.write_all(content.as_bytes()).map_err(write_error)?;
        }

        for chapter in chapters {
            zip.start_file(format!("OEBPS/{}", chapter_file(chapter)), deflated)
                .map_err(io_error)?;
            zip.write_all(chapter_xhtml(&meta, chapter).as_bytes())
                .map_err(write_error)?;
        }

        let cursor = zip.finish().map_err(io_error)?;
        Ok(cursor.into_inner())
    }
}

impl Filter for Epub {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let bytes = Self::package(&params.spec, params.finished_chapters()?)?;
            let path = artifact_path(params, "epub");
            write_artifact(&path, &bytes).await?;
            info!(path = %path.display(), bytes = bytes.len(), "epub written");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use folio_shared::parse_spec;
    use scraper::Html;
    use zip::ZipArchive;

    use super::*;

    fn book() -> (Spec, Vec<Chapter>) {
        let spec = parse_spec(
            r#"{"title": "Field Notes", "creator": "R. Lee", "language": "en-GB",
                "contents": [{"title": "Birds", "src": "a"}, {"title": "Trees & Moss", "src": "b"}],
                "filters": "fetch", "output": "epub"}"#,
            "test",
        )
        .unwrap();

        let mut birds = Chapter::new(0, "Birds", "a", None);
        birds.dom = Html::parse_document("<p>Crows<br>and rooks</p>");
        let mut trees = Chapter::new(1, "Trees & Moss", "b", None);
        trees.dom = Html::parse_document("<p>Oak</p>");
        (spec, vec![birds, trees])
    }

    fn entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut file = archive.by_name(name).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn mimetype_comes_first_and_uncompressed() {
        let (spec, chapters) = book();
        let bytes = Epub::package(&spec, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        assert_eq!(entry(&mut archive, "mimetype"), "application/epub+zip");
        assert!(entry(&mut archive, "META-INF/container.xml").contains("OEBPS/content.opf"));
    }

    #[test]
    fn package_lists_chapters_in_spine_order() {
        let (spec, chapters) = book();
        let bytes = Epub::package(&spec, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let opf = entry(&mut archive, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Field Notes</dc:title>"));
        assert!(opf.contains("<dc:language>en-GB</dc:language>"));
        let first = opf.find(r#"<itemref idref="chapter_0"/>"#).unwrap();
        let second = opf.find(r#"<itemref idref="chapter_1"/>"#).unwrap();
        assert!(first < second);

        let ncx = entry(&mut archive, "OEBPS/toc.ncx");
        assert!(ncx.contains("<text>Trees &amp; Moss</text>"));
        assert!(entry(&mut archive, "OEBPS/nav.xhtml").contains(r#"epub:type="toc""#));
    }

    #[test]
    fn package_documents_are_complete() {
        let (spec, chapters) = book();
        let bytes = Epub::package(&spec, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let opf = entry(&mut archive, "OEBPS/content.opf");
        assert!(opf.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<package "));
        assert!(opf.contains("<dc:creator>R. Lee</dc:creator>\n"));
        assert!(opf.contains(r#"    <item id="chapter_1" href="chapter_1.xhtml" media-type="application/xhtml+xml"/>"#));
        assert!(opf.ends_with("  </spine>\n</package>\n"));

        let ncx = entry(&mut archive, "OEBPS/toc.ncx");
        assert_eq!(ncx.lines().filter(|l| l.contains("<navPoint ")).count(), 2);
        assert!(ncx.contains(r#"playOrder="2""#));
        assert!(ncx.ends_with("  </navMap>\n</ncx>\n"));
    }

    #[test]
    fn chapters_are_well_formed_xhtml() {
        let (spec, chapters) = book();
        let bytes = Epub::package(&spec, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let birds = entry(&mut archive, "OEBPS/chapter_0.xhtml");
        assert!(birds.starts_with("<?xml"));
        assert!(birds.contains("<h1>Birds</h1>\n<p>Crows<br/>and rooks</p>"));
    }
}
