use super::*;
use std::io::Write;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn build_docx(document_xml: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", SimpleFileOptions::default())
        .expect("should start content types entry");
    writer
        .write_all(b"<?xml version=\"1.0\"?><Types/>")
        .expect("should write content types");
    writer
        .start_file(DOCX_BODY_PART, SimpleFileOptions::default())
        .expect("should start document entry");
    writer
        .write_all(document_xml.as_bytes())
        .expect("should write document xml");
    writer.finish().expect("should finish archive").into_inner()
}

const SAMPLE_DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Wartung</w:t></w:r><w:r><w:t xml:space="preserve"> der Anlage.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Filter &amp; Dichtungen</w:t><w:tab/><w:t>jährlich.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

#[test]
fn format_from_extension() {
    assert_eq!(DocumentFormat::from_extension("pdf"), DocumentFormat::Pdf);
    assert_eq!(DocumentFormat::from_extension(".PDF"), DocumentFormat::Pdf);
    assert_eq!(DocumentFormat::from_extension("docx"), DocumentFormat::Docx);
    assert_eq!(DocumentFormat::from_extension("md"), DocumentFormat::PlainText);
    assert_eq!(DocumentFormat::from_extension("html"), DocumentFormat::PlainText);
    assert_eq!(DocumentFormat::from_extension("Txt"), DocumentFormat::PlainText);
    assert_eq!(
        DocumentFormat::from_extension("xlsx"),
        DocumentFormat::Unsupported("xlsx".to_string())
    );
}

#[test]
fn format_from_path() {
    assert!(DocumentFormat::from_path(Path::new("/docs/manual.pdf")).is_pdf());
    assert!(DocumentFormat::from_path(Path::new("notes.md")).is_supported());
    assert!(!DocumentFormat::from_path(Path::new("Makefile")).is_supported());
    assert!(!DocumentFormat::from_path(Path::new("image.png")).is_supported());
}

#[test]
fn plain_text_is_passed_through() {
    let html = "<h1>Title</h1><p>Body text.</p>";
    let text = extract_text(html.as_bytes(), &DocumentFormat::PlainText, "page.html")
        .expect("plain text should extract");
    assert_eq!(text, html);
}

#[test]
fn invalid_utf8_is_replaced_not_rejected() {
    let text = extract_text(b"caf\xff ok", &DocumentFormat::PlainText, "broken.txt")
        .expect("lossy decoding should succeed");
    assert!(text.starts_with("caf"));
    assert!(text.ends_with(" ok"));
}

#[test]
fn unsupported_format_is_rejected() {
    let result = extract_text(b"data", &DocumentFormat::Unsupported("xlsx".to_string()), "t.xlsx");
    assert!(matches!(result, Err(RagError::UnsupportedFormat(_))));
}

#[test]
fn docx_paragraphs_become_lines() {
    let bytes = build_docx(SAMPLE_DOCUMENT_XML);
    let text = extract_text(&bytes, &DocumentFormat::Docx, "wartung.docx")
        .expect("docx should extract");

    assert_eq!(text, "Wartung der Anlage.\nFilter & Dichtungen\tjährlich.\n");
}

#[test]
fn docx_without_body_part_fails() {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("other.xml", SimpleFileOptions::default())
        .expect("should start entry");
    writer.write_all(b"<x/>").expect("should write entry");
    let bytes = writer.finish().expect("should finish archive").into_inner();

    let result = extract_text(&bytes, &DocumentFormat::Docx, "empty.docx");
    match result {
        Err(RagError::Extraction { document, message }) => {
            assert_eq!(document, "empty.docx");
            assert!(message.contains(DOCX_BODY_PART), "{}", message);
        }
        other => panic!("expected extraction error, got {:?}", other),
    }
}

#[test]
fn garbage_is_an_extraction_error() {
    let pdf = extract_text(b"not a pdf", &DocumentFormat::Pdf, "fake.pdf");
    assert!(matches!(pdf, Err(RagError::Extraction { .. })));

    let docx = extract_text(b"not a zip", &DocumentFormat::Docx, "fake.docx");
    assert!(matches!(docx, Err(RagError::Extraction { .. })));
}

#[tokio::test]
async fn extract_file_reads_from_disk() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("readme.md");
    std::fs::write(&path, "# Heading\n\nSome text.").expect("should write file");

    let text = extract_file(&path).await.expect("should extract file");
    assert_eq!(text, "# Heading\n\nSome text.");
}

#[tokio::test]
async fn extract_file_rejects_unknown_extension_without_reading() {
    let result = extract_file(Path::new("/does/not/exist.bin")).await;
    assert!(matches!(result, Err(RagError::UnsupportedFormat(_))));
}
