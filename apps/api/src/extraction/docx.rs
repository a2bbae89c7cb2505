//! DOCX text extraction.
//!
//! Three independent strategies, ordered by fidelity:
//! 1. raw text from the body paragraphs and tables of the parsed document,
//! 2. an HTML rendering of headers, body and footers, stripped back to text
//!    with an HTML parser,
//! 3. a blunt scan of the container bytes for readable tokens, for files the
//!    zip reader rejects.
//!
//! Acceptance thresholds are the orchestrator's concern; every function here
//! just returns the best text it can produce.

use std::io::Cursor;

use docx_rs::{
    DocumentChild, Docx, FooterChild, HeaderChild, Paragraph, ParagraphChild, Run, RunChild,
    Table, TableCellContent, TableChild, TableRowChild,
};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::extraction::normalize::clean_document_text;

/// ZIP bomb guard for any single part.
const MAX_PART_BYTES: u64 = 32 * 1024 * 1024;
/// ZIP bomb guard for the whole package.
const MAX_PACKAGE_BYTES: u64 = 64 * 1024 * 1024;

static READABLE_TOKEN_RE: Lazy<regex::bytes::Regex> = Lazy::new(|| {
    regex::bytes::Regex::new(r"(?-u)[A-Za-z0-9@._-]{4,}").expect("valid token regex")
});

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a readable DOCX container: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{part} exceeds {limit} bytes uncompressed")]
    TooLarge { part: String, limit: u64 },

    #[error("unreadable DOCX document: {0}")]
    Parse(String),
}

/// Checks declared part sizes, then parses the package.
fn open(bytes: &[u8]) -> Result<Docx, DocxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut total = 0u64;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.size() > MAX_PART_BYTES {
            return Err(DocxError::TooLarge {
                part: entry.name().to_string(),
                limit: MAX_PART_BYTES,
            });
        }
        total = total.saturating_add(entry.size());
        if total > MAX_PACKAGE_BYTES {
            return Err(DocxError::TooLarge {
                part: "package".to_string(),
                limit: MAX_PACKAGE_BYTES,
            });
        }
    }
    docx_rs::read_docx(bytes).map_err(|e| DocxError::Parse(e.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Document model
// ────────────────────────────────────────────────────────────────────────────

/// A block-level element: the unit both renderers walk.
enum Block<'a> {
    Paragraph(&'a Paragraph),
    Table(&'a Table),
}

enum Piece<'a> {
    Text(&'a str),
    Tab,
    Break,
}

fn body_blocks(docx: &Docx) -> Vec<Block<'_>> {
    docx.document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(Block::Paragraph(p)),
            DocumentChild::Table(t) => Some(Block::Table(t)),
            _ => None,
        })
        .collect()
}

fn header_blocks(docx: &Docx) -> Vec<Block<'_>> {
    let section = &docx.document.section_property;
    [&section.header, &section.first_header, &section.even_header]
        .into_iter()
        .flatten()
        .flat_map(|(_, header)| header.children.iter())
        .filter_map(|child| match child {
            HeaderChild::Paragraph(p) => Some(Block::Paragraph(p)),
            HeaderChild::Table(t) => Some(Block::Table(t)),
            _ => None,
        })
        .collect()
}

fn footer_blocks(docx: &Docx) -> Vec<Block<'_>> {
    let section = &docx.document.section_property;
    [&section.footer, &section.first_footer, &section.even_footer]
        .into_iter()
        .flatten()
        .flat_map(|(_, footer)| footer.children.iter())
        .filter_map(|child| match child {
            FooterChild::Paragraph(p) => Some(Block::Paragraph(p)),
            FooterChild::Table(t) => Some(Block::Table(t)),
            _ => None,
        })
        .collect()
}

/// Rows of cells of blocks.
#[allow(irrefutable_let_patterns)]
fn table_rows(table: &Table) -> Vec<Vec<Vec<Block<'_>>>> {
    let mut rows = Vec::new();
    for row in &table.rows {
        let TableChild::TableRow(row) = row else { continue };
        let mut cells = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else { continue };
            cells.push(
                cell.children
                    .iter()
                    .filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(Block::Paragraph(p)),
                        TableCellContent::Table(t) => Some(Block::Table(t)),
                        _ => None,
                    })
                    .collect(),
            );
        }
        rows.push(cells);
    }
    rows
}

/// Runs of a paragraph, including those nested in hyperlinks.
fn runs(paragraph: &Paragraph) -> Vec<&Run> {
    let mut out = Vec::new();
    collect_runs(&paragraph.children, &mut out);
    out
}

fn collect_runs<'a>(children: &'a [ParagraphChild], out: &mut Vec<&'a Run>) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => out.push(run),
            ParagraphChild::Hyperlink(link) => collect_runs(&link.children, out),
            _ => {}
        }
    }
}

fn pieces(run: &Run) -> impl Iterator<Item = Piece<'_>> {
    run.children.iter().filter_map(|child| match child {
        RunChild::Text(text) => Some(Piece::Text(&text.text)),
        RunChild::Tab(_) => Some(Piece::Tab),
        RunChild::Break(_) => Some(Piece::Break),
        _ => None,
    })
}

fn paragraph_style(paragraph: &Paragraph) -> Option<&str> {
    paragraph.property.style.as_ref().map(|style| style.val.as_str())
}

/// `<w:b/>` is on; `<w:b w:val="0"/>` reads back as `false`.
fn toggle_on<T: Serialize>(toggle: Option<&T>) -> bool {
    toggle.is_some_and(|t| !matches!(serde_json::to_value(t), Ok(Value::Bool(false))))
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 1: raw text
// ────────────────────────────────────────────────────────────────────────────

/// Paragraph text of the document body, paragraphs separated by a blank line.
pub fn raw_text(bytes: &[u8]) -> Result<String, DocxError> {
    let docx = open(bytes)?;
    let mut out = String::new();
    push_plain(&body_blocks(&docx), &mut out);
    Ok(clean_document_text(&out))
}

fn push_plain(blocks: &[Block<'_>], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                for run in runs(paragraph) {
                    for piece in pieces(run) {
                        match piece {
                            Piece::Text(text) => out.push_str(&decode_entities(text)),
                            Piece::Tab => out.push('\t'),
                            Piece::Break => out.push('\n'),
                        }
                    }
                }
                out.push_str("\n\n");
            }
            Block::Table(table) => {
                for row in table_rows(table) {
                    for cell in row {
                        push_plain(&cell, out);
                        out.push('\t');
                    }
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 2: HTML conversion
// ────────────────────────────────────────────────────────────────────────────

/// Renders every text-bearing part to HTML: headers, body, footers.
pub fn to_html(bytes: &[u8]) -> Result<String, DocxError> {
    let docx = open(bytes)?;
    let mut html = String::new();
    push_html(&header_blocks(&docx), &mut html);
    push_html(&body_blocks(&docx), &mut html);
    push_html(&footer_blocks(&docx), &mut html);
    Ok(html)
}

/// HTML conversion followed by markup stripping.
pub fn html_text(bytes: &[u8]) -> Result<String, DocxError> {
    let html = to_html(bytes)?;
    Ok(clean_document_text(&strip_html(&html)))
}

fn push_html(blocks: &[Block<'_>], html: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                let tag = paragraph_tag(paragraph_style(paragraph));
                let mut inner = String::new();
                for run in runs(paragraph) {
                    render_run(run, &mut inner);
                }
                html.push_str(&format!("<{tag}>{inner}</{tag}>"));
            }
            Block::Table(table) => {
                html.push_str("<table>");
                for row in table_rows(table) {
                    html.push_str("<tr>");
                    for cell in row {
                        html.push_str("<td>");
                        push_html(&cell, html);
                        html.push_str("</td>");
                    }
                    html.push_str("</tr>");
                }
                html.push_str("</table>");
            }
        }
    }
}

fn render_run(run: &Run, out: &mut String) {
    let bold = toggle_on(run.run_property.bold.as_ref());
    let italic = toggle_on(run.run_property.italic.as_ref());
    let mut text = String::new();
    for piece in pieces(run) {
        match piece {
            Piece::Text(t) => text.push_str(&decode_entities(t)),
            Piece::Tab => text.push('\t'),
            Piece::Break => {
                out.push_str(&styled(&text, bold, italic));
                out.push_str("<br/>");
                text.clear();
            }
        }
    }
    out.push_str(&styled(&text, bold, italic));
}

fn styled(text: &str, bold: bool, italic: bool) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut rendered = html_escape::encode_text(text).into_owned();
    if italic {
        rendered = format!("<em>{rendered}</em>");
    }
    if bold {
        rendered = format!("<strong>{rendered}</strong>");
    }
    rendered
}

fn paragraph_tag(style: Option<&str>) -> String {
    let Some(style) = style.map(str::to_ascii_lowercase) else {
        return "p".to_string();
    };
    if let Some(level) = style
        .strip_prefix("heading")
        .and_then(|rest| rest.trim().parse::<u8>().ok())
    {
        return format!("h{}", level.clamp(1, 6));
    }
    match style.as_str() {
        "title" => "h1".to_string(),
        "subtitle" => "h2".to_string(),
        "listparagraph" => "li".to_string(),
        _ => "p".to_string(),
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "table", "div", "br",
];

/// Flattens HTML to text, breaking lines after block elements.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    push_element_text(fragment.root_element(), &mut out);
    out
}

fn push_element_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let tag = child_element.value().name();
            push_element_text(child_element, out);
            if BLOCK_ELEMENTS.contains(&tag) {
                out.push('\n');
            } else if tag == "td" {
                out.push('\t');
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 3: binary scan
// ────────────────────────────────────────────────────────────────────────────

/// Readable tokens from the raw container bytes, skipping MIME/XML artifacts.
pub fn binary_scan(bytes: &[u8]) -> String {
    let tokens: Vec<String> = READABLE_TOKEN_RE
        .find_iter(bytes)
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .filter(|token| {
            let lower = token.to_ascii_lowercase().replace('_', "-");
            !lower.contains("content-type") && !lower.contains("xml")
        })
        .collect();
    clean_document_text(&tokens.join(" "))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Read, Write};

    use docx_rs::{Docx, Paragraph, Run};
    use zip::write::SimpleFileOptions;

    pub fn pack(docx: Docx) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        docx.build().pack(&mut buffer).expect("pack docx");
        buffer.into_inner()
    }

    pub fn paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        pack(
            paragraphs
                .iter()
                .fold(Docx::new(), |docx, text| docx.add_paragraph(paragraph(text))),
        )
    }

    /// Swaps one part of a packed DOCX for hand-written XML.
    pub fn replace_part(docx: &[u8], name: &str, xml: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(Cursor::new(docx)).expect("open docx");
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).expect("read entry");
            let entry_name = entry.name().to_string();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).expect("read entry body");
            if entry_name == name {
                contents = xml.as_bytes().to_vec();
            }
            writer
                .start_file(entry_name.as_str(), SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(&contents).expect("write entry");
        }
        writer.finish().expect("finish docx").into_inner()
    }

    /// A zip holding arbitrary parts, not a Word package.
    pub fn zip_with_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start part");
            writer.write_all(body.as_bytes()).expect("write part");
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

#[cfg(test)]
mod tests {
    use docx_rs::{BreakType, Footer, Header, Table, TableCell, TableRow};

    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_raw_text_separates_paragraphs() {
        let docx = docx_with_paragraphs(&["Jane Doe", "Software Engineer & Mentor"]);
        assert_eq!(
            raw_text(&docx).unwrap(),
            "Jane Doe\n\nSoftware Engineer & Mentor"
        );
    }

    #[test]
    fn test_raw_text_reads_tabs_and_breaks() {
        let docx = pack(
            Docx::new().add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Python"))
                    .add_run(Run::new().add_tab().add_text("Rust"))
                    .add_run(
                        Run::new()
                            .add_break(BreakType::TextWrapping)
                            .add_text("Go"),
                    ),
            ),
        );
        assert_eq!(raw_text(&docx).unwrap(), "Python Rust\nGo");
    }

    #[test]
    fn test_raw_text_skips_xml_comments() {
        let base = docx_with_paragraphs(&["placeholder"]);
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>\
<!-- <w:t>Draft</w:t> --><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p></w:body></w:document>";
        let docx = replace_part(&base, "word/document.xml", xml);

        let text = raw_text(&docx).unwrap();
        assert_eq!(text, "Jane Doe");
        assert!(!text.contains("Draft"));
    }

    #[test]
    fn test_raw_text_skips_headers() {
        let docx = pack(
            Docx::new()
                .header(Header::new().add_paragraph(paragraph("jane@example.com")))
                .add_paragraph(paragraph("Body")),
        );
        assert_eq!(raw_text(&docx).unwrap(), "Body");
    }

    #[test]
    fn test_html_includes_headers_footers_and_styles() {
        let docx = pack(
            Docx::new()
                .header(Header::new().add_paragraph(paragraph("jane@example.com | +1 555 0100")))
                .footer(Footer::new().add_paragraph(paragraph("Page 1")))
                .add_paragraph(
                    Paragraph::new()
                        .style("Heading1")
                        .add_run(Run::new().add_text("Experience")),
                )
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Acme Corp").bold()))
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Remote").italic())),
        );

        let html = to_html(&docx).unwrap();
        assert!(html.contains("<h1>Experience</h1>"), "{html}");
        assert!(html.contains("<p><strong>Acme Corp</strong></p>"), "{html}");
        assert!(html.contains("<p><em>Remote</em></p>"), "{html}");

        let text = html_text(&docx).unwrap();
        assert_eq!(
            text,
            "jane@example.com | +1 555 0100\nExperience\nAcme Corp\nRemote\nPage 1"
        );
    }

    #[test]
    fn test_html_renders_tables() {
        let table = Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(paragraph("Rust")),
            TableCell::new().add_paragraph(paragraph("Expert")),
        ])]);
        let docx = pack(Docx::new().add_table(table));

        assert!(to_html(&docx).unwrap().contains("<td><p>Rust</p></td>"));
        assert_eq!(html_text(&docx).unwrap(), "Rust\nExpert");
    }

    #[test]
    fn test_not_a_zip_is_an_archive_error() {
        assert!(matches!(
            raw_text(b"plain bytes, not a zip"),
            Err(DocxError::Archive(_))
        ));
    }

    #[test]
    fn test_zip_without_word_document_is_a_parse_error() {
        let docx = zip_with_parts(&[("word/styles.xml", "<w:styles/>")]);
        assert!(matches!(raw_text(&docx), Err(DocxError::Parse(_))));
    }

    #[test]
    fn test_binary_scan_skips_xml_artifacts() {
        let bytes = b"PK\x03\x04[Content_Types].xml\x00\x01Jane\x02Doe_Resume\xffjane@x.com\x00document.xml";
        assert_eq!(binary_scan(bytes), "Jane Doe_Resume jane@x.com");
    }

    #[test]
    fn test_strip_html_decodes_entities() {
        assert_eq!(strip_html("<p>R&amp;D</p><p>C&#43;&#43;</p>"), "R&D\nC++\n");
    }

    #[test]
    fn test_paragraph_tag_mapping() {
        assert_eq!(paragraph_tag(Some("Heading2")), "h2");
        assert_eq!(paragraph_tag(Some("Title")), "h1");
        assert_eq!(paragraph_tag(Some("Normal")), "p");
        assert_eq!(paragraph_tag(None), "p");
    }

    #[test]
    fn test_toggle_reads_serialized_value() {
        assert!(toggle_on(Some(&true)));
        assert!(!toggle_on(Some(&false)));
        assert!(!toggle_on::<bool>(None));
    }
}
