//! File-type-aware content extraction (SPEC_FULL.md §4.F).
//!
//! Dispatches on [`SourceType`] to one parser per family: `pdf-extract` for PDF, `scraper` for
//! HTML (the teacher already depends on it for its page-fetch tool), `calamine`/`csv` for
//! spreadsheets, a minimal `zip`+`quick-xml` text walk for DOCX/PPTX, and an optional
//! `tesseract`-backed OCR path for images, gated behind the `ocr` feature the same way the
//! teacher gates its own heavy native dependencies.

use std::collections::HashMap;
use std::io::Cursor;

use scraper::{Html, Selector};

use crate::types::{CoreError, Result, SourceType};

/// Below this ratio of extracted characters per input byte, a PDF's text layer is considered
/// sparse (e.g. a scanned document with no OCR layer).
const MIN_PDF_CHAR_DENSITY: f32 = 0.01;

#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub normalized_text: String,
    pub images: Vec<ExtractedImage>,
    pub tables: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
    pub caption_source: Option<String>,
    pub ocr_text: Option<String>,
    pub tags: Vec<String>,
    pub native_width: Option<u32>,
    pub native_height: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, source_type: SourceType, file_name: &str, bytes: &[u8]) -> Result<ExtractedContent> {
        match source_type {
            SourceType::Pdf => extract_pdf(bytes),
            SourceType::Html => Ok(extract_html(bytes)),
            SourceType::Docx => extract_office_xml(bytes, "word/document.xml", &["w:t"]),
            SourceType::Pptx => extract_pptx(bytes),
            SourceType::Xlsx => extract_xlsx(bytes),
            SourceType::Csv => extract_csv(bytes),
            SourceType::Json => extract_json(bytes),
            SourceType::Markdown | SourceType::Text => Ok(ExtractedContent {
                normalized_text: normalize_whitespace(&String::from_utf8_lossy(bytes)),
                ..Default::default()
            }),
            SourceType::Image => extract_image(file_name, bytes),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapses 3+ blank lines down to a single paragraph break and merges a line ending mid-word
/// with a hyphen into the next line (hyphenation repair).
fn repair_paragraphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        if let Some(stripped) = out.strip_suffix('-') {
            out = stripped.to_string();
            out.push_str(line.trim_start());
        } else {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out.trim().to_string()
}

fn extract_pdf(bytes: &[u8]) -> Result<ExtractedContent> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| CoreError::Unsupported(format!("pdf extraction failed: {e}")))?;
    let density = raw.chars().count() as f32 / bytes.len().max(1) as f32;
    let mut metadata = HashMap::new();
    if density < MIN_PDF_CHAR_DENSITY {
        metadata.insert("low_text_density".to_string(), serde_json::Value::Bool(true));
    }
    Ok(ExtractedContent {
        normalized_text: strip_repeating_lines(&repair_paragraphs(&raw)),
        metadata,
        ..Default::default()
    })
}

/// Drops lines that repeat on more than a third of the document's "pages" (blank-line-delimited
/// blocks), a cheap proxy for running headers/footers.
fn strip_repeating_lines(text: &str) -> String {
    let blocks: Vec<&str> = text.split("\n\n").filter(|b| !b.trim().is_empty()).collect();
    if blocks.len() < 3 {
        return text.to_string();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for block in &blocks {
        for line in block.lines() {
            let line = line.trim();
            if !line.is_empty() {
                *counts.entry(line).or_insert(0) += 1;
            }
        }
    }
    let threshold = (blocks.len() / 3).max(2);
    blocks
        .iter()
        .map(|block| {
            block
                .lines()
                .filter(|line| counts.get(line.trim()).copied().unwrap_or(0) <= threshold)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_html(bytes: &[u8]) -> ExtractedContent {
    let text = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&text);
    let strip_selector = Selector::parse("nav, aside, figure, script, style").unwrap();
    let stripped: std::collections::HashSet<_> = document
        .select(&strip_selector)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let block_selector = Selector::parse("p, div, li, h1, h2, h3, h4, h5, h6, td, blockquote").unwrap();
    let mut paragraphs = Vec::new();
    for element in document.select(&block_selector) {
        if stripped.contains(&element.id()) {
            continue;
        }
        let piece: String = element.text().collect::<Vec<_>>().join(" ");
        let piece = piece.split_whitespace().collect::<Vec<_>>().join(" ");
        if !piece.is_empty() {
            paragraphs.push(piece);
        }
    }
    ExtractedContent {
        normalized_text: paragraphs.join("\n\n"),
        ..Default::default()
    }
}

fn extract_office_xml(bytes: &[u8], entry_name: &str, text_tags: &[&str]) -> Result<ExtractedContent> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CoreError::Unsupported(format!("not a valid office archive: {e}")))?;
    let mut file = archive
        .by_name(entry_name)
        .map_err(|e| CoreError::Unsupported(format!("missing {entry_name}: {e}")))?;
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut file, &mut xml).map_err(|e| CoreError::Internal(e.to_string()))?;
    drop(file);
    Ok(ExtractedContent {
        normalized_text: walk_office_text(&xml, text_tags),
        ..Default::default()
    })
}

fn extract_pptx(bytes: &[u8]) -> Result<ExtractedContent> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CoreError::Unsupported(format!("not a valid office archive: {e}")))?;
    let mut slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect();
    slide_names.sort();
    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let mut file = archive.by_name(&name).map_err(|e| CoreError::Internal(e.to_string()))?;
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut file, &mut xml).map_err(|e| CoreError::Internal(e.to_string()))?;
        slides.push(walk_office_text(&xml, &["a:t"]));
    }
    Ok(ExtractedContent {
        normalized_text: slides.join("\n\n"),
        ..Default::default()
    })
}

/// Walks an OOXML part collecting text-run contents (`<w:t>`/`<a:t>`) and any `descr="..."`
/// attributes (alt-text) encountered, each alt-text emitted on its own line.
fn walk_office_text(xml: &str, text_tags: &[&str]) -> String {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = local_name(&e.name());
                if text_tags.contains(&local.as_str()) {
                    in_text_run = true;
                }
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref().ends_with(b"descr") {
                        if let Ok(value) = attr.decode_and_unescape_value(reader.decoder()) {
                            if !value.trim().is_empty() {
                                out.push_str(&value);
                                out.push('\n');
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) if in_text_run => {
                if let Ok(text) = e.unescape() {
                    out.push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                let local = local_name(&e.name());
                if text_tags.contains(&local.as_str()) {
                    in_text_run = false;
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    normalize_whitespace(&out)
}

fn local_name(name: &quick_xml::name::QName) -> String {
    String::from_utf8_lossy(name.local_name().as_ref()).to_string()
}

fn extract_xlsx(bytes: &[u8]) -> Result<ExtractedContent> {
    use calamine::{open_workbook_from_rs, Reader, Xlsx};

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| CoreError::Unsupported(format!("not a valid xlsx workbook: {e}")))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let mut tables = Vec::new();
    for name in sheet_names {
        let Ok(range) = workbook.worksheet_range(&name) else {
            continue;
        };
        let mut rows = Vec::new();
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            rows.push(cells.join("\t"));
        }
        if !rows.is_empty() {
            tables.push(format!("# {name}\n{}", rows.join("\n")));
        }
    }
    Ok(ExtractedContent {
        normalized_text: tables.join("\n\n"),
        tables,
        ..Default::default()
    })
}

fn extract_csv(bytes: &[u8]) -> Result<ExtractedContent> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| CoreError::Unsupported(format!("invalid csv: {e}")))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("\t");
    let mut rows = vec![headers];
    for record in reader.records() {
        let record = record.map_err(|e| CoreError::Unsupported(format!("invalid csv row: {e}")))?;
        rows.push(record.iter().collect::<Vec<_>>().join("\t"));
    }
    let table = rows.join("\n");
    Ok(ExtractedContent {
        normalized_text: table.clone(),
        tables: vec![table],
        ..Default::default()
    })
}

fn extract_json(bytes: &[u8]) -> Result<ExtractedContent> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CoreError::Unsupported(format!("invalid json: {e}")))?;
    let mut lines = Vec::new();
    walk_json(&value, String::new(), &mut lines);
    Ok(ExtractedContent {
        normalized_text: lines.join("\n"),
        ..Default::default()
    })
}

fn walk_json(value: &serde_json::Value, path: String, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                let next = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                walk_json(v, next, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk_json(v, format!("{path}[{i}]"), out);
            }
        }
        serde_json::Value::Null => {}
        leaf => out.push(format!("{path}: {leaf}")),
    }
}

fn extract_image(file_name: &str, bytes: &[u8]) -> Result<ExtractedContent> {
    let dims = sniff_image_dimensions(bytes);
    let ocr_text = match ocr(bytes) {
        Ok(text) => Some(text),
        Err(CoreError::Unsupported(_)) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ocr failed, continuing without a text layer");
            None
        }
    };

    let mut tags: Vec<String> = filename_tokens(file_name);
    if let Some((w, h)) = dims {
        tags.push(if w > h { "landscape" } else if h > w { "portrait" } else { "square" }.to_string());
    }
    if let Some(text) = &ocr_text {
        tags.extend(ocr_tokens(text));
    }
    tags.sort();
    tags.dedup();

    Ok(ExtractedContent {
        normalized_text: ocr_text.clone().unwrap_or_default(),
        images: vec![ExtractedImage {
            bytes: bytes.to_vec(),
            caption: None,
            caption_source: None,
            ocr_text,
            tags,
            native_width: dims.map(|(w, _)| w),
            native_height: dims.map(|(_, h)| h),
        }],
        ..Default::default()
    })
}

fn filename_tokens(file_name: &str) -> Vec<String> {
    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Keeps alphabetic tokens of length >= 3, dropping pure-numeric OCR noise.
fn ocr_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|t| t.len() >= 3 && t.chars().any(|c| c.is_alphabetic()))
        .map(|t| t.to_lowercase())
        .take(20)
        .collect()
}

/// Reads width/height out of a PNG or baseline JPEG header without a full image decode.
fn sniff_image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() > 24 && &bytes[0..8] == b"\x89PNG\r\n\x1a\n" {
        let w = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
        let h = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
        return Some((w, h));
    }
    if bytes.len() > 4 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        let mut i = 2;
        while i + 9 < bytes.len() {
            if bytes[i] != 0xFF {
                i += 1;
                continue;
            }
            let marker = bytes[i + 1];
            if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 && marker != 0xCC {
                let h = u16::from_be_bytes(bytes[i + 5..i + 7].try_into().ok()?) as u32;
                let w = u16::from_be_bytes(bytes[i + 7..i + 9].try_into().ok()?) as u32;
                return Some((w, h));
            }
            let len = u16::from_be_bytes(bytes[i + 2..i + 4].try_into().ok()?) as usize;
            i += 2 + len;
        }
    }
    None
}

#[cfg(feature = "ocr")]
fn ocr(bytes: &[u8]) -> Result<String> {
    tesseract::Tesseract::new(None, Some("eng"))
        .and_then(|t| t.set_image_from_mem(bytes))
        .and_then(|t| t.get_text())
        .map(|text| text.trim().to_string())
        .map_err(|e| CoreError::Internal(format!("ocr failed: {e}")))
}

#[cfg(not(feature = "ocr"))]
fn ocr(_bytes: &[u8]) -> Result<String> {
    Err(CoreError::Unsupported("OCR support is not compiled in (build with --features ocr)".into()))
}
