//! Format-specific text extraction. Each routine reads a file that the
//! extractor has already written to disk and returns raw, un-normalized text.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use zip::ZipArchive;

const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const MIN_WIDE_RUN: usize = 4;
const MIN_NARROW_RUN: usize = 8;

pub fn pdf_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| anyhow!("could not read PDF: {e}"))
}

/// Reads `word/document.xml` out of the DOCX container.
pub fn docx_text(path: &Path) -> Result<String> {
    let file = File::open(path).context("could not open uploaded file")?;
    let mut archive = ZipArchive::new(file).context("not a valid DOCX (ZIP) container")?;
    let mut entry = archive
        .by_name("word/document.xml")
        .context("DOCX container has no word/document.xml")?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .context("word/document.xml is not valid UTF-8")?;
    Ok(document_xml_to_text(&xml))
}

/// Word 97-2003 binary documents. There is no structural parse here: the
/// compound file is scanned for printable text runs in both UTF-16LE and
/// 8-bit form, and the one with more Latin letters wins. Word stores a text
/// piece as 8-bit when every character fits, so both forms occur in practice.
pub fn doc_text(path: &Path) -> Result<String> {
    let data = std::fs::read(path).context("could not read uploaded file")?;

    // Renamed .docx files are common enough to handle.
    if data.starts_with(b"PK\x03\x04") {
        return docx_text(path);
    }
    if !data.starts_with(&OLE_SIGNATURE) {
        bail!("file is not a Word 97-2003 document");
    }

    let wide = wide_runs(&data);
    let narrow = narrow_runs(&data);
    let letters = |s: &str| s.chars().filter(|&c| is_latin_letter(c)).count();
    Ok(if letters(&wide) >= letters(&narrow) {
        wide
    } else {
        narrow
    })
}

fn token_regex() -> &'static Regex {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    TOKENS.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab(?:\s[^>]*)?/>|<w:br(?:\s[^>]*)?/>|<w:cr(?:\s[^>]*)?/>|</w:p>")
            .expect("document.xml token pattern is valid")
    })
}

fn char_ref_regex() -> &'static Regex {
    static CHAR_REFS: OnceLock<Regex> = OnceLock::new();
    CHAR_REFS.get_or_init(|| {
        Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("character reference pattern is valid")
    })
}

/// Keeps run text (`<w:t>`) and turns tabs, breaks and paragraph ends into
/// whitespace. Field codes and deleted text never appear in `<w:t>` and are dropped.
fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    for caps in token_regex().captures_iter(xml) {
        match caps.get(1) {
            Some(text) => out.push_str(&decode_entities(text.as_str())),
            None if caps[0].starts_with("<w:tab") => out.push('\t'),
            None => out.push('\n'),
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let numeric = char_ref_regex().replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// ASCII letters plus the Latin-1 and Latin Extended letter blocks. 8-bit text
/// or table bytes read as UTF-16LE land in CJK and other ranges, never here.
fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
}

fn is_text_char(c: char) -> bool {
    is_latin_letter(c)
        || c.is_ascii_digit()
        || c.is_ascii_punctuation()
        || c == ' '
        || c == '\t'
        || "’‘“”–—•".contains(c)
}

fn push_run(runs: &mut Vec<String>, run: &mut String, min_len: usize) {
    let trimmed = run.trim();
    if trimmed.chars().count() >= min_len && trimmed.chars().any(is_latin_letter) {
        runs.push(trimmed.to_string());
    }
    run.clear();
}

fn wide_runs(data: &[u8]) -> String {
    let mut runs = Vec::new();
    let mut run = String::new();
    for pair in data.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(unit as u32) {
            Some(c) if is_text_char(c) => run.push(c),
            _ => push_run(&mut runs, &mut run, MIN_WIDE_RUN),
        }
    }
    push_run(&mut runs, &mut run, MIN_WIDE_RUN);
    runs.join("\n")
}

fn narrow_runs(data: &[u8]) -> String {
    let mut runs = Vec::new();
    let mut run = String::new();
    for &byte in data {
        let c = byte as char;
        if byte.is_ascii() && is_text_char(c) {
            run.push(c);
        } else {
            push_run(&mut runs, &mut run, MIN_NARROW_RUN);
        }
    }
    push_run(&mut runs, &mut run, MIN_NARROW_RUN);
    runs.join("\n")
}
