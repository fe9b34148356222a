//! Visible text of a container document.

use std::io::{Cursor, Read};

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use zip::ZipArchive;

use crate::error::ContentError;
use crate::types::PRIMARY_CONTENT_ENTRY;

pub const WORDML_NAMESPACE: &[u8] = b"http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Extracts the text runs of the primary content entry, joined by single
/// spaces in document order.
pub fn extract_text(bytes: &[u8]) -> Result<String, ContentError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name(PRIMARY_CONTENT_ENTRY)?;

    let mut xml = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut xml)?;

    text_runs(&xml).map(|runs| runs.join(" "))
}

/// Non-empty `w:t` runs of a WordprocessingML document.
pub fn text_runs(xml: &[u8]) -> Result<Vec<String>, ContentError> {
    let mut reader = NsReader::from_reader(xml);
    reader.trim_text(false);

    let mut runs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_resolved_event_into(&mut buf)? {
            (ns, Event::Start(ref e)) if is_text_run(&ns, e.local_name().as_ref()) => {
                depth += 1;
            }
            (ns, Event::End(ref e)) if is_text_run(&ns, e.local_name().as_ref()) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
            (_, Event::Text(e)) if depth > 0 => {
                current.push_str(&e.unescape()?);
            }
            (_, Event::CData(e)) if depth > 0 => {
                let text = std::str::from_utf8(&e)
                    .map_err(|err| quick_xml::Error::NonDecodable(Some(err)))?;
                current.push_str(text);
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(runs)
}

fn is_text_run(ns: &ResolveResult<'_>, local: &[u8]) -> bool {
    local == b"t" && matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == WORDML_NAMESPACE)
}
