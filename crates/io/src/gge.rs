//! GGE estimate documents: discovery under a corpus root and XML parsing
//! into [`Node`] trees.

use std::path::{Path, PathBuf};

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use smeta_rollup::{DocumentError, DocumentInput, DocumentSource, Node};

use crate::error::IoError;
use crate::text::decode_bytes;

pub const DOCUMENT_EXTENSION: &str = "gge";

// ============================================================================
// Parsing
// ============================================================================

/// Element under construction: its name, attributes and child elements in
/// document order, and accumulated text.
struct Frame {
    name: String,
    entries: Vec<(String, Node)>,
    text: String,
}

impl Frame {
    fn open(e: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut entries = Vec::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value);
            let value = unescape(&raw).map_or_else(|_| raw.to_string(), |v| v.into_owned());
            entries.push((key, Node::Leaf(value.trim().to_string())));
        }
        Self {
            name,
            entries,
            text: String::new(),
        }
    }

    /// Text-only elements become leaves; elements with children or attributes
    /// become composites, keeping any text under `_`.
    fn close(self) -> (String, Node) {
        let text = self.text.trim();
        let node = if self.entries.is_empty() {
            Node::Leaf(text.to_string())
        } else {
            let mut entries = self.entries;
            if !text.is_empty() {
                entries.push(("_".to_string(), Node::Leaf(text.to_string())));
            }
            Node::Composite(entries)
        };
        (self.name, node)
    }
}

/// Parse a decoded document into a tree whose single entry is the root
/// element (normally `Construction`).
pub fn parse_document(xml: &str) -> Result<Node, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false); // text is trimmed per element on close
    let mut buf = Vec::new();

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Node)> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            DocumentError::Parse(format!("at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(ref e) => {
                if root.is_some() {
                    return Err(DocumentError::Parse("content after root element".into()));
                }
                stack.push(Frame::open(e));
            }
            Event::Empty(ref e) => {
                let element = Frame::open(e).close();
                match stack.last_mut() {
                    Some(parent) => parent.entries.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(DocumentError::Parse("content after root element".into()))
                    }
                }
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    return Err(DocumentError::Parse("unbalanced closing tag".into()));
                };
                let element = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.entries.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(ref e) => {
                if let Some(frame) = stack.last_mut() {
                    let text = e
                        .decode()
                        .map_err(|err| DocumentError::Parse(err.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(frame) = stack.last_mut() {
                    resolve_reference(e, &mut frame.text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DocumentError::Parse(format!(
            "unexpected end of document inside <{}>",
            stack.last().map(|f| f.name.as_str()).unwrap_or_default()
        )));
    }
    let (name, node) = root.ok_or_else(|| DocumentError::Parse("no root element".into()))?;
    Ok(Node::Composite(vec![(name, node)]))
}

/// Predefined entities and character references resolve; anything else is
/// kept verbatim as `&name;`.
fn resolve_reference(e: &BytesRef, out: &mut String) {
    if let Ok(Some(c)) = e.resolve_char_ref() {
        out.push(c);
        return;
    }
    let name = String::from_utf8_lossy(e);
    match resolve_predefined_entity(&name) {
        Some(resolved) => out.push_str(resolved),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// All `.gge` files below `root`, sorted by path. Directories whose name is in
/// `skip_dirs` (case-insensitive) are not entered.
pub fn discover_documents(root: &Path, skip_dirs: &[String]) -> Result<Vec<PathBuf>, IoError> {
    let entries = std::fs::read_dir(root).map_err(|e| IoError::read(root, e))?;
    let mut found = Vec::new();
    collect_documents(entries, skip_dirs, &mut found);
    found.sort();
    Ok(found)
}

fn collect_documents(entries: std::fs::ReadDir, skip_dirs: &[String], found: &mut Vec<PathBuf>) {
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if skip_dirs.iter().any(|d| d.to_lowercase() == name) {
                debug!(dir = %path.display(), "skipping directory");
                continue;
            }
            match std::fs::read_dir(&path) {
                Ok(children) => collect_documents(children, skip_dirs, found),
                Err(e) => warn!(dir = %path.display(), error = %e, "cannot read directory"),
            }
        } else if is_document(&path) {
            found.push(path);
        }
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}

/// First directory of `path` below `root`; empty for files directly in `root`.
pub fn object_type(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return String::new();
    };
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => String::new(),
    }
}

/// Read, decode and parse one document. Never fails: problems are carried
/// in the returned input so the pipeline can record and skip them.
pub fn load_document(root: &Path, path: &Path) -> DocumentInput {
    let source = DocumentSource::new(
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        object_type(root, path),
    );
    let tree = std::fs::read(path)
        .map_err(|e| DocumentError::Read(e.to_string()))
        .and_then(|bytes| parse_document(&decode_bytes(&bytes)));
    DocumentInput { source, tree }
}

/// Lazily load every discovered document, one at a time.
pub fn load_corpus(
    root: &Path,
    skip_dirs: &[String],
) -> Result<impl Iterator<Item = DocumentInput>, IoError> {
    let paths = discover_documents(root, skip_dirs)?;
    let root = root.to_path_buf();
    Ok(paths.into_iter().map(move |path| load_document(&root, &path)))
}
