//! View id extraction.
//!
//! A view definition file looks like
//!
//! ```xml
//! <Content>
//!   <Views>
//!     <ViewDef id="0b3c0a4e-...">...</ViewDef>
//!   </Views>
//! </Content>
//! ```
//!
//! The id scopes the view's localization keys (`view.<id>.*`). Element
//! names compare case-insensitively; text and comments between elements
//! are ignored.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::sync::types::{SyncError, SyncResult};

/// What came up where an element was expected.
enum Child {
    Element { name: String, empty: bool, id: Option<String> },
    Other(&'static str),
    None,
}

/// Read the `ViewDef` id of the view file at `path`.
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] if the file is not well-formed XML
/// or does not follow the `Content > Views > ViewDef[@id]` structure, and an
/// I/O error if it cannot be read.
pub fn view_id(path: &Path) -> SyncResult<String> {
    let xml = fs::read_to_string(path)?;
    view_id_from_str(&xml, &path.display().to_string())
}

/// Same as [`view_id`] on an in-memory document; `source` names it in errors.
///
/// # Errors
///
/// See [`view_id`].
pub fn view_id_from_str(xml: &str, source: &str) -> SyncResult<String> {
    let mut reader = Reader::from_str(xml);
    let bad = |detail: String| {
        SyncError::Configuration(format!(
            "The view file \"{source}\" is not in the expected format. {detail}"
        ))
    };

    // Root element
    let root = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => break (element_name(&e), false),
            Ok(Event::Empty(e)) => break (element_name(&e), true),
            Ok(Event::Eof) => return Err(bad("The document has no root element.".to_string())),
            Ok(_) => {}
            Err(e) => return Err(malformed(source, &e)),
        }
    };
    if !root.0.eq_ignore_ascii_case("Content") {
        return Err(bad(format!(
            "The root element is \"{}\" while the expected one is \"Content\".",
            root.0
        )));
    }
    if root.1 {
        return Err(bad(
            "The \"Content\" element does not have any children. Exactly one with name \"Views\" is expected."
                .to_string(),
        ));
    }

    // Content > Views
    let views = first_child(&mut reader, source)?;
    let views_empty = match views {
        Child::Element { ref name, empty, .. } if name.eq_ignore_ascii_case("Views") => empty,
        other => {
            return Err(bad(format!(
                "First child element under \"Content\" is {}, expected: \"Views\".",
                describe(&other, "UNKNOWN")
            )));
        }
    };
    if views_empty {
        return Err(bad(
            "Child node under \"Content\" -> \"Views\" is NOT PRESENT, expected \"ViewDef\"."
                .to_string(),
        ));
    }

    // Views > ViewDef
    let (id, viewdef_empty) = match first_child(&mut reader, source)? {
        Child::Element { ref name, ref id, empty } if name.eq_ignore_ascii_case("ViewDef") => {
            match id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => (id.to_string(), empty),
                _ => {
                    return Err(bad(
                        "No id attribute available for \"Content\" -> \"Views\" -> \"ViewDef\"."
                            .to_string(),
                    ));
                }
            }
        }
        other => {
            return Err(bad(format!(
                "Child node under \"Content\" -> \"Views\" is {}, expected \"ViewDef\".",
                describe(&other, "NOT PRESENT")
            )));
        }
    };

    // The rest of the document must be well-formed too.
    finish_document(&mut reader, source, if viewdef_empty { 2 } else { 3 })?;
    Ok(id)
}

/// Read to the end of the document with `open` elements still unclosed.
fn finish_document(reader: &mut Reader<&[u8]>, source: &str, mut open: usize) -> SyncResult<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if open == 0 => {
                return Err(SyncError::Configuration(format!(
                    "The view file \"{source}\" has invalid format. It is not a correct XML file: element \"{}\" after the root element.",
                    element_name(&e)
                )));
            }
            Ok(Event::Start(_)) => open += 1,
            Ok(Event::End(_)) => open = open.saturating_sub(1),
            Ok(Event::Eof) if open == 0 => return Ok(()),
            Ok(Event::Eof) => return Err(truncated(source)),
            Ok(_) => {}
            Err(e) => return Err(malformed(source, &e)),
        }
    }
}

/// Next child of the element just opened, skipping text and comments.
fn first_child(reader: &mut Reader<&[u8]>, source: &str) -> SyncResult<Child> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => return child_element(&e, false, source),
            Ok(Event::Empty(e)) => return child_element(&e, true, source),
            Ok(Event::Text(_) | Event::Comment(_)) => {}
            Ok(Event::CData(_)) => return Ok(Child::Other("#cdata-section")),
            Ok(Event::PI(_)) => return Ok(Child::Other("#processing-instruction")),
            Ok(Event::End(_)) => return Ok(Child::None),
            Ok(Event::Eof) => return Err(truncated(source)),
            Ok(Event::Decl(_) | Event::DocType(_)) => {}
            Err(e) => return Err(malformed(source, &e)),
        }
    }
}

fn child_element(e: &BytesStart<'_>, empty: bool, source: &str) -> SyncResult<Child> {
    let id = match e.try_get_attribute("id") {
        Ok(Some(attr)) => Some(
            attr.unescape_value()
                .map_err(|err| malformed(source, &err))?
                .into_owned(),
        ),
        Ok(None) => None,
        Err(err) => return Err(malformed(source, &err.into())),
    };
    Ok(Child::Element {
        name: element_name(e),
        empty,
        id,
    })
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn describe(child: &Child, missing: &str) -> String {
    match child {
        Child::Element { name, .. } => format!("\"{name}\""),
        Child::Other(kind) => format!("\"{kind}\""),
        Child::None => missing.to_string(),
    }
}

fn truncated(source: &str) -> SyncError {
    SyncError::Configuration(format!(
        "The view file \"{source}\" has invalid format. It is not a correct XML file: unexpected end of document."
    ))
}

fn malformed(source: &str, err: &quick_xml::Error) -> SyncError {
    SyncError::Configuration(format!(
        "The view file \"{source}\" has invalid format. It is not a correct XML file. {err}"
    ))
}
