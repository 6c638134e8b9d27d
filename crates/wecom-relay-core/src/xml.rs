//! Structural reader for the flat XML documents WeCom sends.
//!
//! Only the requested element names are captured. Their content may be
//! plain escaped text, CDATA sections, or a mix of both. When an element
//! holds CDATA, whitespace-only text around it is indentation and is
//! dropped. Everything else in the document is skipped, but the whole
//! document must still be well formed.

use crate::{CallbackError, CallbackResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// Read the text content of every element listed in `tags`.
///
/// Tags that do not occur are simply absent from the returned map.
///
/// # Errors
///
/// Returns [`CallbackError::MalformedPayload`] if:
/// - the document is not well-formed XML
/// - a requested element occurs more than once
/// - a requested element contains child elements
/// - a requested element is never closed
pub fn read_fields(
    xml: &str,
    tags: &[&'static str],
) -> CallbackResult<HashMap<&'static str, String>> {
    let mut reader = Reader::from_str(xml);

    let mut fields: HashMap<&'static str, String> = HashMap::new();
    let mut current: Option<OpenField> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(CallbackError::MalformedPayload {
                    reason: format!(
                        "XML parsing error at position {}: {}",
                        reader.buffer_position(),
                        e
                    ),
                })
            }
        };

        match event {
            Event::Start(ref e) => {
                if let Some(open) = &current {
                    return Err(CallbackError::MalformedPayload {
                        reason: format!("element <{}> must not contain child elements", open.tag),
                    });
                }
                if let Some(tag) = lookup(tags, e.name().as_ref()) {
                    ensure_first(&fields, tag)?;
                    current = Some(OpenField::new(tag));
                }
            }
            Event::Empty(ref e) => {
                if let Some(OpenField { tag, .. }) = &current {
                    return Err(CallbackError::MalformedPayload {
                        reason: format!("element <{}> must not contain child elements", tag),
                    });
                }
                if let Some(tag) = lookup(tags, e.name().as_ref()) {
                    ensure_first(&fields, tag)?;
                    fields.insert(tag, String::new());
                }
            }
            Event::Text(ref e) => {
                if let Some(open) = current.as_mut() {
                    let text = e.unescape().map_err(|_| CallbackError::MalformedPayload {
                        reason: format!("element <{}> contains an invalid escape", open.tag),
                    })?;
                    open.segments.push(Segment::Text(text.into_owned()));
                }
            }
            Event::CData(ref e) => {
                if let Some(open) = current.as_mut() {
                    let text = std::str::from_utf8(e).map_err(|_| CallbackError::MalformedPayload {
                        reason: format!("element <{}> contains invalid UTF-8", open.tag),
                    })?;
                    open.segments.push(Segment::CData(text.to_string()));
                }
            }
            Event::End(ref e) => {
                let closes_current =
                    matches!(&current, Some(open) if open.tag.as_bytes() == e.name().as_ref());
                if closes_current {
                    if let Some(open) = current.take() {
                        fields.insert(open.tag, open.into_value());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = current {
        return Err(CallbackError::MalformedPayload {
            reason: format!("element <{}> is not closed", open.tag),
        });
    }

    Ok(fields)
}

/// Content pieces of the requested element being read
enum Segment {
    Text(String),
    CData(String),
}

struct OpenField {
    tag: &'static str,
    segments: Vec<Segment>,
}

impl OpenField {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            segments: Vec::new(),
        }
    }

    /// Concatenate the content, skipping indentation around CDATA.
    fn into_value(self) -> String {
        let has_cdata = self
            .segments
            .iter()
            .any(|segment| matches!(segment, Segment::CData(_)));

        self.segments
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::CData(text) => Some(text),
                Segment::Text(text) if has_cdata && text.trim().is_empty() => None,
                Segment::Text(text) => Some(text),
            })
            .collect()
    }
}

fn lookup(tags: &[&'static str], name: &[u8]) -> Option<&'static str> {
    tags.iter().copied().find(|tag| tag.as_bytes() == name)
}

fn ensure_first(fields: &HashMap<&'static str, String>, tag: &'static str) -> CallbackResult<()> {
    if fields.contains_key(tag) {
        return Err(CallbackError::MalformedPayload {
            reason: format!("element <{}> occurs more than once", tag),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;
