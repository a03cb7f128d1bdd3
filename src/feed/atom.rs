//! Atom response decoding.
//!
//! Only two things are pulled out of a response: the `totalResults` hint and
//! each `<entry>` with its direct children. Element names are matched on their
//! local part, so `opensearch:totalResults` and a default-namespace `entry`
//! are found regardless of how the document binds its prefixes.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

use super::{RawEntry, RawField, RawPage, TransportError};

/// Depth of `<entry>` and `<totalResults>` below the `<feed>` root.
const FEED_CHILD_DEPTH: usize = 2;

/// In-progress capture of one `<entry>`.
struct EntryCapture {
    start_offset: usize,
    fields: Vec<RawField>,
    open_field: Option<RawField>,
}

impl EntryCapture {
    fn new(start_offset: usize) -> Self {
        Self {
            start_offset,
            fields: Vec::new(),
            open_field: None,
        }
    }

    fn append_text(&mut self, text: &str) {
        if let Some(field) = self.open_field.as_mut() {
            field.text.get_or_insert_with(String::new).push_str(text);
        }
    }

    fn close_field(&mut self) {
        if let Some(field) = self.open_field.take() {
            self.fields.push(field);
        }
    }
}

/// Decodes one arXiv API response body.
///
/// # Errors
///
/// Returns [`TransportError::MalformedResponse`] for XML syntax errors, an
/// empty or truncated document, and [`TransportError::MissingTotalResults`]
/// when the count hint is absent or not a number.
#[instrument(skip(xml), fields(bytes = xml.len()))]
pub fn decode_feed(xml: &str) -> Result<RawPage, TransportError> {
    let mut reader = Reader::from_str(xml);
    let mut depth: usize = 0;
    let mut saw_root = false;
    let mut entry: Option<EntryCapture> = None;
    let mut total_text: Option<String> = None;
    let mut in_total = false;
    let mut entries = Vec::new();

    loop {
        let event_start = offset(reader.buffer_position());
        let event = reader.read_event().map_err(TransportError::malformed)?;

        match event {
            Event::Start(element) => {
                depth += 1;
                saw_root = true;
                let name = local_name(&element);
                if let Some(capture) = entry.as_mut() {
                    if depth == FEED_CHILD_DEPTH + 1 {
                        capture.open_field = Some(RawField {
                            name,
                            text: None,
                            term: term_attribute(&element)?,
                        });
                    }
                } else if depth == FEED_CHILD_DEPTH && name == "entry" {
                    entry = Some(EntryCapture::new(event_start));
                } else if depth == FEED_CHILD_DEPTH && name == "totalResults" {
                    in_total = true;
                    total_text = Some(String::new());
                }
            }
            Event::Empty(element) => {
                saw_root = true;
                if let Some(capture) = entry.as_mut()
                    && depth == FEED_CHILD_DEPTH
                {
                    capture.fields.push(RawField {
                        name: local_name(&element),
                        text: None,
                        term: term_attribute(&element)?,
                    });
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(TransportError::malformed)?;
                if let Some(capture) = entry.as_mut() {
                    if depth == FEED_CHILD_DEPTH + 1 {
                        capture.append_text(&text);
                    }
                } else if in_total && let Some(total) = total_text.as_mut() {
                    total.push_str(&text);
                }
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data).map_err(TransportError::malformed)?;
                if let Some(capture) = entry.as_mut()
                    && depth == FEED_CHILD_DEPTH + 1
                {
                    capture.append_text(text);
                }
            }
            Event::End(_) => {
                if depth == FEED_CHILD_DEPTH + 1
                    && let Some(capture) = entry.as_mut()
                {
                    capture.close_field();
                } else if depth == FEED_CHILD_DEPTH {
                    if let Some(capture) = entry.take() {
                        let end_offset = offset(reader.buffer_position());
                        let raw_xml = xml
                            .get(capture.start_offset..end_offset)
                            .map_or("", str::trim);
                        entries.push(RawEntry::new(raw_xml, capture.fields));
                    }
                    in_total = false;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(TransportError::malformed("document has no root element"));
    }
    if depth != 0 {
        return Err(TransportError::malformed("document ended inside an open element"));
    }

    let total_results = total_text
        .as_deref()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .ok_or(TransportError::MissingTotalResults)?;

    debug!(entries = entries.len(), total_results, "decoded feed");

    Ok(RawPage {
        entries,
        total_results,
    })
}

fn offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn term_attribute(element: &BytesStart<'_>) -> Result<Option<String>, TransportError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(TransportError::malformed)?;
        if attribute.key.local_name().as_ref() == b"term" {
            let value = attribute
                .unescape_value()
                .map_err(TransportError::malformed)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
