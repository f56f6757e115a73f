use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth. RSS needs four levels
/// (rss/channel/item/field); the margin covers embedded markup.
const MAX_DEPTH: usize = 32;

/// Errors produced while decoding a fetched payload.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not UTF-8, not well-formed XML, or no `<channel>` element.
    #[error("Malformed feed document: {0}")]
    Malformed(String),

    /// SEC-003: nesting exceeds [`MAX_DEPTH`].
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// A decoded RSS channel. Produced fresh per fetch and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyndicationDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<SyndicationItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyndicationItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `pubDate` text; converted to a timestamp during reconciliation.
    pub pub_date: String,
    pub guid: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    Guid,
}

impl Field {
    /// Matches unprefixed names only, so `<atom:link>` is not the channel link.
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            b"guid" => Some(Field::Guid),
            _ => None,
        }
    }
}

/// Where the reader currently is, derived from the open-element stack.
enum Position {
    ChannelField(Field),
    ItemField(Field),
    Item,
    Other,
}

fn position(stack: &[Vec<u8>]) -> Position {
    match stack {
        [_, channel, name] if channel.as_slice() == b"channel" => {
            if name.as_slice() == b"item" {
                Position::Item
            } else {
                Field::from_name(name).map_or(Position::Other, Position::ChannelField)
            }
        }
        [_, channel, item, name] if channel.as_slice() == b"channel" && item.as_slice() == b"item" => {
            Field::from_name(name).map_or(Position::Other, Position::ItemField)
        }
        _ => Position::Other,
    }
}

/// Decodes a raw RSS payload into a [`SyndicationDocument`].
///
/// Channel title and description, and every item's title and description,
/// have HTML character entities decoded after XML decoding, so feeds that
/// double-escape (`&amp;ldquo;`) or wrap text in CDATA read as literal
/// characters. Elements outside `channel` metadata and `item` fields are
/// skipped. When a field repeats, the first non-empty value wins.
///
/// # Errors
///
/// [`ParseError::Malformed`] if the bytes are not UTF-8, not well-formed XML,
/// or lack a `<channel>` directly under the root element.
pub fn parse_document(bytes: &[u8]) -> Result<SyndicationDocument, ParseError> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::Malformed(format!("payload is not UTF-8: {}", e)))?;

    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations, so XXE
    // payloads cannot reach the filesystem or the network.
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut doc: Option<SyndicationDocument> = None;
    let mut item: Option<SyndicationItem> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;

        match event {
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
                if stack.len() > MAX_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                }
                if stack.len() == 2 && stack[1].as_slice() == b"channel" && doc.is_none() {
                    doc = Some(SyndicationDocument::default());
                }
                match position(&stack) {
                    Position::Item => item = Some(SyndicationItem::default()),
                    Position::ChannelField(_) | Position::ItemField(_) => text.clear(),
                    Position::Other => {}
                }
            }
            Event::Empty(e) => {
                stack.push(e.name().as_ref().to_vec());
                if stack.len() == 2 && stack[1].as_slice() == b"channel" && doc.is_none() {
                    doc = Some(SyndicationDocument::default());
                }
                if let (Position::Item, Some(doc)) = (position(&stack), doc.as_mut()) {
                    doc.items.push(SyndicationItem::default());
                }
                stack.pop();
            }
            Event::Text(e) => {
                if matches!(position(&stack), Position::ChannelField(_) | Position::ItemField(_)) {
                    // Undeclared HTML entities (`&ldquo;` unescaped in the XML)
                    // are kept raw and resolved by the HTML pass below.
                    match e.unescape() {
                        Ok(unescaped) => text.push_str(&unescaped),
                        Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Event::CData(e) => {
                if matches!(position(&stack), Position::ChannelField(_) | Position::ItemField(_)) {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                match (position(&stack), doc.as_mut()) {
                    (Position::ChannelField(field), Some(doc)) => {
                        let value = text.trim();
                        match field {
                            Field::Title => fill(&mut doc.title, decode_entities(value)),
                            Field::Link => fill(&mut doc.link, value.to_string()),
                            Field::Description => {
                                fill(&mut doc.description, decode_entities(value))
                            }
                            Field::PubDate | Field::Guid => {}
                        }
                    }
                    (Position::ItemField(field), Some(_)) => {
                        if let Some(item) = item.as_mut() {
                            let value = text.trim();
                            match field {
                                Field::Title => fill(&mut item.title, decode_entities(value)),
                                Field::Link => fill(&mut item.link, value.to_string()),
                                Field::Description => {
                                    fill(&mut item.description, decode_entities(value))
                                }
                                Field::PubDate => fill(&mut item.pub_date, value.to_string()),
                                Field::Guid => {
                                    if item.guid.is_none() && !value.is_empty() {
                                        item.guid = Some(value.to_string());
                                    }
                                }
                            }
                        }
                    }
                    (Position::Item, Some(doc)) => {
                        if let Some(finished) = item.take() {
                            doc.items.push(finished);
                        }
                    }
                    _ => {}
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(
            "document ended inside an open element".to_string(),
        ));
    }

    doc.ok_or_else(|| ParseError::Malformed("missing <channel> element".to_string()))
}

fn fill(slot: &mut String, value: String) {
    if slot.is_empty() {
        *slot = value;
    }
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
