//! Minimal namespace-aware element tree for feed documents.
//!
//! Feeds are small (the fetcher caps them at 10MB) and the extractors need
//! "first child named X" and "all descendants named Y" lookups, so the whole
//! document is read into a tree once instead of being matched on the event
//! stream.
use std::borrow::Cow;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted in a feed document.
const MAX_DEPTH: usize = 256;

/// Reasons a feed body is rejected as malformed.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// quick-xml reported a syntax error, a mismatched end tag or a bad entity.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// SEC-003: element nesting exceeds [`MAX_DEPTH`].
    #[error("Nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Unbound namespace prefix: {0}")]
    UnknownPrefix(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("Element <{0}> is never closed")]
    Unclosed(String),

    /// Text or a second element outside the root element.
    #[error("Content outside the root element")]
    ContentOutsideRoot,
}

/// One XML element with its resolved namespace.
///
/// `text` follows the ElementTree convention: only the character data that
/// appears before the first child element. CDATA sections count as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    namespace: Option<String>,
    local_name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Parses a complete XML document and returns its root element.
    ///
    /// # Errors
    ///
    /// Any well-formedness problem is fatal: the feed is treated as a whole,
    /// there is no partial recovery.
    ///
    /// # Security
    ///
    /// SEC-002: quick-xml never expands `<!ENTITY>` declarations, so custom
    /// entities fail with an unescape error instead of being resolved.
    ///
    /// # Encoding
    ///
    /// Text and attribute values are decoded with the encoding named by the
    /// byte-order mark or the XML declaration (UTF-8 when neither is present).
    /// Only ASCII-compatible encodings are supported, not UTF-16.
    pub fn parse(bytes: &[u8]) -> Result<Element, DocumentError> {
        let mut reader = NsReader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
            let namespace = match event {
                Event::Start(_) | Event::Empty(_) => resolve_namespace(ns)?,
                _ => None,
            };
            // Refreshed after each event: the declaration may switch it
            let decoder = reader.decoder();

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(DocumentError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    if root.is_some() {
                        return Err(DocumentError::ContentOutsideRoot);
                    }
                    stack.push(Element::open(namespace, &e, decoder)?);
                }
                Event::Empty(e) => {
                    let element = Element::open(namespace, &e, decoder)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml already verified the end name matches
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(t) => match stack.last_mut() {
                    Some(current) => {
                        if current.children.is_empty() {
                            current.text.push_str(&t.unescape()?);
                        }
                    }
                    None => {
                        if !is_blank(&t) {
                            return Err(DocumentError::ContentOutsideRoot);
                        }
                    }
                },
                Event::CData(c) => match stack.last_mut() {
                    Some(current) => {
                        if current.children.is_empty() {
                            current.text.push_str(&c.decode().map_err(quick_xml::Error::from)?);
                        }
                    }
                    None => return Err(DocumentError::ContentOutsideRoot),
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(DocumentError::Unclosed(open.local_name.clone()));
        }
        root.ok_or(DocumentError::NoRoot)
    }

    fn open(
        namespace: Option<String>,
        start: &BytesStart<'_>,
        decoder: Decoder,
    ) -> Result<Element, DocumentError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            // Namespace declarations are bookkeeping, not data
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Element {
            namespace,
            local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Leading character data, untrimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of an attribute, matched on its local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// True when this element is `{namespace}local_name`.
    /// `None` matches only elements outside any namespace.
    pub fn is(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == namespace
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child named `{namespace}local_name`.
    pub fn child(&self, namespace: Option<&str>, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(namespace, local_name))
    }

    /// Direct children named `{namespace}local_name`, in document order.
    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.is(namespace, local_name))
    }

    /// Up to `limit` descendants (not including `self`) named
    /// `{namespace}local_name`, in document order.
    pub fn descendants(
        &self,
        namespace: Option<&str>,
        local_name: &str,
        limit: usize,
    ) -> Vec<&Element> {
        let mut found = Vec::new();
        let mut pending: Vec<&Element> = self.children.iter().rev().collect();

        while let Some(element) = pending.pop() {
            if found.len() == limit {
                break;
            }
            if element.is(namespace, local_name) {
                found.push(element);
            }
            pending.extend(element.children.iter().rev());
        }

        found
    }
}

fn resolve_namespace(ns: ResolveResult<'_>) -> Result<Option<String>, DocumentError> {
    match ns {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(DocumentError::UnknownPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DocumentError::ContentOutsideRoot),
    }
    Ok(())
}

fn is_blank(raw: &[u8]) -> bool {
    let text: Cow<'_, str> = String::from_utf8_lossy(raw);
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

    #[test]
    fn test_parse_nested_document() {
        let xml = br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Chan</title>
  <item><title>One</title></item>
  <item><title>Two</title></item>
</channel></rss>"#;
        let root = Element::parse(xml).unwrap();
        assert!(root.is(None, "rss"));
        assert_eq!(root.attribute("version"), Some("2.0"));

        let channel = root.child(None, "channel").unwrap();
        assert_eq!(channel.child(None, "title").unwrap().text(), "Chan");

        let items = root.descendants(None, "item", 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].child(None, "title").unwrap().text(), "Two");
    }

    #[test]
    fn test_declared_latin1_encoding_decoded() {
        let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<rss><channel><item><title>Caf\xE9</title>\
<description><![CDATA[Cr\xE8me br\xFBl\xE9e]]></description>\
<category label=\"\xC9t\xE9\"/></item></channel></rss>";
        let root = Element::parse(xml).unwrap();
        let item = root.descendants(None, "item", 1)[0];
        assert_eq!(item.child(None, "title").unwrap().text(), "Caf\u{e9}");
        assert_eq!(
            item.child(None, "description").unwrap().text(),
            "Cr\u{e8}me br\u{fb}l\u{e9}e"
        );
        assert_eq!(
            item.child(None, "category").unwrap().attribute("label"),
            Some("\u{c9}t\u{e9}")
        );
    }

    #[test]
    fn test_undeclared_encoding_must_be_utf8() {
        let xml = b"<rss><channel><title>Caf\xE9</title></channel></rss>";
        assert!(matches!(Element::parse(xml), Err(DocumentError::Xml(_))));
    }

    #[test]
    fn test_default_namespace_resolved() {
        let xml = format!(
            r#"<feed xmlns="{ATOM_NS}"><entry><link href="https://a.example/1"/></entry></feed>"#
        );
        let root = Element::parse(xml.as_bytes()).unwrap();
        assert!(root.is(Some(ATOM_NS), "feed"));
        assert!(root.descendants(None, "entry", 10).is_empty());

        let entries = root.descendants(Some(ATOM_NS), "entry", 10);
        assert_eq!(entries.len(), 1);
        let link = entries[0].child(Some(ATOM_NS), "link").unwrap();
        assert_eq!(link.attribute("href"), Some("https://a.example/1"));
    }

    #[test]
    fn test_prefixed_namespace_resolved() {
        let xml = br#"<rss xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel><item><content:encoded><![CDATA[<p>Body</p>]]></content:encoded></item></channel></rss>"#;
        let root = Element::parse(xml).unwrap();
        let item = root.descendants(None, "item", 1)[0];
        let encoded = item
            .child(Some("http://purl.org/rss/1.0/modules/content/"), "encoded")
            .unwrap();
        assert_eq!(encoded.text(), "<p>Body</p>");
        assert!(item.child(None, "encoded").is_none());
    }

    #[test]
    fn test_text_is_leading_only() {
        let root = Element::parse(b"<d>lead <b>bold</b> tail</d>").unwrap();
        assert_eq!(root.text(), "lead ");
        assert_eq!(root.children()[0].text(), "bold");
    }

    #[test]
    fn test_entities_unescaped() {
        let root = Element::parse(b"<t>a &amp; b &lt;i&gt;</t>").unwrap();
        assert_eq!(root.text(), "a & b <i>");
    }

    #[test]
    fn test_descendants_limit_and_order() {
        let xml = "<r>".to_string() + &"<i><i/></i>".repeat(3) + "</r>";
        let root = Element::parse(xml.as_bytes()).unwrap();
        assert_eq!(root.descendants(None, "i", 100).len(), 6);
        assert_eq!(root.descendants(None, "i", 4).len(), 4);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Element::parse(b"this is not xml").is_err());
        assert!(Element::parse(b"").is_err());
        assert!(Element::parse(b"<rss><channel>").is_err());
        assert!(Element::parse(b"<a><b></a></b>").is_err());
        assert!(Element::parse(b"<a/><b/>").is_err());
        assert!(Element::parse(b"<a>&undefined;</a>").is_err());
        assert!(Element::parse(b"<x:a>unbound</x:a>").is_err());
    }

    #[test]
    fn test_rejects_excessive_depth() {
        let xml = "<d>".repeat(MAX_DEPTH + 1) + &"</d>".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            Element::parse(xml.as_bytes()),
            Err(DocumentError::MaxDepthExceeded(_))
        ));
    }
}
