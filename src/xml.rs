//! Ordered field codec for the HiLink wire format.
//!
//! Requests are flat XML documents whose parameter order is significant:
//! the device's parser rejects (or silently misinterprets) reordered
//! parameters, and several endpoints take the same field name more than
//! once.  Requests are therefore modelled as an ordered pair list
//! ([`Fields`]), never as a key-unique map.
//!
//! Responses decode into an ordered key/value tree ([`XmlMap`]) after a
//! mandatory check for the device's `<error>` envelope.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::{Error, Result, error_message};

// ---------------------------------------------------------------------------
// Request representation
// ---------------------------------------------------------------------------

/// A single request field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar text content, XML-escaped on emission.
    Text(String),
    /// Nested pair list, e.g. the `<Phones><Phone>..</Phone>..</Phones>`
    /// recipient list of the send-SMS endpoint.
    Nested(Fields),
}

/// An ordered, duplicate-tolerant sequence of request fields.
///
/// Field order is emitted exactly as built; duplicate names are legal and
/// meaningful (a repeated `Phone` field enumerates multiple recipients).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a scalar field, returning `self` for chaining.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a nested pair-list field, returning `self` for chaining.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, inner: Fields) -> Self {
        self.0.push((name.into(), FieldValue::Nested(inner)));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), FieldValue::Text(value.into())));
    }

    /// Build from a flat `name, value, name, value, ..` slice.
    ///
    /// Fails with [`Error::PreconditionViolated`] on an odd-length slice;
    /// this is a programmer-error guard, not a condition callers branch on.
    pub fn from_flat(vals: &[&str]) -> Result<Self> {
        if vals.len() % 2 != 0 {
            return Err(Error::PreconditionViolated(
                "field list must contain name/value pairs",
            ));
        }
        let mut fields = Fields::new();
        for pair in vals.chunks_exact(2) {
            fields.push(pair[0], pair[1]);
        }
        Ok(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldValue)> {
        self.0.iter()
    }
}

/// The body of a write request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Ordered fields, encoded into the standard `<request>` wrapper.
    Fields(Fields),
    /// A fully-formed payload passed through verbatim.
    Raw(Vec<u8>),
}

impl From<Fields> for RequestBody {
    fn from(fields: Fields) -> Self {
        RequestBody::Fields(fields)
    }
}

impl RequestBody {
    /// Encode into the bytes placed on the wire.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RequestBody::Fields(fields) => encode_request(&fields).into_bytes(),
            RequestBody::Raw(buf) => buf,
        }
    }
}

/// Encode an ordered field sequence as a complete request document.
///
/// Emission order is exactly the caller-supplied order, duplicates included.
pub fn encode_request(fields: &Fields) -> String {
    let mut buf = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<request>\n");
    write_pairs(&mut buf, "  ", fields);
    buf.push_str("</request>\n");
    buf
}

fn write_pairs(buf: &mut String, indent: &str, fields: &Fields) {
    for (name, value) in fields.iter() {
        match value {
            FieldValue::Text(text) => {
                let _ = writeln!(buf, "{indent}<{name}>{}</{name}>", escape(text.as_str()));
            }
            FieldValue::Nested(inner) => {
                let _ = writeln!(buf, "{indent}<{name}>");
                write_pairs(buf, &format!("{indent}  "), inner);
                let _ = writeln!(buf, "{indent}</{name}>");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response tree
// ---------------------------------------------------------------------------

/// A decoded response value: scalar text or a nested mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    Text(String),
    Map(XmlMap),
}

impl XmlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            XmlValue::Text(s) => Some(s),
            XmlValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&XmlMap> {
        match self {
            XmlValue::Map(m) => Some(m),
            XmlValue::Text(_) => None,
        }
    }
}

/// An ordered multimap of decoded element names to values.
///
/// Preserves document order and duplicate element names.  `get` returns the
/// first occurrence, matching how the device's flat responses are consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlMap(Vec<(String, XmlValue)>);

impl XmlMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    fn insert(&mut self, name: String, value: XmlValue) {
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&XmlValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// All values for a repeated element name, in document order.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &XmlValue> {
        self.0.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    /// Look up a child and require it to be scalar text.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            None => Err(Error::MissingField(name.to_owned())),
            Some(XmlValue::Text(s)) => Ok(s),
            Some(XmlValue::Map(_)) => Err(Error::TypeMismatch(name.to_owned())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, XmlValue)> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a response body into its top-level tree.
///
/// Checks the device's `<error>` envelope first — a body that carries one
/// always fails with [`Error::Device`], never decodes as data.  Requires
/// exactly one top-level element otherwise.
pub fn decode_tree(buf: &[u8]) -> Result<XmlMap> {
    let tree = parse_document(buf)?;

    if let Some(err) = tree.get("error") {
        let Some(map) = err.as_map() else {
            return Err(Error::InvalidErrorShape);
        };
        let code = map
            .get("code")
            .and_then(XmlValue::as_str)
            .unwrap_or_default()
            .to_owned();
        let message = match map.get("message").and_then(XmlValue::as_str) {
            Some(m) if !m.is_empty() => m.to_owned(),
            _ => error_message(&code).to_owned(),
        };
        return Err(Error::Device { code, message });
    }

    if tree.len() != 1 {
        return Err(Error::MissingOrMultipleRoot);
    }
    Ok(tree)
}

/// Decode a response body and unwrap its single root element.
///
/// Returns the root's name and its children; fails with
/// [`Error::UnexpectedShape`] when the root holds scalar text instead of
/// child elements.
pub fn decode_element(buf: &[u8]) -> Result<(String, XmlMap)> {
    let mut tree = decode_tree(buf)?;
    // decode_tree guarantees exactly one entry
    let (name, value) = tree.0.remove(0);
    match value {
        XmlValue::Map(children) => Ok((name, children)),
        XmlValue::Text(_) => Err(Error::UnexpectedShape),
    }
}

/// Parse an XML document into an ordered tree.
///
/// Elements with child elements become [`XmlValue::Map`]; elements with only
/// text (or nothing) become [`XmlValue::Text`].  Attributes are not used by
/// the protocol and are ignored.
fn parse_document(buf: &[u8]) -> Result<XmlMap> {
    let text = std::str::from_utf8(buf)
        .map_err(|e| Error::MalformedDocument(format!("invalid utf-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // Stack frame per open element: (name, children, accumulated text).
    let mut stack: Vec<(String, XmlMap, String)> = Vec::new();
    let mut top = XmlMap::new();
    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push((name, XmlMap::new(), String::new()));
            }
            Ok(Event::Empty(empty)) => {
                let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                attach(&mut stack, &mut top, name, XmlValue::Text(String::new()));
                saw_element = true;
            }
            Ok(Event::End(_)) => {
                // The reader enforces balanced tags, so the stack is never
                // empty here.
                let Some((name, children, text)) = stack.pop() else {
                    return Err(Error::MalformedDocument("unbalanced end tag".to_owned()));
                };
                let value = if children.is_empty() {
                    XmlValue::Text(text)
                } else {
                    XmlValue::Map(children)
                };
                attach(&mut stack, &mut top, name, value);
                saw_element = true;
            }
            Ok(Event::Text(t)) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| Error::MalformedDocument(e.to_string()))?;
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::MalformedDocument(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(Error::MalformedDocument("unclosed element".to_owned()));
    }
    if !saw_element {
        return Err(Error::MalformedDocument("no elements in document".to_owned()));
    }
    Ok(top)
}

fn attach(
    stack: &mut [(String, XmlMap, String)],
    top: &mut XmlMap,
    name: String,
    value: XmlValue,
) {
    match stack.last_mut() {
        Some((_, children, _)) => children.insert(name, value),
        None => top.insert(name, value),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_preserves_caller_order() {
        let fields = Fields::new()
            .field("PageIndex", "1")
            .field("ReadCount", "20")
            .field("BoxType", "1");
        let xml = encode_request(&fields);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <request>\n\
             \x20 <PageIndex>1</PageIndex>\n\
             \x20 <ReadCount>20</ReadCount>\n\
             \x20 <BoxType>1</BoxType>\n\
             </request>\n"
        );
    }

    #[test]
    fn encode_preserves_duplicate_names() {
        let fields = Fields::new().field("Phone", "123").field("Phone", "456");
        let xml = encode_request(&fields);
        let first = xml.find("<Phone>123</Phone>").expect("first occurrence");
        let second = xml.find("<Phone>456</Phone>").expect("second occurrence");
        assert!(first < second, "duplicates must keep insertion order");
    }

    #[test]
    fn encode_escapes_text_content() {
        let fields = Fields::new().field("Content", "a <b> & c");
        let xml = encode_request(&fields);
        assert!(xml.contains("<Content>a &lt;b&gt; &amp; c</Content>"));
    }

    #[test]
    fn encode_nested_pairs() {
        let phones = Fields::new().field("Phone", "123").field("Phone", "456");
        let fields = Fields::new()
            .field("Index", "-1")
            .nested("Phones", phones)
            .field("Sca", "");
        let xml = encode_request(&fields);
        assert!(xml.contains(
            "  <Phones>\n    <Phone>123</Phone>\n    <Phone>456</Phone>\n  </Phones>\n"
        ));
    }

    #[test]
    fn from_flat_rejects_odd_length() {
        let err = Fields::from_flat(&["Name", "value", "Dangling"]).unwrap_err();
        assert!(matches!(err, Error::PreconditionViolated(_)));
    }

    #[test]
    fn from_flat_builds_pairs_in_order() {
        let fields = Fields::from_flat(&["A", "1", "B", "2"]).unwrap();
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn raw_body_passes_through() {
        let body = RequestBody::Raw(b"<custom/>".to_vec());
        assert_eq!(body.into_bytes(), b"<custom/>");
    }

    #[test]
    fn decode_flat_response() {
        let buf = b"<DeviceInfo><DeviceName>E5186</DeviceName><Imei>1234</Imei></DeviceInfo>";
        let (name, children) = decode_element(buf).unwrap();
        assert_eq!(name, "DeviceInfo");
        assert_eq!(children.require_str("DeviceName").unwrap(), "E5186");
        assert_eq!(children.require_str("Imei").unwrap(), "1234");
    }

    #[test]
    fn decode_preserves_child_order_and_duplicates() {
        let buf = b"<Messages><Phone>1</Phone><Phone>2</Phone><Phone>3</Phone></Messages>";
        let (_, children) = decode_element(buf).unwrap();
        let phones: Vec<&str> = children
            .get_all("Phone")
            .filter_map(XmlValue::as_str)
            .collect();
        assert_eq!(phones, ["1", "2", "3"]);
    }

    #[test]
    fn decode_nested_structure() {
        let buf = b"<response><Outer><Inner>x</Inner></Outer></response>";
        let (_, children) = decode_element(buf).unwrap();
        let outer = children.get("Outer").and_then(XmlValue::as_map).unwrap();
        assert_eq!(outer.require_str("Inner").unwrap(), "x");
    }

    #[test]
    fn decode_ok_envelope_as_tree() {
        let tree = decode_tree(b"<response>OK</response>").unwrap();
        assert_eq!(tree.require_str("response").unwrap(), "OK");
    }

    #[test]
    fn decode_rejects_unparsable_input() {
        let err = decode_tree(b"<open><unclosed>").unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
    }

    #[test]
    fn decode_rejects_empty_document() {
        let err = decode_tree(b"").unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
    }

    #[test]
    fn decode_rejects_multiple_roots() {
        let err = decode_tree(b"<a>1</a><b>2</b>").unwrap_err();
        assert!(matches!(err, Error::MissingOrMultipleRoot));
    }

    #[test]
    fn decode_element_rejects_scalar_root() {
        let err = decode_element(b"<response>OK</response>").unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape));
    }

    #[test]
    fn device_error_takes_precedence() {
        let buf = b"<error><code>100003</code><message>denied</message></error>";
        let err = decode_tree(buf).unwrap_err();
        match err {
            Error::Device { code, message } => {
                assert_eq!(code, "100003");
                assert_eq!(message, "denied");
            }
            other => panic!("expected Device error, got {other:?}"),
        }
    }

    #[test]
    fn device_error_message_falls_back_to_table() {
        let buf = b"<error><code>108002</code></error>";
        let err = decode_tree(buf).unwrap_err();
        match err {
            Error::Device { code, message } => {
                assert_eq!(code, "108002");
                assert_eq!(message, "invalid password");
            }
            other => panic!("expected Device error, got {other:?}"),
        }
    }

    #[test]
    fn device_error_empty_message_falls_back_to_table() {
        let buf = b"<error><code>108002</code><message></message></error>";
        let err = decode_tree(buf).unwrap_err();
        match err {
            Error::Device { code, message } => {
                assert_eq!(code, "108002");
                assert_eq!(message, "invalid password");
            }
            other => panic!("expected Device error, got {other:?}"),
        }
    }

    #[test]
    fn device_error_unknown_code_uses_generic_message() {
        let buf = b"<error><code>424242</code></error>";
        let err = decode_tree(buf).unwrap_err();
        match err {
            Error::Device { message, .. } => assert_eq!(message, "system not available"),
            other => panic!("expected Device error, got {other:?}"),
        }
    }

    #[test]
    fn scalar_error_element_is_invalid_shape() {
        let err = decode_tree(b"<error>broken</error>").unwrap_err();
        assert!(matches!(err, Error::InvalidErrorShape));
    }
}
