use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesPI, BytesRef, BytesStart, BytesText, Event};

/// One attribute as written in the source: name with any prefix intact,
/// value still in its escaped form.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    /// Raw text run, escaped exactly as in the source.
    Text(String),
    CData(String),
    Comment(String),
    /// Entity or character reference name, without the `&` and `;`.
    GeneralRef(String),
    ProcessingInstruction(String),
}

/// An XML element whose name, attribute order and children are kept
/// exactly as written, so untouched sub-trees serialize back byte-stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Tag name with any namespace prefix stripped.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix of the tag name, if it has one.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Value of the attribute with this exact (as-written) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Direct child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child element with this local name.
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|el| el.local_name() == local_name)
    }

    /// Text content of the element's direct children: text runs and CDATA
    /// concatenated, character and entity references resolved.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(raw) => text.push_str(raw),
                XmlNode::CData(s) => text.push_str(s),
                XmlNode::GeneralRef(name) => {
                    if let Some(ch) = resolve_reference(name) {
                        text.push(ch);
                    }
                }
                _ => {}
            }
        }
        text
    }

    /// Serialize this element and everything below it.
    pub fn write_into<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for attr in &self.attributes {
            // Byte-tuple form keeps the stored value verbatim instead of
            // escaping it a second time.
            start.push_attribute((attr.name.as_bytes(), attr.value.as_bytes()));
        }
        if self.self_closing && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                XmlNode::Element(el) => el.write_into(writer)?,
                XmlNode::Text(raw) => {
                    writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?;
                }
                XmlNode::CData(s) => {
                    writer.write_event(Event::CData(BytesCData::new(s.as_str())))?;
                }
                XmlNode::Comment(s) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped(s.as_str())))?;
                }
                XmlNode::GeneralRef(name) => {
                    writer.write_event(Event::GeneralRef(BytesRef::new(name.as_str())))?;
                }
                XmlNode::ProcessingInstruction(s) => {
                    writer.write_event(Event::PI(BytesPI::new(s.as_str())))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Resolve a reference name (`amp`, `#233`, `#xE9`) to its character.
pub(crate) fn resolve_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}
