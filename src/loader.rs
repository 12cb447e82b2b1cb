use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::TripToolsError;
use crate::tree::{Attribute, Element, XmlNode};

type Result<T> = std::result::Result<T, TripToolsError>;

/// Namespace of the GPX 1.1 dialect the tools work on.
pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// Prefix bound to [`GPX_NAMESPACE`] for repaired attributes.
const NS_PREFIX: &str = "gpx";

/// Elements whose attributes Backcountry Navigator leaves unqualified.
const FIXUP_ELEMENTS: [&str; 3] = ["gpx", "wpt", "trkpt"];

/// A loaded GPX document plus where it came from and where its split
/// products belong.
#[derive(Debug)]
pub struct GpxDocument {
    pub root: Element,
    pub namespace: &'static str,
    pub source_path: PathBuf,
    pub target_dir: PathBuf,
}

/// Read and parse a GPX file, repairing unqualified attributes on the way
/// in and capturing the document root. The target directory for split
/// output is the parent of the absolute source path.
pub fn load_document(path: &Path) -> Result<GpxDocument> {
    let xml = fs::read_to_string(path).map_err(|e| TripToolsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let root = parse_root(&xml)
        .map_err(|e| TripToolsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?
        .ok_or_else(|| TripToolsError::MissingRoot {
            path: path.to_path_buf(),
        })?;

    let source_path = std::path::absolute(path).map_err(|e| TripToolsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let target_dir = source_path
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf();

    debug!(
        "loaded <{}> root from {}",
        root.name,
        source_path.display()
    );

    Ok(GpxDocument {
        root,
        namespace: GPX_NAMESPACE,
        source_path,
        target_dir,
    })
}

/// One pass over the event stream, building the element tree. Each element
/// is inspected exactly once, when its end tag (or self-closing tag) is
/// reached. Returns None when no namespace-qualified <gpx> element closes
/// at the top level, which also covers documents truncated between tags.
fn parse_root(xml: &str) -> std::result::Result<Option<Element>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let mut element = element_from_start(&e)?;
                element.self_closing = true;
                close_element(element, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    close_element(element, &mut stack, &mut root);
                }
            }
            Ok(Event::Text(e)) => {
                append_node(&mut stack, XmlNode::Text(raw_str(e.as_ref())));
            }
            Ok(Event::CData(e)) => {
                append_node(&mut stack, XmlNode::CData(raw_str(e.as_ref())));
            }
            Ok(Event::Comment(e)) => {
                append_node(&mut stack, XmlNode::Comment(raw_str(e.as_ref())));
            }
            Ok(Event::GeneralRef(e)) => {
                append_node(&mut stack, XmlNode::GeneralRef(raw_str(e.as_ref())));
            }
            Ok(Event::PI(e)) => {
                append_node(
                    &mut stack,
                    XmlNode::ProcessingInstruction(raw_str(e.as_ref())),
                );
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(root)
}

fn element_from_start(start: &BytesStart<'_>) -> std::result::Result<Element, quick_xml::Error> {
    let mut element = Element::new(raw_str(start.name().as_ref()));
    for attr_result in start.attributes() {
        let attr = attr_result?;
        element.attributes.push(Attribute {
            name: raw_str(attr.key.as_ref()),
            value: raw_str(&attr.value),
        });
    }
    Ok(element)
}

/// Finish an element once its end tag is reached: repair its attributes if
/// it is on the fixup list, then hand it to its parent, or make it the
/// root candidate when it closes at the top level.
fn close_element(mut element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    qualify_attributes(&mut element);
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => {
            if element.local_name() == "gpx" && declares_gpx_namespace(&element) {
                ensure_prefix_declaration(&mut element);
                *root = Some(element);
            }
        }
    }
}

/// Re-key unqualified data attributes on fixup-list elements so every
/// attribute carries a namespace prefix. Namespace declarations (xmlns,
/// xmlns:*) and attribute order stay as they are.
fn qualify_attributes(element: &mut Element) {
    if !FIXUP_ELEMENTS.contains(&element.local_name()) {
        return;
    }
    for attr in &mut element.attributes {
        if !attr.name.contains(':') && attr.name != "xmlns" {
            attr.name = format!("{NS_PREFIX}:{}", attr.name);
        }
    }
}

/// Whether the element's own declarations bind its tag name to the GPX 1.1
/// namespace: default xmlns for an unprefixed tag, xmlns:<p> for a
/// prefixed one.
fn declares_gpx_namespace(element: &Element) -> bool {
    match element.prefix() {
        Some(prefix) => element.attribute(&format!("xmlns:{prefix}")) == Some(GPX_NAMESPACE),
        None => element.attribute("xmlns") == Some(GPX_NAMESPACE),
    }
}

/// Make sure the repair prefix is declared on the root, so copied
/// attribute sets carry the binding into every output file.
fn ensure_prefix_declaration(root: &mut Element) {
    let declaration = format!("xmlns:{NS_PREFIX}");
    if root.attribute(&declaration).is_none() {
        root.attributes.push(Attribute {
            name: declaration,
            value: GPX_NAMESPACE.to_string(),
        });
    }
}

fn append_node(stack: &mut [Element], node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn raw_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Element {
        parse_root(xml).unwrap().unwrap()
    }

    #[test]
    fn test_root_attributes_qualified_and_prefix_declared() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1" creator="BCNAV">
</gpx>"#;
        let root = parse(xml);
        let names: Vec<&str> = root.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["xmlns", "gpx:version", "gpx:creator", "xmlns:gpx"]);
        assert_eq!(root.attribute("gpx:version"), Some("1.1"));
        assert_eq!(root.attribute("xmlns:gpx"), Some(GPX_NAMESPACE));
    }

    #[test]
    fn test_waypoint_and_trackpoint_attributes_qualified() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <wpt lat="1.0" lon="2.0"/>
  <trk>
    <trkseg>
      <trkpt lat="3.0" lon="4.0"><ele>5</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let root = parse(xml);
        let wpt = root.find_child("wpt").unwrap();
        assert_eq!(wpt.attribute("gpx:lat"), Some("1.0"));
        assert_eq!(wpt.attribute("lat"), None);
        assert!(wpt.self_closing);

        let trkpt = root
            .find_child("trk")
            .unwrap()
            .find_child("trkseg")
            .unwrap()
            .find_child("trkpt")
            .unwrap();
        assert_eq!(trkpt.attribute("gpx:lat"), Some("3.0"));
        assert_eq!(trkpt.attribute("gpx:lon"), Some("4.0"));
    }

    #[test]
    fn test_other_elements_left_unqualified() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <trk>
    <link href="http://example.com/a"/>
    <trkseg/>
  </trk>
</gpx>"#;
        let root = parse(xml);
        let link = root.find_child("trk").unwrap().find_child("link").unwrap();
        assert_eq!(link.attribute("href"), Some("http://example.com/a"));
        assert_eq!(link.attribute("gpx:href"), None);
    }

    #[test]
    fn test_already_qualified_attributes_kept() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" gpx:version="1.1" creator="x"></gpx>"#;
        let root = parse(xml);
        assert_eq!(root.attribute("gpx:version"), Some("1.1"));
        assert_eq!(root.attribute("gpx:creator"), Some("x"));
    }

    #[test]
    fn test_existing_prefix_declaration_not_duplicated() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:gpx="http://www.topografix.com/GPX/1/1" version="1.1"></gpx>"#;
        let root = parse(xml);
        let count = root
            .attributes
            .iter()
            .filter(|a| a.name == "xmlns:gpx")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_prefixed_root_accepted() {
        let xml = r#"<g:gpx xmlns:g="http://www.topografix.com/GPX/1/1" version="1.1"></g:gpx>"#;
        let root = parse(xml);
        assert_eq!(root.name, "g:gpx");
        assert_eq!(root.attribute("gpx:version"), Some("1.1"));
    }

    #[test]
    fn test_root_without_namespace_rejected() {
        let xml = r#"<gpx version="1.1"><trk/></gpx>"#;
        assert!(parse_root(xml).unwrap().is_none());
    }

    #[test]
    fn test_wrong_namespace_rejected() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0"></gpx>"#;
        assert!(parse_root(xml).unwrap().is_none());
    }

    #[test]
    fn test_non_gpx_root_rejected() {
        let xml = r#"<kml xmlns="http://www.opengis.net/kml/2.2"></kml>"#;
        assert!(parse_root(xml).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_end_tag_is_parse_error() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk></gpx>"#;
        assert!(parse_root(xml).is_err());
    }

    #[test]
    fn test_truncated_document_has_no_usable_root() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk>"#;
        assert!(matches!(parse_root(xml), Ok(None) | Err(_)));
    }

    #[test]
    fn test_vendor_content_preserved() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:topografix="http://www.topografix.com/GPX/Private/TopoGrafix/0/1" version="1.1">
  <extensions><topografix:active_point lat="1" lon="2"/></extensions>
</gpx>"#;
        let root = parse(xml);
        let vendor = root
            .find_child("extensions")
            .unwrap()
            .find_child("active_point")
            .unwrap();
        assert_eq!(vendor.name, "topografix:active_point");
        // Not on the fixup list, so its attributes stay as written.
        assert_eq!(vendor.attribute("lat"), Some("1"));
    }

    #[test]
    fn test_text_and_references_kept_as_nodes() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><name>Fish &amp; Chips</name></trk></gpx>"#;
        let root = parse(xml);
        let name = root.find_child("trk").unwrap().find_child("name").unwrap();
        assert_eq!(name.text_content(), "Fish & Chips");
        assert!(
            name.children
                .iter()
                .any(|n| matches!(n, XmlNode::GeneralRef(r) if r == "amp"))
        );
    }
}
