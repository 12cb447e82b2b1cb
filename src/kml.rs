use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::TripToolsError;
use crate::tree::resolve_reference;

type Result<T> = std::result::Result<T, TripToolsError>;

/// One KML placemark with the pieces the distance report needs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Placemark {
    pub name: Option<String>,
    pub description: Option<String>,
    /// (latitude, longitude) of the placemark's Point, when it has one.
    pub coordinates: Option<(f64, f64)>,
}

/// Read every placemark from a KML trip log, in document order.
pub fn read_placemarks(path: &Path) -> Result<Vec<Placemark>> {
    let xml = fs::read_to_string(path).map_err(|e| TripToolsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_placemarks(&xml).map_err(|e| TripToolsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn parse_placemarks(xml: &str) -> std::result::Result<Vec<Placemark>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut placemarks = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"Placemark" {
                    placemarks.push(parse_placemark(&mut reader)?);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(placemarks)
}

/// Parse one <Placemark> and its children.
/// Called after receiving Event::Start for the placemark.
fn parse_placemark(
    reader: &mut Reader<&[u8]>,
) -> std::result::Result<Placemark, quick_xml::Error> {
    let mut placemark = Placemark::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => placemark.name = Some(read_text_owned(reader, &e)?),
                b"description" => placemark.description = Some(read_text_owned(reader, &e)?),
                b"Point" => placemark.coordinates = parse_point(reader)?,
                _ => {
                    // Skip other geometry, styles and extended data
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Placemark" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(placemark)
}

/// Parse a <Point>, returning the (lat, lon) of its coordinates child.
fn parse_point(
    reader: &mut Reader<&[u8]>,
) -> std::result::Result<Option<(f64, f64)>, quick_xml::Error> {
    let mut coordinates = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"coordinates" {
                    let text = read_text_owned(reader, &e)?;
                    coordinates = parse_coordinates(&text);
                } else {
                    reader.read_to_end(e.name())?;
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Point" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(coordinates)
}

/// First coordinate tuple of a KML coordinates string. KML stores
/// lon,lat[,alt]; points with unparseable numbers are skipped.
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let first = text.split_whitespace().next()?;
    let mut parts = first.split(',');
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    Some((lat, lon))
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections and entity references.
fn read_text_owned<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'_>,
) -> std::result::Result<String, quick_xml::Error> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => {
                let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                if let Some(ch) = resolve_reference(name) {
                    text.push(ch);
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placemark_with_point() {
        let xml = r#"<?xml version="1.0"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Auckland</name>
      <description><![CDATA[2016-11-11 20:13:39 +1300]]></description>
      <Point>
        <coordinates>174.76,-36.84,0</coordinates>
      </Point>
    </Placemark>
  </Document>
</kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        assert_eq!(placemarks.len(), 1);
        let pm = &placemarks[0];
        assert_eq!(pm.name.as_deref(), Some("Auckland"));
        assert_eq!(pm.description.as_deref(), Some("2016-11-11 20:13:39 +1300"));
        let (lat, lon) = pm.coordinates.unwrap();
        assert!((lat - -36.84).abs() < 1e-10);
        assert!((lon - 174.76).abs() < 1e-10);
    }

    #[test]
    fn test_placemark_without_point() {
        let xml = r#"<kml><Placemark><name>No geometry</name></Placemark></kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        assert_eq!(placemarks[0].name.as_deref(), Some("No geometry"));
        assert_eq!(placemarks[0].coordinates, None);
    }

    #[test]
    fn test_line_string_geometry_skipped() {
        let xml = r#"<kml>
  <Placemark>
    <name>Route</name>
    <LineString>
      <coordinates>174.76,-36.84 175.0,-37.0</coordinates>
    </LineString>
  </Placemark>
</kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        assert_eq!(placemarks[0].name.as_deref(), Some("Route"));
        assert_eq!(placemarks[0].coordinates, None);
    }

    #[test]
    fn test_placemarks_in_nested_folders() {
        let xml = r#"<kml>
  <Document>
    <Folder>
      <Placemark><name>A</name></Placemark>
      <Folder>
        <Placemark><name>B</name></Placemark>
      </Folder>
    </Folder>
  </Document>
</kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        let names: Vec<_> = placemarks.iter().map(|p| p.name.as_deref()).collect();
        assert_eq!(names, [Some("A"), Some("B")]);
    }

    #[test]
    fn test_unparseable_coordinates_skipped() {
        let xml = r#"<kml><Placemark><Point><coordinates>north,west</coordinates></Point></Placemark></kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        assert_eq!(placemarks[0].coordinates, None);
    }

    #[test]
    fn test_parse_coordinates_forms() {
        assert_eq!(parse_coordinates("174.76,-36.84,0"), Some((-36.84, 174.76)));
        assert_eq!(parse_coordinates("174.76,-36.84"), Some((-36.84, 174.76)));
        assert_eq!(
            parse_coordinates("  174.76,-36.84 175.0,-37.0 "),
            Some((-36.84, 174.76))
        );
        assert_eq!(parse_coordinates("174.76"), None);
        assert_eq!(parse_coordinates(""), None);
    }

    #[test]
    fn test_entities_in_name() {
        let xml = r#"<kml><Placemark><name>Fish &amp; Chips</name></Placemark></kml>"#;
        let placemarks = parse_placemarks(xml).unwrap();
        assert_eq!(placemarks[0].name.as_deref(), Some("Fish & Chips"));
    }
}
