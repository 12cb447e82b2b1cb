use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, Event};
use tracing::info;

use crate::error::TripToolsError;
use crate::loader::GpxDocument;
use crate::tree::{Element, XmlNode};

type Result<T> = std::result::Result<T, TripToolsError>;

/// Placeholder text Backcountry Navigator writes for absent metadata.
const ABSENT_PLACEHOLDER: &str = "None";

/// Naming metadata read from a track's direct children.
#[derive(Debug, Default, PartialEq)]
struct TrackMeta {
    number: Option<u32>,
    name: Option<String>,
    description: Option<String>,
}

/// Split a loaded document into one standalone GPX file per track, written
/// into the document's target directory. Returns the paths written, in
/// track order. Name collisions overwrite silently; a write failure stops
/// the remaining tracks of this document and keeps what was already
/// written.
pub fn split_document(document: GpxDocument) -> Result<Vec<PathBuf>> {
    let GpxDocument {
        mut root,
        target_dir,
        ..
    } = document;

    let mut tracks = Vec::new();
    detach_tracks(&mut root, &mut tracks);

    let mut written = Vec::with_capacity(tracks.len());
    for (position, track) in tracks.into_iter().enumerate() {
        let meta = track_meta(&track);
        let path = target_dir.join(file_name(&meta, position));
        info!("creating track file {}", path.display());
        write_track_file(&path, &root, track)?;
        written.push(path);
    }
    Ok(written)
}

/// Depth-first walk that detaches every <trk> element in document order,
/// keeping everything else (and its order) in place.
fn detach_tracks(element: &mut Element, tracks: &mut Vec<Element>) {
    let children = std::mem::take(&mut element.children);
    for node in children {
        match node {
            XmlNode::Element(child) if child.local_name() == "trk" => tracks.push(child),
            XmlNode::Element(mut child) => {
                detach_tracks(&mut child, tracks);
                element.children.push(XmlNode::Element(child));
            }
            other => element.children.push(other),
        }
    }
}

/// Read number/name/description from a track's direct children. A field
/// is absent when the element is missing, its trimmed text is empty, or
/// the text is the literal placeholder `None`. Present values are the
/// trimmed text, keeping source padding out of derived file names.
fn track_meta(track: &Element) -> TrackMeta {
    TrackMeta {
        number: child_text(track, "number").and_then(|t| t.parse::<u32>().ok()),
        name: child_text(track, "name"),
        description: child_text(track, "desc"),
    }
}

fn child_text(element: &Element, local_name: &str) -> Option<String> {
    let text = element.find_child(local_name)?.text_content();
    let text = text.trim();
    if text.is_empty() || text == ABSENT_PLACEHOLDER {
        return None;
    }
    Some(text.to_string())
}

/// Derive the output file name: `<name>.gpx`, with `-<description>`
/// appended when a description is present. Unnamed tracks fall back to
/// `track-<number>`, or their 1-based position when the number is also
/// absent.
fn file_name(meta: &TrackMeta, position: usize) -> String {
    let stem = match (&meta.name, meta.number) {
        (Some(name), _) => name.clone(),
        (None, Some(number)) => format!("track-{number}"),
        (None, None) => format!("track-{}", position + 1),
    };
    match &meta.description {
        Some(desc) => format!("{stem}-{desc}.gpx"),
        None => format!("{stem}.gpx"),
    }
}

/// Write one track as a standalone document: fresh root with the original
/// root's tag and full attribute set, the track as its only child.
fn write_track_file(path: &Path, source_root: &Element, track: Element) -> Result<()> {
    let mut standalone = Element::new(source_root.name.clone());
    standalone.attributes = source_root.attributes.clone();
    standalone.children.push(XmlNode::Element(track));

    let bytes = render_document(&standalone).map_err(|e| TripToolsError::Write {
        path: path.to_path_buf(),
        source: io::Error::other(e),
    })?;
    fs::write(path, bytes).map_err(|e| TripToolsError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn render_document(root: &Element) -> std::result::Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    root.write_into(&mut writer)?;
    Ok(writer.into_inner())
}
