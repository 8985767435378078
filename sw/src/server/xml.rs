//! Minimal XML extraction for the server's status documents
//!
//! The server's XML is flat and predictable, so a tag scanner is enough to
//! pull out the camera list without a full parser.

use tracing::{debug, warn};

use crate::events::Camera;

/// Extract the text of the first `<tag>...</tag>` in `xml`
pub fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(unescape(xml[start..start + end].trim()))
}

/// Every `<tag>...</tag>` block body in `xml`, in document order
pub fn extract_xml_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = xml;
    while let Some(pos) = rest.find(&open) {
        let body = &rest[pos + open.len()..];
        let Some(end) = body.find(&close) else {
            break;
        };
        blocks.push(&body[..end]);
        rest = &body[end + close.len()..];
    }
    blocks
}

/// Parse the `<camera>` entries of a `++systemInfo` document
///
/// Entries without a usable `<number>` are skipped.
pub fn parse_cameras(xml: &str) -> Vec<Camera> {
    let blocks = extract_xml_blocks(xml, "camera");
    debug!(blocks = blocks.len(), "parse_cameras: called");

    blocks
        .into_iter()
        .filter_map(|block| {
            let number = extract_xml_value(block, "number")?;
            match number.parse::<u32>() {
                Ok(number) => {
                    let name = extract_xml_value(block, "name").unwrap_or_default();
                    Some(Camera::new(number, name))
                }
                Err(_) => {
                    warn!(%number, "parse_cameras: skipping camera with bad number");
                    None
                }
            }
        })
        .collect()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_INFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<system>
  <server><name>Office Mac</name><version>5.5</version></server>
  <cameralist>
    <camera>
      <number>0</number>
      <connected>yes</connected>
      <name>Front Door</name>
    </camera>
    <camera>
      <number>3</number>
      <name>Garage &amp; Drive</name>
    </camera>
    <camera>
      <number>x</number>
      <name>Broken</name>
    </camera>
  </cameralist>
</system>"#;

    #[test]
    fn test_extract_xml_value() {
        assert_eq!(extract_xml_value(SYSTEM_INFO, "version"), Some("5.5".to_string()));
        assert_eq!(extract_xml_value(SYSTEM_INFO, "missing"), None);
    }

    #[test]
    fn test_extract_xml_blocks() {
        assert_eq!(extract_xml_blocks(SYSTEM_INFO, "camera").len(), 3);
        assert!(extract_xml_blocks("<camera><number>1", "camera").is_empty());
    }

    #[test]
    fn test_parse_cameras() {
        let cameras = parse_cameras(SYSTEM_INFO);
        assert_eq!(
            cameras,
            vec![Camera::new(0, "Front Door"), Camera::new(3, "Garage & Drive")]
        );
    }

    #[test]
    fn test_parse_cameras_empty_document() {
        assert!(parse_cameras("<system></system>").is_empty());
    }
}
