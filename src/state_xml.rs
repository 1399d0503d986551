//! Detection and extraction of the XML chunk carried by many VST3 state blobs.
//!
//! Two layouts are recognised:
//!
//! * the binary-XML envelope: `VC2!`, a little-endian `u32` payload length,
//!   then NUL-terminated UTF-8 XML;
//! * an XML document embedded anywhere in the blob, from `<?xml` to the
//!   closing tag of its root element.

use base64::{engine::general_purpose, Engine as _};

const BINARY_XML_MAGIC: &[u8; 4] = b"VC2!";
const XML_DECL: &[u8] = b"<?xml";

/// `VST3PluginState` document holding the component state and, when there
/// is one, the controller state, both base64-encoded.
pub fn plugin_state_xml(component: &[u8], controller: Option<&[u8]>) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\n<VST3PluginState>");
    xml.push_str("<IComponent>");
    xml.push_str(&general_purpose::STANDARD.encode(component));
    xml.push_str("</IComponent>");
    if let Some(controller) = controller.filter(|c| !c.is_empty()) {
        xml.push_str("<IEditController>");
        xml.push_str(&general_purpose::STANDARD.encode(controller));
        xml.push_str("</IEditController>");
    }
    xml.push_str("</VST3PluginState>");
    xml
}

/// Wraps `xml` in the binary-XML envelope that [`extract_vst3_xml`] reads.
pub fn wrap_vst3_xml(xml: &str) -> Vec<u8> {
    let payload_len = xml.len() + 1;
    let mut out = Vec::with_capacity(8 + payload_len);
    out.extend_from_slice(BINARY_XML_MAGIC);
    out.extend_from_slice(&(payload_len as u32).to_le_bytes());
    out.extend_from_slice(xml.as_bytes());
    out.push(0);
    out
}

pub fn is_vst3_xml(state: &[u8]) -> bool {
    extract_vst3_xml(state).is_some()
}

pub fn extract_vst3_xml(state: &[u8]) -> Option<String> {
    envelope_xml(state).or_else(|| embedded_xml(state))
}

fn envelope_xml(state: &[u8]) -> Option<String> {
    let header = state.get(..8)?;
    if &header[..4] != BINARY_XML_MAGIC {
        return None;
    }

    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let payload = state.get(8..8usize.checked_add(len)?)?;
    let end = payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = std::str::from_utf8(&payload[..end]).ok()?;

    text.trim_start().starts_with('<').then(|| text.to_string())
}

fn embedded_xml(state: &[u8]) -> Option<String> {
    let start = find(state, XML_DECL)?;
    let tail = &state[start..];
    // Whatever follows the chunk may be binary; the chunk itself must be UTF-8.
    let text = match std::str::from_utf8(tail) {
        Ok(text) => text,
        Err(e) => std::str::from_utf8(&tail[..e.valid_up_to()]).ok()?,
    };

    let (root, root_tag) = root_element(text)?;
    let root_start = text.len() - root_tag.len();
    let tag_len = root_tag.find('>')? + 1;
    let end = if root_tag[..tag_len].ends_with("/>") {
        root_start + tag_len
    } else {
        let close = format!("</{root}>");
        root_start + root_tag.find(&close)? + close.len()
    };
    Some(text[..end].to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Name of the first element after the prolog (declaration, comments,
/// doctype), together with the text starting at that element.
fn root_element(text: &str) -> Option<(&str, &str)> {
    let mut rest = text;
    loop {
        let open = rest.find('<')?;
        rest = &rest[open..];
        if rest.starts_with("<?") || rest.starts_with("<!") {
            let close = rest.find('>')?;
            rest = &rest[close + 1..];
            continue;
        }

        let name_end = rest[1..]
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .map(|i| i + 1)?;
        let name = &rest[1..name_end];
        return (!name.is_empty()).then_some((name, rest));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_binary_xml_envelope() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><VST3PluginState><IComponent/></VST3PluginState>"#;
        let blob = wrap_vst3_xml(xml);

        assert!(is_vst3_xml(&blob));
        assert_eq!(extract_vst3_xml(&blob).as_deref(), Some(xml));
    }

    #[test]
    fn envelope_with_truncated_payload_is_rejected() {
        let mut blob = wrap_vst3_xml("<Root/>");
        blob.truncate(blob.len() - 3);
        assert!(!is_vst3_xml(&blob));
    }

    #[test]
    fn finds_xml_embedded_after_binary_header() {
        let mut blob = vec![0x01, 0x00, 0xff, 0x7f, 0x12];
        let xml = "<?xml version=\"1.0\"?>\n<!-- preset -->\n<Preset name=\"Init\"><Osc a=\"1\"/></Preset>";
        blob.extend_from_slice(xml.as_bytes());
        blob.extend_from_slice(&[0, 0, 0]);

        assert_eq!(extract_vst3_xml(&blob).as_deref(), Some(xml));
    }

    #[test]
    fn chunk_ends_at_root_close_despite_binary_trailer() {
        let xml = r#"<?xml version="1.0"?><Preset name="Init"><Osc a="1"/></Preset>"#;
        let mut blob = vec![0x01, 0x00, 0x00, 0x00];
        blob.extend_from_slice(xml.as_bytes());
        blob.extend_from_slice(&[0x00, 0x10, 0x3e, 0x00]);
        assert_eq!(extract_vst3_xml(&blob).as_deref(), Some(xml));

        let mut blob = xml.as_bytes().to_vec();
        blob.extend_from_slice(&[0xff, 0xfe, b'>']);
        assert_eq!(extract_vst3_xml(&blob).as_deref(), Some(xml));
    }

    #[test]
    fn self_closing_root_followed_by_another_chunk() {
        let xml = r#"<?xml version="1.0"?><Preset/>"#;
        let blob = [xml.as_bytes(), &b"\0CTRL<x>"[..]].concat();
        assert_eq!(extract_vst3_xml(&blob).as_deref(), Some(xml));
    }

    #[test]
    fn plugin_state_round_trips_through_the_envelope() {
        let xml = plugin_state_xml(&[0, 1, 2, 0xff], Some(b"ctrl"));
        assert!(xml.contains("<IComponent>AAEC/w==</IComponent>"));
        assert!(xml.contains("<IEditController>Y3RybA==</IEditController>"));

        let blob = wrap_vst3_xml(&xml);
        assert!(blob.starts_with(b"VC2!"));
        assert_eq!(extract_vst3_xml(&blob), Some(xml));
    }

    #[test]
    fn empty_controller_state_is_left_out() {
        let xml = plugin_state_xml(b"abc", Some(&[]));
        assert!(!xml.contains("IEditController"));
        assert_eq!(plugin_state_xml(b"abc", None), xml);
    }

    #[test]
    fn unclosed_root_is_not_xml() {
        let blob = b"junk<?xml version=\"1.0\"?><Preset><Osc/>";
        assert!(!is_vst3_xml(blob));
    }

    #[test]
    fn plain_binary_is_not_xml() {
        assert!(!is_vst3_xml(&[]));
        assert!(!is_vst3_xml(b"VC2!"));
        assert!(!is_vst3_xml(&[0xde, 0xad, 0xbe, 0xef, 0x3e, 0x3c]));
    }
}
