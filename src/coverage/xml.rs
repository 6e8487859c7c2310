//! Attribute helpers shared by the XML parsers

use quick_xml::events::BytesStart;

/// Read an attribute as a string, if present.
pub(crate) fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).to_string(),
        })
}

/// Read a non-negative integer attribute. Unparseable values count as absent.
pub(crate) fn attr_u64(e: &BytesStart, name: &[u8]) -> Option<u64> {
    attr(e, name).and_then(|value| value.trim().parse::<u64>().ok())
}

pub(crate) fn attr_f64(e: &BytesStart, name: &[u8]) -> Option<f64> {
    attr(e, name).and_then(|value| value.trim().parse::<f64>().ok())
}
