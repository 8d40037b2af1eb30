//! Construction and parsing of the XMP packet the codec embeds.
//!
//! The packet is a fixed-shape RDF document with one rdf:Description
//! block per namespace family, which keeps finicky readers happy. The
//! parser is the codec's own read path, used for round-trip
//! verification; it only understands packets of this shape.

use super::MetadataFields;

const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const XMP_NS: &str = "http://ns.adobe.com/xap/1.0/";

/// Build the XMP packet for a field set; empty fields are omitted
pub fn build_packet(fields: &MetadataFields) -> String {
    let mut dc = String::new();

    if let Some(title) = &fields.title {
        dc.push_str(&alt_property("dc:title", title));
    }
    if let Some(description) = &fields.description {
        dc.push_str(&alt_property("dc:description", description));
    }
    if !fields.tags.is_empty() {
        dc.push_str("   <dc:subject><rdf:Bag>");
        for tag in &fields.tags {
            dc.push_str(&format!("<rdf:li>{}</rdf:li>", escape(tag)));
        }
        dc.push_str("</rdf:Bag></dc:subject>\n");
    }
    if let Some(author) = &fields.author {
        dc.push_str(&format!(
            "   <dc:creator><rdf:Seq><rdf:li>{}</rdf:li></rdf:Seq></dc:creator>\n",
            escape(author)
        ));
    }
    if let Some(copyright) = &fields.copyright {
        dc.push_str(&alt_property("dc:rights", copyright));
    }

    let mut blocks = String::new();
    if !dc.is_empty() {
        blocks.push_str(&format!(
            "  <rdf:Description rdf:about=\"\" xmlns:dc=\"{}\">\n{}  </rdf:Description>\n",
            DC_NS, dc
        ));
    }
    if let Some(date) = &fields.date {
        blocks.push_str(&format!(
            "  <rdf:Description rdf:about=\"\" xmlns:xmp=\"{}\">\n   <xmp:CreateDate>{}</xmp:CreateDate>\n  </rdf:Description>\n",
            XMP_NS,
            escape(date)
        ));
    }

    format!(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
         \u{20}<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
         {}\
         \u{20}</rdf:RDF>\n\
         </x:xmpmeta>\n\
         <?xpacket end=\"w\"?>",
        blocks
    )
}

/// Recover the field set from a packet produced by `build_packet`
pub fn parse_packet(packet: &str) -> MetadataFields {
    MetadataFields {
        title: alt_value(packet, "dc:title"),
        description: alt_value(packet, "dc:description"),
        tags: list_values(packet, "dc:subject"),
        author: element_inner(packet, "dc:creator")
            .and_then(|inner| list_items(inner).into_iter().next()),
        copyright: alt_value(packet, "dc:rights"),
        date: element_inner(packet, "xmp:CreateDate").map(|s| unescape(s.trim())),
    }
}

fn alt_property(tag: &str, value: &str) -> String {
    format!(
        "   <{tag}><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></{tag}>\n",
        escape(value),
        tag = tag
    )
}

fn alt_value(packet: &str, tag: &str) -> Option<String> {
    element_inner(packet, tag).and_then(|inner| list_items(inner).into_iter().next())
}

fn list_values(packet: &str, tag: &str) -> Vec<String> {
    element_inner(packet, tag)
        .map(list_items)
        .unwrap_or_default()
}

/// Text between `<tag ...>` and `</tag>`, if present
fn element_inner<'a>(doc: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start = doc.find(&open)?;
    let body_start = start + doc[start..].find('>')? + 1;
    let body_end = body_start + doc[body_start..].find(&close)?;
    Some(&doc[body_start..body_end])
}

/// All `<rdf:li>` item texts inside an element body
fn list_items(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut rest = inner;
    while let Some(start) = rest.find("<rdf:li") {
        let Some(body_offset) = rest[start..].find('>') else {
            break;
        };
        let body_start = start + body_offset + 1;
        let Some(len) = rest[body_start..].find("</rdf:li>") else {
            break;
        };
        items.push(unescape(&rest[body_start..body_start + len]));
        rest = &rest[body_start + len + "</rdf:li>".len()..];
    }
    items
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> MetadataFields {
        MetadataFields {
            title: Some("A dog running".to_string()),
            description: Some("Subject: dog\n\nA dog running in a park".to_string()),
            tags: vec!["dog".to_string(), "park".to_string()],
            author: Some("Jane Doe".to_string()),
            copyright: Some("© Jane Doe".to_string()),
            date: Some("2024-06-01".to_string()),
        }
    }

    #[test]
    fn test_packet_round_trips_every_field() {
        let fields = full_fields();
        let parsed = parse_packet(&build_packet(&fields));
        assert_eq!(parsed, fields);
    }

    #[test]
    fn test_packet_escapes_markup_in_values() {
        let fields = MetadataFields {
            title: Some("Salt & Pepper <mix>".to_string()),
            ..Default::default()
        };
        let packet = build_packet(&fields);
        assert!(!packet.contains("<mix>"));
        assert_eq!(parse_packet(&packet).title.as_deref(), Some("Salt & Pepper <mix>"));
    }

    #[test]
    fn test_absent_fields_are_omitted_from_the_packet() {
        let fields = MetadataFields {
            tags: vec!["one".to_string()],
            ..Default::default()
        };
        let packet = build_packet(&fields);
        assert!(!packet.contains("dc:title"));
        assert!(!packet.contains("dc:creator"));
        assert!(!packet.contains("xmp:CreateDate"));

        let parsed = parse_packet(&packet);
        assert_eq!(parsed.tags, vec!["one"]);
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_namespace_blocks_are_separated() {
        let packet = build_packet(&full_fields());
        assert_eq!(packet.matches("<rdf:Description").count(), 2);
    }
}
