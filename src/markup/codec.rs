//! Fragment parsing and canonical serialization.
//!
//! Parsing and serialization must round-trip: `parse(serialize(t))`
//! rebuilds `t`, and serializing again yields byte-identical output.
//! The sanitizer's idempotence guarantee rests on this, so the
//! serializer is deliberately canonical: attributes in stored order,
//! `<empty/>` form for childless elements, entities escaped the same
//! way on every pass. Comments, processing instructions and doctypes
//! are dropped during parsing.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write;

use super::{MarkupError, NodeId, NodeKind, Tree, ROOT};

/// Parses `markup` into a fresh tree under [`ROOT`].
pub fn parse_fragment(markup: &str) -> Result<Tree, MarkupError> {
    let mut tree = Tree::new();
    parse_into(&mut tree, ROOT, markup)?;
    Ok(tree)
}

/// Replaces the children of `parent` with the parsed content of
/// `markup`. Staged under a detached container first, so a parse
/// failure leaves `parent` untouched.
pub fn parse_into(tree: &mut Tree, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
    let container = tree.create_element("staging")?;
    match parse_under(tree, container, markup) {
        Ok(()) => {
            tree.clear_children(parent)?;
            for child in tree.children(container)? {
                tree.append_child(parent, child)?;
            }
            tree.remove(container)?;
            Ok(())
        }
        Err(e) => {
            let _ = tree.remove(container);
            Err(e)
        }
    }
}

fn parse_under(tree: &mut Tree, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
    let mut reader = Reader::from_str(markup);
    let mut stack = vec![parent];
    loop {
        let top = stack
            .last()
            .copied()
            .ok_or_else(|| MarkupError::Malformed("unbalanced element stack".to_string()))?;
        match reader
            .read_event()
            .map_err(|e| MarkupError::Malformed(e.to_string()))?
        {
            Event::Start(start) => {
                let id = element_from(tree, &start)?;
                tree.append_child(top, id)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                let id = element_from(tree, &start)?;
                tree.append_child(top, id)?;
            }
            Event::End(_) => {
                if stack.len() == 1 {
                    return Err(MarkupError::Malformed("unexpected closing tag".to_string()));
                }
                stack.pop();
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| MarkupError::Malformed(e.to_string()))?;
                if !text.is_empty() {
                    let id = tree.create_text(&text);
                    tree.append_child(top, id)?;
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                let id = tree.create_text(&text);
                tree.append_child(top, id)?;
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => {
                if stack.len() > 1 {
                    return Err(MarkupError::Malformed("unclosed element".to_string()));
                }
                return Ok(());
            }
        }
    }
}

fn element_from(tree: &mut Tree, start: &BytesStart) -> Result<NodeId, MarkupError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let id = tree.create_element(&name)?;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| MarkupError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| MarkupError::Malformed(e.to_string()))?;
        tree.set_attr(id, &key, &value)?;
    }
    Ok(id)
}

/// Serializes the children of `id` (not `id` itself) to canonical
/// markup text.
pub fn serialize_children(tree: &Tree, id: NodeId) -> Result<String, MarkupError> {
    let mut out = String::new();
    for child in tree.children(id)? {
        write_node(tree, child, &mut out)?;
    }
    Ok(out)
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) -> Result<(), MarkupError> {
    match tree.kind(id)? {
        NodeKind::Text(text) => out.push_str(&escape(text.as_str())),
        NodeKind::Element { name, attrs } => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attrs {
                let _ = write!(out, " {key}=\"{}\"", escape(value.as_str()));
            }
            let children = tree.children(id)?;
            if children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in children {
                    write_node(tree, child, out)?;
                }
                let _ = write!(out, "</{name}>");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(markup: &str) -> String {
        let tree = parse_fragment(markup).unwrap();
        serialize_children(&tree, ROOT).unwrap()
    }

    #[test]
    fn test_parse_simple_fragment() {
        let tree = parse_fragment("<div class=\"a\"><p>hi</p></div>").unwrap();
        let div = tree.query(ROOT, "div").unwrap().unwrap();
        let p = tree.query(div, "p").unwrap().unwrap();
        assert_eq!(tree.children(p).unwrap().len(), 1);
    }

    #[test]
    fn test_serialize_is_canonical() {
        assert_eq!(roundtrip("<div><p>hi</p></div>"), "<div><p>hi</p></div>");
        // Childless elements collapse to the empty form
        assert_eq!(roundtrip("<br></br>"), "<br/>");
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let once = roundtrip("<div id=\"x\">a &amp; b<br/></div>");
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_text_escaping_roundtrip() {
        let once = roundtrip("<p>1 &lt; 2 &amp; 3 &gt; 2</p>");
        assert_eq!(once, roundtrip(&once));
        assert!(once.contains("&lt;"));
    }

    #[test]
    fn test_whitespace_preserved() {
        assert_eq!(
            roundtrip("<div>\n  <p>hi</p>\n</div>"),
            "<div>\n  <p>hi</p>\n</div>"
        );
    }

    #[test]
    fn test_comments_dropped() {
        assert_eq!(roundtrip("<div><!-- note --><p>hi</p></div>"), "<div><p>hi</p></div>");
    }

    #[test]
    fn test_malformed_is_an_error() {
        assert!(parse_fragment("<div><p></div>").is_err());
        assert!(parse_fragment("<div>").is_err());
        assert!(parse_fragment("</div>").is_err());
    }

    #[test]
    fn test_parse_into_failure_leaves_target_untouched() {
        let mut tree = Tree::new();
        parse_into(&mut tree, ROOT, "<p>keep</p>").unwrap();
        assert!(parse_into(&mut tree, ROOT, "<div>").is_err());
        assert_eq!(serialize_children(&tree, ROOT).unwrap(), "<p>keep</p>");
    }

    #[test]
    fn test_attribute_order_preserved() {
        assert_eq!(
            roundtrip("<img src=\"a.png\" alt=\"a\"/>"),
            "<img src=\"a.png\" alt=\"a\"/>"
        );
    }
}
