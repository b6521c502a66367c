//! XML text output for trees.

use crate::entities::escape_xml;
use crate::tree::Tree;
use crate::types::{Data, NodeId};

pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Serialize the subtree at `node`.
///
/// Each top-level node is followed by a newline. An invented root is not
/// written itself; its children become the top-level nodes. With
/// `include_header`, every top-level node is preceded by the XML
/// declaration unless the document already carries one.
pub fn as_xml(tree: &Tree, node: NodeId, include_header: bool) -> String {
    let mut out = String::new();
    let tops: Vec<NodeId> = match tree.tag(node) {
        Some(tag) if tag.is_invented() => tree.children(node).to_vec(),
        _ => vec![node],
    };

    let mut after_declaration = false;
    for top in tops {
        let is_declaration = tree
            .data(top)
            .as_comment()
            .is_some_and(|comment| comment.is_xml_declaration());
        if include_header && !is_declaration && !after_declaration {
            out.push_str(XML_HEADER);
        }
        after_declaration = is_declaration;
        write_node(tree, top, &mut out);
        out.push('\n');
    }
    out
}

/// Serialize several independently parsed trees back to back.
pub fn as_xml_all<'a, I>(trees: I, include_header: bool) -> String
where
    I: IntoIterator<Item = &'a Tree>,
{
    trees
        .into_iter()
        .map(|tree| as_xml(tree, tree.root(), include_header))
        .collect()
}

enum Visit {
    Open(NodeId),
    Close(NodeId),
}

/// Append the markup for `node` and its descendants to `out`.
pub fn write_node(tree: &Tree, node: NodeId, out: &mut String) {
    let mut stack = vec![Visit::Open(node)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Open(id) => match tree.data(id) {
                Data::Tag(tag) => {
                    tag.write_open(out);
                    if !tag.is_self_terminating() {
                        stack.push(Visit::Close(id));
                        stack.extend(tree.children(id).iter().rev().map(|&c| Visit::Open(c)));
                    }
                }
                Data::Text(text) => escape_xml(text.text(), out),
                Data::Comment(comment) => {
                    out.push('<');
                    out.push_str(comment.text());
                    out.push('>');
                }
                Data::Script(script) => {
                    out.push_str("<script>");
                    out.push_str(script.text());
                    out.push_str("</script>");
                }
                Data::Style(style) => {
                    out.push_str("<style>");
                    out.push_str(style.text());
                    out.push_str("</style>");
                }
            },
            Visit::Close(id) => {
                if let Some(tag) = tree.tag(id) {
                    out.push_str("</");
                    out.push_str(tag.name());
                    out.push('>');
                }
            }
        }
    }
}
