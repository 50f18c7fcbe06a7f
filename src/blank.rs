use lopdf::Document;
use lopdf::content::Content;

use crate::error::{CardpressError, CardpressResult};

/// Whether a content-stream operator paints or shows anything.
///
/// Covers text showing, path painting/shading, XObject invocation, and
/// inline images. Pure state ops (`q`, `cm`, color, `W n`) leave a page
/// blank.
fn op_marks_content(op: &str) -> bool {
    matches!(
        op,
        "Tj" | "TJ"
            | "'"
            | "\""
            | "S"
            | "s"
            | "f"
            | "F"
            | "f*"
            | "B"
            | "B*"
            | "b"
            | "b*"
            | "sh"
            | "Do"
            | "BI"
    )
}

pub fn content_has_marks(content: &Content) -> bool {
    content
        .operations
        .iter()
        .any(|op| op_marks_content(&op.operator))
}

/// A document overlay is blank when it has no pages or its first page
/// paints nothing. Content-stream decode failures propagate; a document we
/// cannot read is not the same as a document with nothing on it.
pub fn document_is_blank(doc: &Document) -> CardpressResult<bool> {
    let Some(page_id) = crate::pdf::first_page_id(doc) else {
        return Ok(true);
    };
    let bytes = doc
        .get_page_content(page_id)
        .map_err(|e| CardpressError::composite(format!("read page content: {e}")))?;
    if bytes.is_empty() {
        return Ok(true);
    }
    let content = Content::decode(&bytes)
        .map_err(|e| CardpressError::composite(format!("decode content stream: {e}")))?;
    Ok(!content_has_marks(&content))
}

pub fn svg_is_blank(tree: &usvg::Tree) -> bool {
    !group_has_content(tree.root())
}

fn group_has_content(group: &usvg::Group) -> bool {
    for child in group.children() {
        match child {
            usvg::Node::Group(g) => {
                if group_has_content(g.as_ref()) {
                    return true;
                }
            }
            usvg::Node::Path(_) | usvg::Node::Image(_) | usvg::Node::Text(_) => return true,
        }
    }
    false
}
