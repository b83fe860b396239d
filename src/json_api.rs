use crate::{
    boxes::{AtomBox, BoxId},
    known_boxes::KnownBox,
    schema::Payload,
    tree::ParseResult,
};
use serde::Serialize;

/// Hard ceiling on the rendered depth, whatever the caller asks for.
pub const MAX_JSON_DEPTH: usize = 512;

/// A JSON-serializable view of a single atom and its subtree.
///
/// Used by `atomdump --json`; borrows payloads from the [`ParseResult`].
#[derive(Debug, Serialize)]
pub struct JsonAtom<'a> {
    #[serde(rename = "type")]
    pub typ: String,
    pub name: &'static str,
    pub offset: u64,
    pub size: u32,
    pub header_size: u32,
    pub content_len: u32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<&'a Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JsonAtom<'a>>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

fn kind_of(b: &AtomBox, known: KnownBox) -> &'static str {
    if !b.children.is_empty() || known.is_container() {
        "container"
    } else if b.payload.is_some() {
        "leaf"
    } else {
        "unknown"
    }
}

fn build<'a>(
    tree: &'a ParseResult,
    b: &'a AtomBox,
    depth: usize,
    max_depth: usize,
) -> JsonAtom<'a> {
    let known = KnownBox::from(b.typ);
    let (children, truncated) = if b.children.is_empty() {
        (None, false)
    } else if depth >= max_depth {
        (None, true)
    } else {
        let kids = tree
            .children(b)
            .map(|c| build(tree, c, depth + 1, max_depth))
            .collect();
        (Some(kids), false)
    };

    JsonAtom {
        typ: b.typ.as_str_lossy(),
        name: known.full_name(),
        offset: b.offset,
        size: b.size,
        header_size: AtomBox::HEADER_SIZE,
        content_len: b.content_len,
        kind: kind_of(b, known),
        payload: b.payload.as_ref(),
        children,
        truncated,
    }
}

/// All roots, each rendered down to `max_depth` levels below itself.
pub fn to_json_atoms(tree: &ParseResult, max_depth: usize) -> Vec<JsonAtom<'_>> {
    let max_depth = max_depth.min(MAX_JSON_DEPTH);
    tree.roots().map(|b| build(tree, b, 0, max_depth)).collect()
}

/// The subtree rooted at `id`, or `None` for an unknown id.
pub fn json_atom(tree: &ParseResult, id: BoxId, max_depth: usize) -> Option<JsonAtom<'_>> {
    let max_depth = max_depth.min(MAX_JSON_DEPTH);
    tree.get_box(id).map(|b| build(tree, b, 0, max_depth))
}

pub fn to_json(tree: &ParseResult, max_depth: usize) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(to_json_atoms(tree, max_depth))
}
