use crate::boxes::{AtomBox, BoxId};
use crate::error::Warning;
use crate::schema::{FieldValue, Payload};
use std::collections::HashMap;

/// Lookup keys for the children of one level.
///
/// A name seen once is stored bare. The second sibling with that name moves
/// the first to `name[0]` and takes `name[1]`; later ones take `name[2]`, ...
#[derive(Debug, Clone, Default)]
struct SiblingKeys {
    keys: HashMap<String, BoxId>,
    seen: HashMap<String, usize>,
}

impl SiblingKeys {
    fn add(&mut self, name: String, id: BoxId) {
        let n = self.seen.entry(name.clone()).or_insert(0);
        match *n {
            0 => {
                self.keys.insert(name, id);
            }
            1 => {
                if let Some(first) = self.keys.remove(&name) {
                    self.keys.insert(format!("{}[0]", name), first);
                }
                self.keys.insert(format!("{}[1]", name), id);
            }
            i => {
                self.keys.insert(format!("{}[{}]", name, i), id);
            }
        }
        *n += 1;
    }

    fn get(&self, key: &str) -> Option<BoxId> {
        self.keys.get(key).copied()
    }

    fn sorted_keys(&self) -> Vec<&str> {
        let mut out: Vec<(&str, BoxId)> = self.keys.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        out.sort_by_key(|(_, id)| *id);
        out.into_iter().map(|(k, _)| k).collect()
    }
}

/// The decoded forest of one buffer.
#[derive(Debug, Clone)]
pub struct ParseResult {
    boxes: Vec<AtomBox>,
    roots: Vec<BoxId>,
    root_keys: SiblingKeys,
    child_keys: Vec<SiblingKeys>,
    warnings: Vec<Warning>,
}

impl ParseResult {
    /// Builds the address map from a finished forest.
    pub(crate) fn new(boxes: Vec<AtomBox>, roots: Vec<BoxId>, warnings: Vec<Warning>) -> Self {
        let mut root_keys = SiblingKeys::default();
        for &id in &roots {
            root_keys.add(boxes[id.0].name(), id);
        }
        let child_keys = boxes
            .iter()
            .map(|b| {
                let mut keys = SiblingKeys::default();
                for &c in &b.children {
                    keys.add(boxes[c.0].name(), c);
                }
                keys
            })
            .collect();
        Self {
            boxes,
            roots,
            root_keys,
            child_keys,
            warnings,
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &AtomBox> {
        self.roots.iter().map(|id| &self.boxes[id.0])
    }

    pub fn root_ids(&self) -> &[BoxId] {
        &self.roots
    }

    pub fn get_box(&self, id: BoxId) -> Option<&AtomBox> {
        self.boxes.get(id.0)
    }

    pub fn children<'s>(&'s self, parent: &'s AtomBox) -> impl Iterator<Item = &'s AtomBox> {
        parent.children.iter().map(|id| &self.boxes[id.0])
    }

    /// Number of boxes at every depth.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Pre-order traversal of the whole forest, with depths (roots are 0).
    pub fn walk(&self) -> Walk<'_> {
        let stack = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        Walk { tree: self, stack }
    }

    /// Pre-order traversal of the subtree at `id`, which has depth 0.
    pub fn walk_from(&self, id: BoxId) -> Walk<'_> {
        let stack = if id.0 < self.boxes.len() {
            vec![(id, 0)]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }

    /// Calls `visitor(type name, payload, depth)` for every box, parents
    /// before children and siblings in file order.
    pub fn enumerate<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, Option<&Payload>, usize),
    {
        for (depth, b) in self.walk() {
            visitor(&b.name(), b.payload.as_ref(), depth);
        }
    }

    /// Resolves a dotted path such as `moov.trak[1].mdia.mdhd`.
    pub fn get_id(&self, path: &str) -> Option<BoxId> {
        let mut level = &self.root_keys;
        let mut found = None;
        for segment in path.split('.') {
            let id = level.get(segment)?;
            level = &self.child_keys[id.0];
            found = Some(id);
        }
        found
    }

    pub fn get(&self, path: &str) -> Option<&AtomBox> {
        self.get_id(path).map(|id| &self.boxes[id.0])
    }

    /// A payload field of the box at `path`.
    pub fn field(&self, path: &str, name: &str) -> Option<&FieldValue> {
        self.get(path)?.payload.as_ref()?.get(name)
    }

    /// Child keys at `path` in file order; the empty path lists the roots.
    pub fn keys(&self, path: &str) -> Option<Vec<&str>> {
        if path.is_empty() {
            return Some(self.root_keys.sorted_keys());
        }
        let id = self.get_id(path)?;
        Some(self.child_keys[id.0].sorted_keys())
    }
}

/// Iterator returned by [`ParseResult::walk`].
pub struct Walk<'a> {
    tree: &'a ParseResult,
    stack: Vec<(BoxId, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a AtomBox);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let b = &self.tree.boxes[id.0];
        self.stack
            .extend(b.children.iter().rev().map(|&c| (c, depth + 1)));
        Some((depth, b))
    }
}
