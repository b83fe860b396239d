use crate::boxes::{AtomBox, BoxId, FourCC};
use crate::decode::decode_payload;
use crate::error::{ParseError, ParseFailure, Result, Warning};
use crate::known_boxes::KnownBox;
use crate::reader::{ByteReader, Endian};
use crate::registry::{SchemaRegistry, default_registry};
use crate::template::TemplateEngine;
use crate::tree::ParseResult;
use std::collections::HashSet;

const HEADER: usize = AtomBox::HEADER_SIZE as usize;

/// Splits a buffer into an atom tree.
///
/// Immutable once built, so one parser can serve any number of parses,
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct Parser {
    containers: HashSet<FourCC>,
    registry: SchemaRegistry,
    byte_order: Endian,
}

/// A scan position inside one container (or the whole buffer).
#[derive(Debug, Clone, Copy)]
struct Frame {
    origin: usize,
    cursor: usize,
    bound: usize,
    target: Option<BoxId>,
}

#[derive(Default)]
struct Forest {
    boxes: Vec<AtomBox>,
    roots: Vec<BoxId>,
    warnings: Vec<Warning>,
}

impl Forest {
    fn push(&mut self, node: AtomBox, parent: Option<BoxId>) -> BoxId {
        let id = BoxId(self.boxes.len());
        self.boxes.push(node);
        match parent {
            Some(p) => self.boxes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn warn(&mut self, w: Warning) {
        log::warn!("{}", w);
        self.warnings.push(w);
    }

    fn finish(mut self) -> ParseResult {
        for b in &mut self.boxes {
            if let Some(payload) = b.payload.as_mut() {
                decode_payload(payload);
            }
        }
        ParseResult::new(self.boxes, self.roots, self.warnings)
    }
}

impl Parser {
    /// A parser with no container types and the given schemas.
    ///
    /// Fails if the registry does not validate.
    pub fn new(registry: SchemaRegistry) -> Result<Self> {
        registry.validate()?;
        Ok(Self {
            containers: HashSet::new(),
            registry,
            byte_order: Endian::Big,
        })
    }

    pub fn with_container(mut self, typ: FourCC) -> Self {
        self.containers.insert(typ);
        self
    }

    pub fn with_containers<I: IntoIterator<Item = FourCC>>(mut self, types: I) -> Self {
        self.containers.extend(types);
        self
    }

    pub fn with_byte_order(mut self, endian: Endian) -> Self {
        self.byte_order = endian;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn is_container(&self, typ: FourCC) -> bool {
        self.containers.contains(&typ)
    }

    /// Parses and decodes the whole buffer.
    ///
    /// On a fatal error the [`ParseFailure`] carries every box appended
    /// before the failure.
    pub fn parse(&self, buf: &[u8]) -> std::result::Result<ParseResult, ParseFailure> {
        let mut forest = Forest::default();
        match self.walk(buf, &mut forest) {
            Ok(()) => Ok(forest.finish()),
            Err(error) => Err(ParseFailure {
                error,
                partial: forest.finish(),
            }),
        }
    }

    fn walk(&self, buf: &[u8], forest: &mut Forest) -> Result<()> {
        let mut reader = ByteReader::new(buf, self.byte_order);
        let engine = TemplateEngine::new(&self.registry);

        let mut stack = Vec::new();
        if !buf.is_empty() {
            stack.push(Frame {
                origin: 0,
                cursor: 0,
                bound: buf.len(),
                target: None,
            });
        }

        while let Some(frame) = stack.pop() {
            let at = frame.origin + frame.cursor;
            let left = frame.bound - frame.cursor;
            if left < HEADER {
                forest.warn(Warning::TrailingBytes {
                    offset: at as u64,
                    len: left as u64,
                });
                continue;
            }

            reader.seek(at);
            let size = reader.read_u32()?;
            if size == 0 {
                forest.warn(Warning::ZeroSizeBox { offset: at as u64 });
                continue;
            }
            if size < AtomBox::HEADER_SIZE {
                return Err(ParseError::MalformedBox {
                    offset: at as u64,
                    size,
                });
            }

            // siblings resume once this box's subtree is done
            let next = frame.cursor.saturating_add(size as usize);
            if next < frame.bound {
                stack.push(Frame {
                    cursor: next,
                    ..frame
                });
            }

            let typ = reader.read_fourcc()?;
            let content_start = at + HEADER;
            let content_len = (size as usize - HEADER).min(left - HEADER);
            log::debug!("{} at {} size {} content {}", typ, at, size, content_len);

            let id = forest.push(
                AtomBox {
                    typ,
                    size,
                    offset: at as u64,
                    content_len: content_len as u32,
                    children: Vec::new(),
                    payload: None,
                },
                frame.target,
            );

            let name = typ.as_string();
            if self.containers.contains(&typ) {
                if content_len > 0 {
                    stack.push(Frame {
                        origin: content_start,
                        cursor: 0,
                        bound: content_len,
                        target: Some(id),
                    });
                }
            } else if self.registry.contains(&name) {
                let mut window = reader.window(content_start, content_len);
                let payload = engine.parse_payload(&mut window, &name, content_len)?;
                forest.boxes[id.0].payload = Some(payload);
            } else {
                forest.warn(Warning::UnknownBoxType {
                    typ,
                    offset: at as u64,
                });
            }
        }
        Ok(())
    }
}

/// The QuickTime containers and [`default_registry`].
impl Default for Parser {
    fn default() -> Self {
        Self {
            containers: KnownBox::default_containers().collect(),
            registry: default_registry(),
            byte_order: Endian::Big,
        }
    }
}

/// Parses `buf` with [`Parser::default`].
pub fn parse(buf: &[u8]) -> std::result::Result<ParseResult, ParseFailure> {
    Parser::default().parse(buf)
}
