use crate::error::{ParseError, Result};
use crate::expr::CountExpr;
use crate::schema::{Count, ElementKind, Encoding, FieldDescriptor};
use std::collections::HashMap;

/// Immutable mapping from schema id to its ordered field descriptors.
///
/// Leaf box types are looked up by their four-character name; nested schemas
/// may use any id. Build it fluently with [`SchemaRegistry::with_schema`] and
/// check it with [`SchemaRegistry::validate`] (done by `Parser::new`).
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    map: HashMap<String, Vec<FieldDescriptor>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with the given schema added (or replaced).
    pub fn with_schema(mut self, id: &str, fields: Vec<FieldDescriptor>) -> Self {
        self.map.insert(id.to_string(), fields);
        self
    }

    /// Like [`with_schema`](Self::with_schema), from compact descriptor lines
    /// such as `"version #t:8u,e:0,b:abort"`.
    pub fn with_schema_text(self, id: &str, lines: &[&str]) -> Result<Self> {
        let fields = lines
            .iter()
            .map(|line| line.parse::<FieldDescriptor>())
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_schema(id, fields))
    }

    pub fn get(&self, id: &str) -> Option<&[FieldDescriptor]> {
        self.map.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Checks the static shape of every schema:
    ///
    /// - nested references name registered schemas, and never form a cycle;
    /// - count expressions only reference named fields declared earlier in
    ///   the same schema;
    /// - expected values are only declared on primitive or string kinds.
    pub fn validate(&self) -> Result<()> {
        let mut ids: Vec<&String> = self.map.keys().collect();
        ids.sort();

        for id in &ids {
            let fields = &self.map[*id];
            for (index, field) in fields.iter().enumerate() {
                let describe = || format!("{}::{}[{}]", id, field.name, index);
                if let ElementKind::Nested(target) = &field.kind {
                    if !self.map.contains_key(target) {
                        return Err(ParseError::UnknownSchema(target.clone()));
                    }
                    if field.expected.is_some() {
                        return Err(ParseError::InvalidDescriptor {
                            descriptor: describe(),
                            reason: "expected value on a nested field".into(),
                        });
                    }
                }
                if let Count::Expr(expr) = &field.count {
                    for name in expr.field_refs() {
                        let earlier = fields[..index].iter().any(|f| f.name == name);
                        if !earlier {
                            return Err(ParseError::InvalidDescriptor {
                                descriptor: describe(),
                                reason: format!(
                                    "count `{}` refers to `{}`, which is not an earlier field",
                                    expr, name
                                ),
                            });
                        }
                    }
                }
            }
        }

        self.check_acyclic(&ids)
    }

    fn check_acyclic(&self, ids: &[&String]) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        for root in ids {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            // (schema id, index of the next field to inspect)
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            marks.insert(root.as_str(), Mark::Visiting);
            while let Some((id, next)) = stack.pop() {
                let fields = self.map.get(id).map(Vec::as_slice).unwrap_or_default();
                let child = fields[next.min(fields.len())..]
                    .iter()
                    .enumerate()
                    .find_map(|(i, f)| match &f.kind {
                        ElementKind::Nested(target) => Some((next + i, target.as_str())),
                        _ => None,
                    });
                match child {
                    None => {
                        marks.insert(id, Mark::Done);
                    }
                    Some((at, target)) => {
                        stack.push((id, at + 1));
                        match marks.get(target) {
                            Some(Mark::Visiting) => {
                                return Err(ParseError::SchemaCycle(target.to_string()));
                            }
                            Some(Mark::Done) => {}
                            None => {
                                marks.insert(target, Mark::Visiting);
                                stack.push((target, 0));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------- Default schemas ----------

fn version() -> FieldDescriptor {
    FieldDescriptor::u8("version").expect("0").or_abort()
}

fn flags() -> FieldDescriptor {
    FieldDescriptor::u8("flags").count(3)
}

fn reserved(kind: ElementKind, n: i64) -> FieldDescriptor {
    FieldDescriptor::padding(kind).count(n).expect("0")
}

fn date(name: &str) -> FieldDescriptor {
    FieldDescriptor::u32(name).encoding(Encoding::Date)
}

fn fixed32(name: &str) -> FieldDescriptor {
    FieldDescriptor::u32(name).encoding(Encoding::Fixed32)
}

fn fixed16(name: &str) -> FieldDescriptor {
    FieldDescriptor::u16(name).encoding(Encoding::Fixed16)
}

fn code(name: &str) -> FieldDescriptor {
    FieldDescriptor::u32(name).encoding(Encoding::Code)
}

fn matrix() -> FieldDescriptor {
    FieldDescriptor::u32("matrix").count(9).encoding(Encoding::Matrix)
}

fn table(name: &str, schema: &str) -> FieldDescriptor {
    FieldDescriptor::nested(name, schema).count_of(CountExpr::field("number_of_entries"))
}

fn entries() -> FieldDescriptor {
    FieldDescriptor::u32("number_of_entries")
}

/// Schemas shared by `clef`, `prof` and `enof` (track aperture dimensions).
fn aperture() -> Vec<FieldDescriptor> {
    vec![version(), flags(), fixed32("width"), fixed32("height")]
}

/// The QuickTime schema set decoded by [`Parser::default`](crate::Parser).
pub fn default_registry() -> SchemaRegistry {
    use FieldDescriptor as F;

    SchemaRegistry::new()
        .with_schema(
            "ftyp",
            vec![
                code("major_brand"),
                F::u32("minor_version"),
                code("compatible_brands").count_of(CountExpr::size().minus(8).div(4)),
            ],
        )
        .with_schema(
            "mvhd",
            vec![
                version(),
                flags(),
                date("creation_time"),
                date("modification_time"),
                F::u32("time_scale"),
                F::u32("duration"),
                fixed32("preferred_rate"),
                fixed16("preferred_volume"),
                reserved(ElementKind::U8, 10),
                matrix(),
                F::u32("preview_time"),
                F::u32("preview_duration"),
                F::u32("poster_time"),
                F::u32("selection_time"),
                F::u32("selection_duration"),
                F::u32("current_time"),
                F::u32("next_track_id"),
            ],
        )
        .with_schema(
            "tkhd",
            vec![
                version(),
                flags(),
                date("creation_time"),
                date("modification_time"),
                F::u32("track_id"),
                reserved(ElementKind::U8, 4),
                F::u32("duration"),
                reserved(ElementKind::U8, 8),
                F::u16("layer"),
                F::u16("alternate_group"),
                fixed16("volume"),
                reserved(ElementKind::U8, 2),
                matrix(),
                fixed32("track_width"),
                fixed32("track_height"),
            ],
        )
        .with_schema(
            "mdhd",
            vec![
                version(),
                flags(),
                date("creation_time"),
                date("modification_time"),
                F::u32("time_scale"),
                F::u32("duration"),
                F::u16("language"),
                F::u16("quality"),
            ],
        )
        .with_schema(
            "hdlr",
            vec![
                version(),
                flags(),
                code("component_type"),
                code("component_subtype"),
                F::u32("component_manufacturer"),
                F::u32("component_flags"),
                F::u32("component_flags_mask").expect("0"),
                // a Pascal string in QuickTime files, a C string in ISO ones
                F::u8("component_name")
                    .count_of(CountExpr::size().minus(24))
                    .encoding(Encoding::Text),
            ],
        )
        .with_schema(
            "vmhd",
            vec![
                version(),
                flags(),
                F::u16("graphics_mode"),
                F::u16("opcolor").count(3),
            ],
        )
        .with_schema("clef", aperture())
        .with_schema("prof", aperture())
        .with_schema("enof", aperture())
        .with_schema(
            "elst",
            vec![version(), flags(), entries(), table("edit_list_table", "elst_entry")],
        )
        .with_schema(
            "elst_entry",
            vec![
                F::u32("track_duration"),
                F::u32("media_time"),
                fixed32("media_rate"),
            ],
        )
        .with_schema(
            "dref",
            vec![version(), flags(), entries(), table("data_references", "dref_entry")],
        )
        .with_schema(
            "dref_entry",
            vec![
                F::u32("size"),
                code("type"),
                F::u8("version"),
                F::u8("flags").count(3),
                F::u8("data").count_of(CountExpr::field("size").minus(12)),
            ],
        )
        .with_schema(
            "stsd",
            vec![
                version(),
                flags(),
                entries(),
                table("sample_description_table", "stsd_entry"),
            ],
        )
        .with_schema(
            "stsd_entry",
            vec![
                F::u32("size"),
                code("data_format"),
                reserved(ElementKind::U8, 6),
                F::u16("data_reference_index"),
                F::u8("additional_data").count_of(CountExpr::field("size").minus(16)),
            ],
        )
        .with_schema(
            "stts",
            vec![
                version(),
                flags(),
                entries(),
                table("time_to_sample_table", "stts_entry"),
            ],
        )
        .with_schema(
            "stts_entry",
            vec![F::u32("sample_count"), F::u32("sample_duration")],
        )
        .with_schema(
            "stss",
            vec![
                version(),
                flags(),
                entries(),
                F::u32("sync_sample_table").count_of(CountExpr::field("number_of_entries")),
            ],
        )
        .with_schema(
            "sdtp",
            vec![
                version(),
                flags(),
                F::u8("sample_dependency_table").count_of(CountExpr::size().minus(4)),
            ],
        )
        .with_schema(
            "stsc",
            vec![
                version(),
                flags(),
                entries(),
                table("sample_to_chunk_table", "stsc_entry"),
            ],
        )
        .with_schema(
            "stsc_entry",
            vec![
                F::u32("first_chunk"),
                F::u32("samples_per_chunk"),
                F::u32("sample_description_id"),
            ],
        )
        .with_schema(
            "stsz",
            vec![
                version(),
                flags(),
                F::u32("sample_size"),
                entries(),
                // a non-zero sample_size means every sample has that size and
                // no table follows
                F::u32("sample_size_table").count_of(CountExpr::field("sample_size").if_zero(
                    CountExpr::field("number_of_entries"),
                    CountExpr::literal(0),
                )),
            ],
        )
        .with_schema(
            "stco",
            vec![
                version(),
                flags(),
                entries(),
                F::u32("chunk_offset_table").count_of(CountExpr::field("number_of_entries")),
            ],
        )
        .with_schema(
            "co64",
            vec![
                version(),
                flags(),
                entries(),
                F::u64("chunk_offset_table").count_of(CountExpr::field("number_of_entries")),
            ],
        )
        .with_schema(
            "smhd",
            vec![
                version(),
                flags(),
                F::u16("balance"),
                F::padding(ElementKind::U16).expect("0"),
            ],
        )
        .with_schema(
            "gmin",
            vec![
                version(),
                flags(),
                F::u16("graphics_mode"),
                F::u16("opcolor").count(3),
                F::u16("balance"),
                F::padding(ElementKind::U16).expect("0"),
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_is_valid() {
        let reg = default_registry();
        reg.validate().unwrap();
        for id in ["mvhd", "tkhd", "stsd", "stsd_entry", "co64", "ftyp"] {
            assert!(reg.contains(id), "missing {}", id);
        }
    }

    #[test]
    fn detects_unknown_nested_schema() {
        let reg = SchemaRegistry::new()
            .with_schema_text("abcd", &["n #t:32u", "list #t:{nope},c:{n}"])
            .unwrap();
        assert_eq!(reg.validate(), Err(ParseError::UnknownSchema("nope".into())));
    }

    #[test]
    fn detects_cycles() {
        let reg = SchemaRegistry::new()
            .with_schema_text("abcd", &["x #t:{a}"])
            .unwrap()
            .with_schema_text("a", &["y #t:8u", "z #t:{b}"])
            .unwrap()
            .with_schema_text("b", &["w #t:{a}"])
            .unwrap();
        assert!(matches!(reg.validate(), Err(ParseError::SchemaCycle(_))));

        let self_ref = SchemaRegistry::new()
            .with_schema_text("node", &["next #t:{node}"])
            .unwrap();
        assert_eq!(
            self_ref.validate(),
            Err(ParseError::SchemaCycle("node".into()))
        );
    }

    #[test]
    fn shared_nested_schema_is_not_a_cycle() {
        let reg = SchemaRegistry::new()
            .with_schema_text("abcd", &["a #t:{leaf}", "b #t:{mid}"])
            .unwrap()
            .with_schema_text("mid", &["c #t:{leaf}"])
            .unwrap()
            .with_schema_text("leaf", &["d #t:8u"])
            .unwrap();
        reg.validate().unwrap();
    }

    #[test]
    fn count_must_reference_an_earlier_field() {
        let reg = SchemaRegistry::new()
            .with_schema_text("abcd", &["list #t:8u,c:{n}", "n #t:8u"])
            .unwrap();
        assert!(matches!(
            reg.validate(),
            Err(ParseError::InvalidDescriptor { .. })
        ));
    }
}
