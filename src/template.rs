use crate::error::{ParseError, Result};
use crate::expr::{CountExpr, EvalError};
use crate::reader::ByteReader;
use crate::registry::SchemaRegistry;
use crate::schema::{
    Count, ElementKind, FieldDescriptor, FieldValue, OnMismatch, Payload, RawValue, Value,
};

/// Interprets registry schemas against a reader.
///
/// Nested schema invocations recurse through [`TemplateEngine::parse_payload`];
/// the depth is bounded by the (validated, acyclic) schema graph.
pub struct TemplateEngine<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> TemplateEngine<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Decodes one instance of `schema_id` starting at the reader's position.
    ///
    /// `available` is the payload size visible to `$size` in count
    /// expressions. Nested elements see the bytes left in this invocation.
    pub fn parse_payload(
        &self,
        reader: &mut ByteReader<'_>,
        schema_id: &str,
        available: usize,
    ) -> Result<Payload> {
        let fields = self
            .registry
            .get(schema_id)
            .ok_or_else(|| ParseError::UnknownSchema(schema_id.to_string()))?;
        let end = reader.position().saturating_add(available);
        let mut out = Payload::new();

        for (index, field) in fields.iter().enumerate() {
            let count = match &field.count {
                Count::Implicit => 1,
                Count::Expr(expr) => eval_count(schema_id, index, field, expr, &out, available)?,
            };

            let capacity = match field.kind.min_width() {
                Some(w) => count.min(reader.remaining() / w),
                None => 0,
            };
            let mut values = Vec::with_capacity(capacity);
            for _ in 0..count {
                let before = reader.position();
                let value = self.read_element(reader, &field.kind, end)?;

                if let Some(expected) = &field.expected {
                    let text = value.to_string();
                    if text != *expected {
                        match field.on_mismatch {
                            OnMismatch::Abort => return Ok(out),
                            OnMismatch::Throw => {
                                return Err(ParseError::UnexpectedValue {
                                    schema: schema_id.to_string(),
                                    field: field.name.clone(),
                                    index,
                                    value: text,
                                    expected: expected.clone(),
                                });
                            }
                        }
                    }
                }

                // an element that reads nothing could otherwise spin through
                // an arbitrarily large count
                if reader.position() == before && count > end.saturating_sub(before) {
                    return Err(invalid_count(
                        schema_id,
                        index,
                        field,
                        format!("{} empty elements exceed the payload", count),
                    ));
                }
                values.push(value);
            }

            if field.is_padding() {
                continue;
            }
            let raw = if field.is_array() {
                RawValue::Sequence(values)
            } else {
                match <[Value; 1]>::try_from(values) {
                    Ok([single]) => RawValue::Scalar(single),
                    Err(values) => RawValue::Sequence(values),
                }
            };
            out.insert(field.name.clone(), FieldValue::new(raw, field.encoding));
        }

        Ok(out)
    }

    fn read_element(
        &self,
        reader: &mut ByteReader<'_>,
        kind: &ElementKind,
        end: usize,
    ) -> Result<Value> {
        Ok(match kind {
            ElementKind::U8 => Value::UInt(u64::from(reader.read_u8()?)),
            ElementKind::U16 => Value::UInt(u64::from(reader.read_u16()?)),
            ElementKind::U32 => Value::UInt(u64::from(reader.read_u32()?)),
            ElementKind::U64 => Value::UInt(reader.read_u64()?),
            ElementKind::PascalString => Value::Text(reader.read_pascal_string()?),
            ElementKind::ZeroTerminatedString => Value::Text(reader.read_zero_terminated_string()?),
            ElementKind::Nested(id) => {
                let left = end.saturating_sub(reader.position());
                Value::Struct(self.parse_payload(reader, id, left)?)
            }
        })
    }
}

fn invalid_count(
    schema: &str,
    index: usize,
    field: &FieldDescriptor,
    reason: String,
) -> ParseError {
    ParseError::InvalidCount {
        schema: schema.to_string(),
        field: field.name.clone(),
        index,
        reason,
    }
}

fn eval_count(
    schema: &str,
    index: usize,
    field: &FieldDescriptor,
    expr: &CountExpr,
    decoded: &Payload,
    available: usize,
) -> Result<usize> {
    let lookup = |name: &str| -> std::result::Result<i64, EvalError> {
        let value = decoded
            .get(name)
            .ok_or_else(|| EvalError::UnknownField(name.to_string()))?;
        value
            .raw
            .as_u64()
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| EvalError::NotNumeric(name.to_string()))
    };
    let size = i64::try_from(available).unwrap_or(i64::MAX);

    let n = expr
        .eval(lookup, size)
        .map_err(|e| invalid_count(schema, index, field, format!("`{}`: {}", expr, e)))?;
    usize::try_from(n).map_err(|_| {
        invalid_count(schema, index, field, format!("`{}` evaluates to {}", expr, n))
    })
}
