//! # Handler Descriptors
//!
//! A descriptor names the handler for a block type version and the body
//! fields that version requires.

use pbm_01_block_model::BlockKind;
use serde_json::Value;

/// JSON shape expected for a body field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    UInt,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::UInt => value.is_u64(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

/// One body field of a registered shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Which code path renders/handles a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    /// Decoded into the given typed variant.
    Typed(BlockKind),
    /// Generic placeholder for types this node cannot read.
    Fallback,
}

/// Renderer/handler descriptor for one `(type, version)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub handler: Handler,
    /// Renderer name handed to the UI layer.
    pub renderer: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Accepted only when synthesized locally, never from a peer.
    pub local_only: bool,
}

impl BlockDescriptor {
    pub fn typed(kind: BlockKind, renderer: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            handler: Handler::Typed(kind),
            renderer,
            fields,
            local_only: kind.is_local_only(),
        }
    }

    pub fn fallback() -> Self {
        Self {
            handler: Handler::Fallback,
            renderer: "placeholder",
            fields: Vec::new(),
            local_only: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.handler, Handler::Fallback)
    }

    /// Version-1 shape of every built-in block kind.
    pub fn builtin(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Text => Self::typed(
                kind,
                "text",
                vec![
                    FieldSpec::required("content", FieldType::String),
                    FieldSpec::required("format", FieldType::String),
                ],
            ),
            BlockKind::Code => Self::typed(
                kind,
                "code",
                vec![
                    FieldSpec::required("content", FieldType::String),
                    FieldSpec::required("language", FieldType::String),
                    FieldSpec::optional("filename", FieldType::String),
                    FieldSpec::required("line_numbers", FieldType::Bool),
                ],
            ),
            BlockKind::File => Self::typed(
                kind,
                "file-card",
                vec![
                    FieldSpec::required("filename", FieldType::String),
                    FieldSpec::required("size", FieldType::UInt),
                    FieldSpec::required("mime_type", FieldType::String),
                    FieldSpec::optional("transfer_status", FieldType::String),
                    FieldSpec::optional("transfer_progress", FieldType::UInt),
                    FieldSpec::optional("retry_count", FieldType::UInt),
                ],
            ),
            BlockKind::Widget => Self::typed(
                kind,
                "widget",
                vec![
                    FieldSpec::required("config", FieldType::Object),
                    FieldSpec::optional("responses", FieldType::Array),
                ],
            ),
            BlockKind::System => Self::typed(
                kind,
                "system-line",
                vec![
                    FieldSpec::required("message", FieldType::String),
                    FieldSpec::required("severity", FieldType::String),
                ],
            ),
        }
    }

    /// Checks a decoded JSON body against the registered fields.
    ///
    /// Returns the first violation found.
    pub fn check_body(&self, body: &Value) -> Result<(), String> {
        let object = body
            .as_object()
            .ok_or_else(|| "body is not a JSON object".to_string())?;

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(format!("missing required field `{}`", field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.ty.matches(value) => {
                    return Err(format!(
                        "field `{}` should be {:?}, got {}",
                        field.name,
                        field.ty,
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
