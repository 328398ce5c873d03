//! Service model introspection.
//!
//! A service model describes every operation of an AWS service and the shape
//! of its input. [`JsonServiceModel`] reads the botocore `service-2.json`
//! format shipped with the AWS CLI and SDKs.

use std::collections::HashMap;
use std::path::Path;

use convert_case::{Boundary, Case, Casing};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ModelError;

/// Operation name prefixes that never mutate state.
pub const READONLY_OPS: [&str; 6] = ["get", "describe", "list", "ls", "search", "batch_get"];

/// Digits stay attached to the word before them (`ListObjectsV2` ->
/// `list_objects_v2`); only a digit followed by an uppercase letter splits.
const DIGIT_BOUNDARIES: [Boundary; 3] = [Boundary::LOWER_DIGIT, Boundary::UPPER_DIGIT, Boundary::DIGIT_LOWER];

/// Converts an API operation name (`GetQueueUrl`) into the client method name
/// used for tools (`get_queue_url`). Already converted names are unchanged.
pub fn client_operation_name(name: &str) -> String {
    name.without_boundaries(&DIGIT_BOUNDARIES).to_case(Case::Snake)
}

pub fn is_read_only(operation_name: &str) -> bool {
    let name = client_operation_name(operation_name);
    READONLY_OPS.iter().any(|op| name.starts_with(op))
}

/// Native type a shape member maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    Structure,
    Blob,
    Timestamp,
    Document,
}

impl ShapeType {
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let shape_type = match type_name {
            "string" | "character" => Self::String,
            "integer" | "long" | "short" | "byte" => Self::Integer,
            "float" | "double" | "bigdecimal" => Self::Float,
            "boolean" => Self::Boolean,
            "list" => Self::List,
            "map" => Self::Map,
            "structure" | "union" => Self::Structure,
            "blob" => Self::Blob,
            "timestamp" => Self::Timestamp,
            "document" => Self::Document,
            _ => return None,
        };
        Some(shape_type)
    }

    /// JSON schema `type` keyword for this shape, if it restricts one.
    pub fn json_schema_type(&self) -> Option<&'static str> {
        match self {
            Self::String | Self::Blob => Some("string"),
            Self::Integer => Some("integer"),
            Self::Float => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::List => Some("array"),
            Self::Map | Self::Structure => Some("object"),
            Self::Timestamp | Self::Document => None,
        }
    }

    /// Whether `value` is acceptable for a member of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String | Self::Blob => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map | Self::Structure => value.is_object(),
            Self::Timestamp => value.is_string() || value.is_number(),
            Self::Document => true,
        }
    }
}

impl std::fmt::Display for ShapeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
            Self::Structure => "structure",
            Self::Blob => "blob",
            Self::Timestamp => "timestamp",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub shape_type: ShapeType,
    pub required: bool,
    pub documentation: String,
}

/// An operation and its input shape, as read from a service model.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// API name, e.g. `GetQueueUrl`.
    pub name: String,
    pub documentation: String,
    /// Input members in model order.
    pub input_members: Vec<MemberDescriptor>,
    pub has_input: bool,
}

impl OperationDescriptor {
    pub fn client_name(&self) -> String {
        client_operation_name(&self.name)
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.input_members.iter().find(|m| m.name == name)
    }
}

/// Low-level access to a service's operation catalog.
pub trait ServiceModel: Send + Sync {
    fn service_name(&self) -> &str;

    /// Client method names of every operation in the model.
    fn operation_names(&self) -> Vec<String>;

    /// Looks up an operation by API name or client method name.
    fn operation(&self, name: &str) -> Result<OperationDescriptor, ModelError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    service_full_name: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ShapeRef {
    shape: String,
    #[serde(default)]
    documentation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOperation {
    #[serde(default)]
    input: Option<ShapeRef>,
    #[serde(default)]
    documentation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawShape {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    members: Map<String, Value>,
    #[serde(default)]
    documentation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    metadata: RawMetadata,
    operations: Map<String, Value>,
    #[serde(default)]
    shapes: Map<String, Value>,
}

/// A botocore JSON service model.
#[derive(Debug, Clone)]
pub struct JsonServiceModel {
    service_name: String,
    full_name: Option<String>,
    api_version: Option<String>,
    operations: Vec<(String, RawOperation)>,
    by_client_name: HashMap<String, usize>,
    shapes: HashMap<String, RawShape>,
}

impl JsonServiceModel {
    pub fn from_value(service_name: &str, value: Value) -> Result<Self, ModelError> {
        let malformed = |reason: String| ModelError::Malformed {
            service: service_name.to_string(),
            reason,
        };

        let raw: RawModel = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        let mut operations = Vec::with_capacity(raw.operations.len());
        let mut by_client_name = HashMap::new();
        for (name, op) in raw.operations {
            let op: RawOperation =
                serde_json::from_value(op).map_err(|e| malformed(format!("operation {}: {}", name, e)))?;
            by_client_name.insert(client_operation_name(&name), operations.len());
            operations.push((name, op));
        }

        let mut shapes = HashMap::with_capacity(raw.shapes.len());
        for (name, shape) in raw.shapes {
            let shape: RawShape =
                serde_json::from_value(shape).map_err(|e| malformed(format!("shape {}: {}", name, e)))?;
            shapes.insert(name, shape);
        }

        Ok(Self {
            service_name: service_name.to_string(),
            full_name: raw.metadata.service_full_name,
            api_version: raw.metadata.api_version,
            operations,
            by_client_name,
            shapes,
        })
    }

    pub fn from_path(service_name: &str, path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value = serde_json::from_str(&contents).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(service_name, value)
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    fn find(&self, name: &str) -> Option<&(String, RawOperation)> {
        self.operations
            .iter()
            .find(|(api_name, _)| api_name == name)
            .or_else(|| self.by_client_name.get(name).map(|&idx| &self.operations[idx]))
    }

    fn shape(&self, name: &str) -> Result<&RawShape, ModelError> {
        self.shapes.get(name).ok_or_else(|| ModelError::MissingShape {
            service: self.service_name.clone(),
            shape: name.to_string(),
        })
    }

    fn input_members(&self, input: &ShapeRef) -> Result<Vec<MemberDescriptor>, ModelError> {
        let shape = self.shape(&input.shape)?;
        let mut members = Vec::with_capacity(shape.members.len());
        for (name, member) in &shape.members {
            let member: ShapeRef = serde_json::from_value(member.clone()).map_err(|e| ModelError::Malformed {
                service: self.service_name.clone(),
                reason: format!("member {}.{}: {}", input.shape, name, e),
            })?;
            let target = self.shape(&member.shape)?;
            let shape_type = ShapeType::from_type_name(&target.type_name).ok_or_else(|| ModelError::Malformed {
                service: self.service_name.clone(),
                reason: format!("shape {} has unknown type '{}'", member.shape, target.type_name),
            })?;
            members.push(MemberDescriptor {
                name: name.clone(),
                shape_type,
                required: shape.required.iter().any(|r| r == name),
                documentation: member
                    .documentation
                    .or_else(|| target.documentation.clone())
                    .unwrap_or_default(),
            });
        }
        Ok(members)
    }
}

impl ServiceModel for JsonServiceModel {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn operation_names(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|(name, _)| client_operation_name(name))
            .collect()
    }

    fn operation(&self, name: &str) -> Result<OperationDescriptor, ModelError> {
        let (api_name, op) = self.find(name).ok_or_else(|| ModelError::OperationNotFound {
            service: self.service_name.clone(),
            operation: name.to_string(),
        })?;

        let input_members = match &op.input {
            Some(input) => self.input_members(input)?,
            None => Vec::new(),
        };

        Ok(OperationDescriptor {
            name: api_name.clone(),
            documentation: op.documentation.clone().unwrap_or_default(),
            has_input: op.input.is_some(),
            input_members,
        })
    }
}
