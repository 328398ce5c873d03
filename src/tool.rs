//! Tools synthesized from service operations.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::{queue, style};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::{CallError, ClientCache, ServiceError};
use crate::config::ParamValidator;
use crate::error::ModelError;
use crate::model::{is_read_only, OperationDescriptor, ShapeType};

/// Name of the per-call region parameter every generated tool accepts.
pub const REGION_PARAM: &str = "region";

/// Error half of the result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// What every tool call returns: the raw service response, or
/// `{"error": ..., "code": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Success(Value),
    Error(ToolError),
}

impl ToolResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ToolError {
            error: message.into(),
            code: None,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Success(value) => value,
            Self::Error(ToolError { error, code: Some(code) }) => json!({ "error": error, "code": code }),
            Self::Error(ToolError { error, code: None }) => json!({ "error": error }),
        }
    }
}

impl From<ServiceError> for ToolResult {
    fn from(e: ServiceError) -> Self {
        Self::Error(ToolError {
            error: e.message,
            code: Some(e.code),
        })
    }
}

impl From<CallError> for ToolResult {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Service(e) => e.into(),
            CallError::Other(report) => Self::error(format!("{:#}", report)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub shape_type: ShapeType,
    pub required: bool,
    pub description: String,
}

/// Tool metadata in the shape MCP hosts list it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub read_only_hint: bool,
}

/// A named, callable unit exposed to an agent host.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &[ToolParameter];

    fn read_only(&self) -> bool {
        false
    }

    /// Runs the tool. Failures are reported inside the envelope.
    async fn call(&self, args: Value) -> ToolResult;

    fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.parameters() {
            let mut property = Map::new();
            if let Some(ty) = param.shape_type.json_schema_type() {
                property.insert("type".to_string(), json!(ty));
            }
            property.insert("description".to_string(), json!(param.description));
            properties.insert(param.name.clone(), Value::Object(property));
            if param.required {
                required.push(param.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            annotations: ToolAnnotations {
                read_only_hint: self.read_only(),
            },
        }
    }
}

/// Builds [`GeneratedTool`]s for one service.
#[derive(Debug, Clone)]
pub struct ToolSynthesizer {
    pub service_display_name: String,
    pub skip_param_documentation: bool,
    pub clients: Arc<ClientCache>,
}

impl ToolSynthesizer {
    /// Builds the tool for `descriptor`. Fails if an input member would be
    /// shadowed by the region parameter.
    pub fn synthesize(
        &self,
        descriptor: &OperationDescriptor,
        documentation_override: Option<&str>,
        validator: Option<ParamValidator>,
    ) -> Result<GeneratedTool, ModelError> {
        if descriptor.member(REGION_PARAM).is_some() {
            return Err(ModelError::ReservedMember {
                service: self.clients.service_name().to_string(),
                operation: descriptor.name.clone(),
                member: REGION_PARAM.to_string(),
            });
        }

        let param_doc = |doc: &str| {
            if self.skip_param_documentation {
                String::new()
            } else {
                doc.to_string()
            }
        };

        let mut parameters: Vec<_> = descriptor
            .input_members
            .iter()
            .map(|member| ToolParameter {
                name: member.name.clone(),
                shape_type: member.shape_type,
                required: member.required,
                description: param_doc(&member.documentation),
            })
            .collect();
        parameters.push(ToolParameter {
            name: REGION_PARAM.to_string(),
            shape_type: ShapeType::String,
            required: false,
            description: param_doc(&format!(
                "AWS region to send the request to. Defaults to {}.",
                self.clients.default_region()
            )),
        });

        let description = match documentation_override {
            Some(docs) => docs.to_string(),
            None => self.docstring(descriptor, &parameters),
        };

        Ok(GeneratedTool {
            name: descriptor.client_name(),
            operation_name: descriptor.name.clone(),
            service_display_name: self.service_display_name.clone(),
            description,
            read_only: is_read_only(&descriptor.name),
            parameters,
            validator,
            clients: Arc::clone(&self.clients),
        })
    }

    fn docstring(&self, descriptor: &OperationDescriptor, parameters: &[ToolParameter]) -> String {
        let mut doc = format!(
            "Execute the {} {} operation.",
            self.service_display_name, descriptor.name
        );
        if !descriptor.documentation.is_empty() {
            doc.push_str("\n\n");
            doc.push_str(&descriptor.documentation);
        }
        doc.push_str("\n\nArgs:");
        for param in parameters {
            let requirement = if param.required { "required" } else { "optional" };
            doc.push_str(&format!("\n    {} ({}, {})", param.name, param.shape_type, requirement));
            if !param.description.is_empty() {
                doc.push_str(": ");
                doc.push_str(&param.description);
            }
        }
        doc
    }
}

/// A tool that validates its arguments against an operation's input shape and
/// forwards them to the service client.
pub struct GeneratedTool {
    name: String,
    operation_name: String,
    service_display_name: String,
    description: String,
    read_only: bool,
    parameters: Vec<ToolParameter>,
    validator: Option<ParamValidator>,
    clients: Arc<ClientCache>,
}

impl GeneratedTool {
    /// API name of the wrapped operation.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name && p.name != REGION_PARAM)
    }

    /// Splits off the region and drops unset optionals, then checks what is
    /// left against the input shape.
    fn resolve_params(&self, args: Value) -> Result<(Option<String>, Map<String, Value>), String> {
        let mut params = match args {
            Value::Object(params) => params,
            Value::Null => Map::new(),
            other => return Err(format!("Arguments for '{}' must be a JSON object, got {}", self.name, other)),
        };

        let region = match params.remove(REGION_PARAM) {
            None | Some(Value::Null) => None,
            Some(Value::String(region)) => Some(region),
            Some(_) => return Err(format!("Parameter '{}' must be a string", REGION_PARAM)),
        };

        params.retain(|_, value| !value.is_null());

        for name in params.keys() {
            if self.parameter(name).is_none() {
                return Err(format!("Unknown parameter '{}' for {}", name, self.operation_name));
            }
        }
        for param in self.parameters.iter().filter(|p| p.name != REGION_PARAM) {
            match params.get(&param.name) {
                None if param.required => {
                    return Err(format!("Missing required parameter '{}'", param.name));
                },
                Some(value) if !param.shape_type.accepts(value) => {
                    return Err(format!("Parameter '{}' must be of type {}", param.name, param.shape_type));
                },
                _ => {},
            }
        }

        Ok((region, params))
    }

    /// Writes a human-readable description of a call with `args`.
    pub fn queue_description(&self, args: &Value, updates: &mut impl Write) -> eyre::Result<()> {
        queue!(
            updates,
            style::Print(format!("Running {} operation:\n\n", self.service_display_name)),
            style::Print(format!("Service name: {}\n", self.clients.service_name())),
            style::Print(format!("Operation name: {}\n", self.operation_name)),
        )?;

        let params: Vec<_> = args
            .as_object()
            .map(|m| m.iter().filter(|(k, v)| *k != REGION_PARAM && !v.is_null()).collect())
            .unwrap_or_default();
        if !params.is_empty() {
            queue!(updates, style::Print("Parameters: \n".to_string()))?;
            for (name, value) in params {
                match value {
                    Value::String(s) if s.is_empty() => {
                        queue!(updates, style::Print(format!("- {}\n", name)))?;
                    },
                    _ => {
                        queue!(updates, style::Print(format!("- {}: {}\n", name, value)))?;
                    },
                }
            }
        }

        if let Some(profile_name) = self.clients.profile_name() {
            queue!(updates, style::Print(format!("Profile name: {}\n", profile_name)))?;
        } else {
            queue!(updates, style::Print("Profile name: default\n".to_string()))?;
        }

        let region = args
            .get(REGION_PARAM)
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.clients.default_region());
        queue!(updates, style::Print(format!("Region: {}", region)))?;

        if !self.read_only {
            queue!(updates, style::Print("\nRequires acceptance: yes"))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GeneratedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedTool")
            .field("name", &self.name)
            .field("operation_name", &self.operation_name)
            .field("read_only", &self.read_only)
            .field("parameters", &self.parameters)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for GeneratedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn call(&self, args: Value) -> ToolResult {
        let (region, params) = match self.resolve_params(args) {
            Ok(resolved) => resolved,
            Err(reason) => return ToolResult::error(reason),
        };

        if let Some(validator) = &self.validator {
            if let Err(reason) = validator(&params) {
                tracing::debug!(tool = %self.name, %reason, "Validator rejected call");
                return ToolResult::error(reason);
            }
        }

        let client = match self.clients.get_client(region.as_deref()).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(tool = %self.name, region = ?region, "Unable to create client: {:#}", e);
                return ToolResult::error(format!("{:#}", e));
            },
        };

        tracing::info!(tool = %self.name, region = ?region, "Calling {}", self.operation_name);

        // The call runs on its own task so a panicking client still yields an
        // envelope.
        let operation = self.name.clone();
        let handle = tokio::spawn(async move { client.call(&operation, params).await });
        match handle.await {
            Ok(Ok(response)) => ToolResult::Success(response),
            Ok(Err(e)) => {
                tracing::warn!(tool = %self.name, "{} failed: {}", self.operation_name, e);
                e.into()
            },
            Err(e) => {
                tracing::error!(tool = %self.name, "{} aborted: {}", self.operation_name, e);
                ToolResult::error(format!("{} aborted: {}", self.operation_name, e))
            },
        }
    }
}
