//! Generates MCP tools from AWS service models.
//!
//! [`AwsToolGenerator`] lists the operations a live client exposes, reads each
//! operation's input shape from the service model and registers one tool per
//! operation. Every tool validates its arguments, calls the service through a
//! cached client and returns either the raw response or
//! `{"error": ..., "code": ...}`.

pub mod aws_cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod registry;
pub mod tool;

#[cfg(test)]
mod test_support;

pub use aws_cli::AwsCliSession;
pub use client::{CallError, ClientCache, ServiceClient, ServiceError, Session};
pub use config::{GeneratorConfig, OperationOverride, OverrideSpec};
pub use error::{GeneratorError, ModelError, RegistryError};
pub use generator::{AwsToolGenerator, GenerationSummary};
pub use model::{JsonServiceModel, OperationDescriptor, ServiceModel};
pub use registry::{InMemoryToolRegistry, ToolRegistry};
pub use tool::{GeneratedTool, Tool, ToolDefinition, ToolResult};

/// Maximum size for tool response output
pub const MAX_TOOL_RESPONSE_SIZE: usize = 100_000;
