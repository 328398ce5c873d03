use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::ClientCache;
use crate::error::{GeneratorError, Result};
use crate::model::client_operation_name;
use crate::registry::ToolRegistry;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Checks resolved tool arguments before the service is called. `Err` carries
/// the reason returned to the caller.
pub type ParamValidator = Arc<dyn Fn(&Map<String, Value>) -> std::result::Result<(), String> + Send + Sync>;

/// Replaces the generated tool for an operation. Receives the registry, the
/// generator's client cache and the operation name, and registers whatever it
/// needs.
pub type FunctionOverride =
    Arc<dyn Fn(&mut dyn ToolRegistry, Arc<ClientCache>, &str) -> Result<()> + Send + Sync>;

/// Generator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub service_name: String,
    pub service_display_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub skip_param_documentation: bool,
    /// Only register operations that do not mutate state.
    #[serde(default)]
    pub read_only: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl GeneratorConfig {
    pub fn new(service_name: impl Into<String>, service_display_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_display_name: service_display_name.into(),
            region: default_region(),
            profile_name: None,
            skip_param_documentation: false,
            read_only: false,
        }
    }

    /// Overlays `AWS_REGION` (or `AWS_DEFAULT_REGION`) and `AWS_PROFILE`.
    pub fn with_env(mut self) -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        if let Some(region) = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")) {
            self.region = region;
        }
        if let Some(profile) = non_empty("AWS_PROFILE") {
            self.profile_name = Some(profile);
        }
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    pub fn skip_param_documentation(mut self, skip: bool) -> Self {
        self.skip_param_documentation = skip;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// One unvalidated entry of the per-operation configuration table.
///
/// At most one of `ignore`, `func_override` and `documentation_override` may
/// be set, and an entry must set something.
#[derive(Clone, Default, Deserialize)]
pub struct OverrideSpec {
    #[serde(default)]
    pub ignore: bool,
    #[serde(skip)]
    pub func_override: Option<FunctionOverride>,
    #[serde(default)]
    pub documentation_override: Option<String>,
    #[serde(skip)]
    pub validator: Option<ParamValidator>,
}

impl OverrideSpec {
    pub fn ignore() -> Self {
        Self {
            ignore: true,
            ..Default::default()
        }
    }

    pub fn with_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn ToolRegistry, Arc<ClientCache>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.func_override = Some(Arc::new(f));
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation_override = Some(documentation.into());
        self
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    fn documentation(&self) -> Option<&str> {
        self.documentation_override.as_deref().filter(|d| !d.is_empty())
    }
}

impl std::fmt::Debug for OverrideSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideSpec")
            .field("ignore", &self.ignore)
            .field("func_override", &self.func_override.is_some())
            .field("documentation_override", &self.documentation_override)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// A validated per-operation override.
#[derive(Clone)]
pub enum OperationOverride {
    Ignore,
    Function(FunctionOverride),
    Customize {
        documentation: Option<String>,
        validator: Option<ParamValidator>,
    },
}

impl std::fmt::Debug for OperationOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => f.write_str("Ignore"),
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Customize {
                documentation,
                validator,
            } => f
                .debug_struct("Customize")
                .field("documentation", documentation)
                .field("validator", &validator.is_some())
                .finish(),
        }
    }
}

impl OperationOverride {
    /// Validates one configuration entry.
    pub fn from_spec(operation: &str, spec: OverrideSpec) -> Result<Self> {
        let exclusive = [spec.ignore, spec.func_override.is_some(), spec.documentation().is_some()]
            .iter()
            .filter(|set| **set)
            .count();

        if exclusive > 1 {
            return Err(GeneratorError::Configuration {
                operation: operation.to_string(),
                reason: "ignore, func_override and documentation_override are mutually exclusive".to_string(),
            });
        }
        if exclusive == 0 && spec.validator.is_none() {
            return Err(GeneratorError::Configuration {
                operation: operation.to_string(),
                reason: "empty override not allowed".to_string(),
            });
        }

        let documentation = spec.documentation().map(str::to_string);
        if spec.ignore {
            return Ok(Self::Ignore);
        }
        if let Some(f) = spec.func_override {
            if spec.validator.is_some() {
                tracing::warn!(operation, "Validator is unused when func_override is set");
            }
            return Ok(Self::Function(f));
        }
        Ok(Self::Customize {
            documentation,
            validator: spec.validator,
        })
    }
}

/// The validated configuration table, keyed by client operation name.
#[derive(Debug, Clone, Default)]
pub struct OperationOverrides {
    entries: HashMap<String, OperationOverride>,
}

impl OperationOverrides {
    /// Validates every entry, failing on the first invalid one. Keys may be
    /// API names (`GetQueueUrl`) or client names (`get_queue_url`).
    pub fn validate<I>(table: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, OverrideSpec)>,
    {
        let mut table: Vec<_> = table.into_iter().collect();
        table.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries = HashMap::with_capacity(table.len());
        for (operation, spec) in table {
            let validated = OperationOverride::from_spec(&operation, spec)?;
            let key = client_operation_name(&operation);
            if entries.insert(key, validated).is_some() {
                return Err(GeneratorError::Configuration {
                    operation,
                    reason: "operation is configured more than once".to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, operation: &str) -> Option<&OperationOverride> {
        self.entries.get(&client_operation_name(operation))
    }

    pub fn is_ignored(&self, operation: &str) -> bool {
        matches!(self.get(operation), Some(OperationOverride::Ignore))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
