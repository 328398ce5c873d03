use std::sync::Arc;

use crate::client::{list_operations, ClientCache, Session};
use crate::config::{GeneratorConfig, OperationOverride, OperationOverrides, OverrideSpec};
use crate::error::{GeneratorError, Result};
use crate::model::{client_operation_name, is_read_only};
use crate::registry::ToolRegistry;
use crate::tool::ToolSynthesizer;

/// What [`AwsToolGenerator::generate`] did with each operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Tool names registered, including those handed to function overrides.
    pub registered: Vec<String>,
    pub ignored: Vec<String>,
    /// Operations left out by the read-only filter.
    pub filtered: Vec<String>,
    /// Operations skipped after an introspection or override failure.
    pub failed: Vec<(String, String)>,
}

/// Generates one tool per operation of an AWS service.
pub struct AwsToolGenerator {
    config: GeneratorConfig,
    overrides: OperationOverrides,
    session: Arc<dyn Session>,
    clients: Arc<ClientCache>,
}

impl AwsToolGenerator {
    /// Validates `tool_configuration` and builds the generator. Any invalid
    /// entry fails construction.
    pub fn new<I>(config: GeneratorConfig, session: Arc<dyn Session>, tool_configuration: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, OverrideSpec)>,
    {
        let overrides = OperationOverrides::validate(tool_configuration)?;
        let clients = Arc::new(ClientCache::new(
            Arc::clone(&session),
            config.service_name.clone(),
            config.profile_name.clone(),
            config.region.clone(),
        ));
        Ok(Self {
            config,
            overrides,
            session,
            clients,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn client_cache(&self) -> Arc<ClientCache> {
        Arc::clone(&self.clients)
    }

    /// Synthesizer configured for this generator's service and client cache.
    pub fn synthesizer(&self) -> ToolSynthesizer {
        ToolSynthesizer {
            service_display_name: self.config.service_display_name.clone(),
            skip_param_documentation: self.config.skip_param_documentation,
            clients: Arc::clone(&self.clients),
        }
    }

    /// Registers a tool for every eligible operation.
    ///
    /// Fails if the service model or a client cannot be loaded, or if a tool
    /// name is already registered. Individual operations that cannot be
    /// introspected are logged and skipped.
    pub async fn generate(&self, registry: &mut dyn ToolRegistry) -> Result<GenerationSummary> {
        let service = &self.config.service_name;
        let model = self.session.service_model(service)?;
        let client = self
            .clients
            .get_client(None)
            .await
            .map_err(|e| GeneratorError::Client(format!("{:#}", e)))?;

        let synthesizer = self.synthesizer();

        let mut summary = GenerationSummary::default();
        for operation in list_operations(client.as_ref()) {
            let tool_name = client_operation_name(&operation);

            if self.config.read_only && !is_read_only(&operation) {
                summary.filtered.push(tool_name);
                continue;
            }

            let (documentation, validator) = match self.overrides.get(&operation) {
                Some(OperationOverride::Ignore) => {
                    tracing::debug!(%service, operation = %tool_name, "Ignoring operation");
                    summary.ignored.push(tool_name);
                    continue;
                },
                Some(OperationOverride::Function(f)) => {
                    match f(&mut *registry, Arc::clone(&self.clients), &tool_name) {
                        Ok(()) => summary.registered.push(tool_name),
                        Err(GeneratorError::Registry(e)) => return Err(e.into()),
                        Err(e) => {
                            tracing::warn!(%service, operation = %tool_name, "Function override failed: {}", e);
                            summary.failed.push((tool_name, e.to_string()));
                        },
                    }
                    continue;
                },
                Some(OperationOverride::Customize {
                    documentation,
                    validator,
                }) => (documentation.as_deref(), validator.clone()),
                None => (None, None),
            };

            let tool = match model
                .operation(&operation)
                .and_then(|descriptor| synthesizer.synthesize(&descriptor, documentation, validator))
            {
                Ok(tool) => tool,
                Err(e) => {
                    tracing::warn!(%service, operation = %tool_name, "Skipping operation: {}", e);
                    summary.failed.push((tool_name, e.to_string()));
                    continue;
                },
            };
            registry.register(Arc::new(tool))?;
            summary.registered.push(tool_name);
        }

        tracing::info!(
            %service,
            registered = summary.registered.len(),
            ignored = summary.ignored.len(),
            filtered = summary.filtered.len(),
            failed = summary.failed.len(),
            "Generated tools"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for AwsToolGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsToolGenerator")
            .field("config", &self.config)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
