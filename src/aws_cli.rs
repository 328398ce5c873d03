//! [`Session`] backed by the `aws` command line interface.
//!
//! Service models are read from the botocore data directories listed in
//! `AWS_DATA_PATH`; calls shell out to `aws <service> <operation>
//! --cli-input-json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bstr::ByteSlice;
use eyre::{Result, WrapErr};
use serde_json::{Map, Value};

use crate::client::{CallError, ServiceClient, ServiceError, Session};
use crate::error::ModelError;
use crate::model::{client_operation_name, JsonServiceModel, ServiceModel};
use crate::MAX_TOOL_RESPONSE_SIZE;

/// The environment variable name where we set additional metadata for the AWS CLI user agent.
const USER_AGENT_ENV_VAR: &str = "AWS_EXECUTION_ENV";
const USER_AGENT_APP_NAME: &str = "AwsToolGenerator";
const USER_AGENT_VERSION_KEY: &str = "Version";
const USER_AGENT_VERSION_VALUE: &str = env!("CARGO_PKG_VERSION");

const DATA_PATH_ENV_VAR: &str = "AWS_DATA_PATH";
const MODEL_FILE_NAME: &str = "service-2.json";

pub struct AwsCliSession {
    program: String,
    data_paths: Vec<PathBuf>,
    models: Mutex<HashMap<String, Arc<JsonServiceModel>>>,
}

impl AwsCliSession {
    pub fn new(data_paths: Vec<PathBuf>) -> Self {
        Self {
            program: "aws".to_string(),
            data_paths,
            models: Mutex::new(HashMap::new()),
        }
    }

    /// Reads model search paths from `AWS_DATA_PATH`.
    pub fn from_env() -> Self {
        let data_paths = std::env::var_os(DATA_PATH_ENV_VAR)
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self::new(data_paths)
    }

    /// Uses `program` instead of `aws`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn data_paths(&self) -> &[PathBuf] {
        &self.data_paths
    }

    fn load_model(&self, service_name: &str) -> Result<Arc<JsonServiceModel>, ModelError> {
        if let Some(model) = self.cached_model(service_name) {
            return Ok(model);
        }

        let path = find_model_file(&self.data_paths, service_name).ok_or_else(|| ModelError::ServiceNotFound {
            service: service_name.to_string(),
            searched: self.data_paths.clone(),
        })?;
        tracing::debug!(service = %service_name, path = %path.display(), "Loading service model");
        let model = Arc::new(JsonServiceModel::from_path(service_name, &path)?);

        if let Ok(mut models) = self.models.lock() {
            models.insert(service_name.to_string(), Arc::clone(&model));
        }
        Ok(model)
    }

    fn cached_model(&self, service_name: &str) -> Option<Arc<JsonServiceModel>> {
        self.models.lock().ok()?.get(service_name).cloned()
    }
}

impl std::fmt::Debug for AwsCliSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCliSession")
            .field("program", &self.program)
            .field("data_paths", &self.data_paths)
            .finish_non_exhaustive()
    }
}

/// Finds `<path>/<service>/<version>/service-2.json`, preferring the newest
/// API version across all paths.
fn find_model_file(data_paths: &[PathBuf], service_name: &str) -> Option<PathBuf> {
    data_paths
        .iter()
        .filter_map(|data_path| std::fs::read_dir(data_path.join(service_name)).ok())
        .flat_map(|versions| versions.filter_map(|entry| entry.ok()))
        .map(|entry| entry.path().join(MODEL_FILE_NAME))
        .filter(|path| path.is_file())
        .max_by(|a, b| api_version(a).cmp(&api_version(b)))
}

fn api_version(model_file: &Path) -> Option<String> {
    model_file
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

#[async_trait]
impl Session for AwsCliSession {
    async fn client(
        &self,
        service_name: &str,
        profile_name: Option<&str>,
        region: &str,
    ) -> Result<Arc<dyn ServiceClient>> {
        let model = self
            .load_model(service_name)
            .wrap_err_with(|| format!("Unable to create a client for '{}'", service_name))?;
        Ok(Arc::new(AwsCliClient {
            program: self.program.clone(),
            service_name: service_name.to_string(),
            region: region.to_string(),
            profile_name: profile_name.map(str::to_string),
            model,
        }))
    }

    fn service_model(&self, service_name: &str) -> Result<Arc<dyn ServiceModel>, ModelError> {
        let model: Arc<dyn ServiceModel> = self.load_model(service_name)?;
        Ok(model)
    }
}

/// Client for one service and region, calling the AWS CLI per operation.
#[derive(Debug)]
pub struct AwsCliClient {
    program: String,
    service_name: String,
    region: String,
    profile_name: Option<String>,
    model: Arc<JsonServiceModel>,
}

impl AwsCliClient {
    fn command(&self, operation: &str, params: &Map<String, Value>) -> Result<tokio::process::Command> {
        let mut command = tokio::process::Command::new(&self.program);

        // Set up additional metadata for the AWS CLI user agent
        let user_agent_metadata_value = format!(
            "{} {}/{}",
            USER_AGENT_APP_NAME, USER_AGENT_VERSION_KEY, USER_AGENT_VERSION_VALUE
        );
        let user_agent = match std::env::var(USER_AGENT_ENV_VAR) {
            Ok(existing_value) if !existing_value.is_empty() => {
                format!("{} {}", existing_value, user_agent_metadata_value)
            },
            _ => user_agent_metadata_value,
        };

        command.env(USER_AGENT_ENV_VAR, user_agent).arg("--region").arg(&self.region);
        if let Some(profile_name) = self.profile_name.as_deref() {
            command.arg("--profile").arg(profile_name);
        }
        command
            .arg(&self.service_name)
            .arg(cli_operation_name(operation))
            .arg("--output")
            .arg("json");
        if !params.is_empty() {
            let input = serde_json::to_string(params).wrap_err("Unable to serialize parameters")?;
            command.arg("--cli-input-json").arg(input);
        }
        Ok(command)
    }
}

#[async_trait]
impl ServiceClient for AwsCliClient {
    fn operation_names(&self) -> Vec<String> {
        self.model.operation_names()
    }

    async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value, CallError> {
        let mut command = self.command(operation, &params)?;
        let child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .wrap_err_with(|| format!("Unable to spawn '{} {} {}'", self.program, self.service_name, operation))?;
        let output = child
            .wait_with_output()
            .await
            .wrap_err_with(|| format!("Unable to run '{} {} {}'", self.program, self.service_name, operation))?;

        let stdout = output.stdout.to_str_lossy();
        let stderr = output.stderr.to_str_lossy();

        if output.status.success() {
            if stdout.trim().is_empty() {
                return Ok(Value::Object(Map::new()));
            }
            let response: Value = serde_json::from_str(&stdout)
                .wrap_err_with(|| format!("Unable to parse output of {}", operation))?;
            return Ok(response);
        }

        match parse_service_error(&stderr) {
            Some(e) => Err(CallError::Service(e)),
            None => Err(CallError::Other(eyre::eyre!(truncate(stderr.trim())))),
        }
    }
}

/// `get_queue_url` -> `get-queue-url`
fn cli_operation_name(operation: &str) -> String {
    client_operation_name(operation).replace('_', "-")
}

/// Parses `An error occurred (Code) when calling the Op operation: Message`.
fn parse_service_error(stderr: &str) -> Option<ServiceError> {
    let line = stderr.lines().find(|l| l.contains("An error occurred ("))?;
    let rest = &line[line.find("An error occurred (")? + "An error occurred (".len()..];
    let (code, rest) = rest.split_once(')')?;
    let message = rest
        .split_once("operation")
        .map(|(_, message)| message)
        .unwrap_or(rest)
        .trim_start_matches(':')
        .trim();
    Some(ServiceError {
        code: code.to_string(),
        message: truncate(message),
    })
}

fn truncate(s: &str) -> String {
    let limit = MAX_TOOL_RESPONSE_SIZE / 3;
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} ... truncated", &s[..end])
}
