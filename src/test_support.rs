//! Mock session and client shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::client::{CallError, ServiceClient, ServiceError, Session};
use crate::error::ModelError;
use crate::model::{JsonServiceModel, ServiceModel};

pub fn sqs_model_json() -> Value {
    json!({
        "metadata": {
            "apiVersion": "2012-11-05",
            "serviceFullName": "Amazon Simple Queue Service"
        },
        "operations": {
            "DeleteQueue": {
                "name": "DeleteQueue",
                "input": { "shape": "DeleteQueueRequest" },
                "documentation": "Deletes the queue specified by the QueueUrl."
            },
            "GetQueueUrl": {
                "name": "GetQueueUrl",
                "input": { "shape": "GetQueueUrlRequest" },
                "documentation": "Returns the URL of an existing queue."
            },
            "ListQueues": {
                "name": "ListQueues",
                "documentation": "Returns a list of your queues."
            },
            "SendMessage": {
                "name": "SendMessage",
                "input": { "shape": "SendMessageRequest" },
                "documentation": "Delivers a message to the specified queue."
            }
        },
        "shapes": {
            "AccountId": { "type": "string", "documentation": "An AWS account ID." },
            "Integer": { "type": "integer" },
            "String": { "type": "string" },
            "MessageBodyAttributeMap": {
                "type": "map",
                "key": { "shape": "String" },
                "value": { "shape": "String" }
            },
            "DeleteQueueRequest": {
                "type": "structure",
                "required": ["QueueUrl"],
                "members": {
                    "QueueUrl": { "shape": "String", "documentation": "The URL of the queue to delete." }
                }
            },
            "GetQueueUrlRequest": {
                "type": "structure",
                "required": ["QueueName"],
                "members": {
                    "QueueName": {
                        "shape": "String",
                        "documentation": "The name of the queue whose URL must be fetched."
                    },
                    "QueueOwnerAWSAccountId": { "shape": "AccountId" }
                }
            },
            "SendMessageRequest": {
                "type": "structure",
                "required": ["QueueUrl", "MessageBody"],
                "members": {
                    "QueueUrl": { "shape": "String", "documentation": "The URL of the queue." },
                    "MessageBody": { "shape": "String", "documentation": "The message to send." },
                    "DelaySeconds": { "shape": "Integer", "documentation": "Seconds to delay the message." },
                    "MessageAttributes": { "shape": "MessageBodyAttributeMap" }
                }
            }
        }
    })
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Value(Value),
    ServiceError { code: String, message: String },
    Failure(String),
    Panic,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub region: String,
    pub params: Map<String, Value>,
}

#[derive(Default)]
struct Shared {
    regions: Mutex<Vec<String>>,
    profiles: Mutex<Vec<Option<String>>>,
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
    extra_operations: Mutex<Vec<String>>,
    fail_clients: AtomicBool,
    hold_clients: AtomicBool,
    holding: AtomicBool,
}

pub struct MockSession {
    model: Option<JsonServiceModel>,
    shared: Arc<Shared>,
}

impl MockSession {
    pub fn sqs() -> Self {
        Self {
            model: Some(JsonServiceModel::from_value("sqs", sqs_model_json()).unwrap()),
            shared: Arc::default(),
        }
    }

    /// A session serving `model` as the `service_name` model.
    pub fn with_model(service_name: &str, model: Value) -> Self {
        Self {
            model: Some(JsonServiceModel::from_value(service_name, model).unwrap()),
            shared: Arc::default(),
        }
    }

    /// A session whose service model cannot be loaded.
    pub fn without_model() -> Self {
        Self {
            model: None,
            shared: Arc::default(),
        }
    }

    pub fn respond_with(&self, operation: &str, value: Value) {
        self.set_response(operation, MockResponse::Value(value));
    }

    pub fn respond_with_error(&self, operation: &str, code: &str, message: &str) {
        self.set_response(
            operation,
            MockResponse::ServiceError {
                code: code.to_string(),
                message: message.to_string(),
            },
        );
    }

    pub fn respond_with_failure(&self, operation: &str, message: &str) {
        self.set_response(operation, MockResponse::Failure(message.to_string()));
    }

    pub fn panic_on(&self, operation: &str) {
        self.set_response(operation, MockResponse::Panic);
    }

    fn set_response(&self, operation: &str, response: MockResponse) {
        self.shared
            .responses
            .lock()
            .unwrap()
            .insert(operation.to_string(), response);
    }

    /// Adds client methods that are not in the service model.
    pub fn with_extra_operations(self, operations: &[&str]) -> Self {
        self.shared
            .extra_operations
            .lock()
            .unwrap()
            .extend(operations.iter().map(|op| op.to_string()));
        self
    }

    pub fn fail_clients(&self, fail: bool) {
        self.shared.fail_clients.store(fail, Ordering::SeqCst);
    }

    /// Makes client creation wait until released.
    pub fn hold_clients(&self, hold: bool) {
        self.shared.hold_clients.store(hold, Ordering::SeqCst);
    }

    /// Whether a client creation is currently waiting on [`Self::hold_clients`].
    pub fn is_holding(&self) -> bool {
        self.shared.holding.load(Ordering::SeqCst)
    }

    pub fn clients_created(&self) -> usize {
        self.shared.regions.lock().unwrap().len()
    }

    pub fn regions(&self) -> Vec<String> {
        self.shared.regions.lock().unwrap().clone()
    }

    pub fn profiles(&self) -> Vec<Option<String>> {
        self.shared.profiles.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn client(
        &self,
        _service_name: &str,
        profile_name: Option<&str>,
        region: &str,
    ) -> eyre::Result<Arc<dyn ServiceClient>> {
        if self.shared.fail_clients.load(Ordering::SeqCst) {
            eyre::bail!("unable to create client: no credentials");
        }
        while self.shared.hold_clients.load(Ordering::SeqCst) {
            self.shared.holding.store(true, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        self.shared.holding.store(false, Ordering::SeqCst);
        // Widen the first-use window so racing callers would build twice
        // without per-key serialization.
        tokio::task::yield_now().await;

        self.shared.regions.lock().unwrap().push(region.to_string());
        self.shared
            .profiles
            .lock()
            .unwrap()
            .push(profile_name.map(str::to_string));

        let mut operations: Vec<String> = self
            .model
            .as_ref()
            .map(|m| m.operation_names())
            .unwrap_or_default();
        operations.extend(self.shared.extra_operations.lock().unwrap().iter().cloned());
        operations.extend(
            ["_make_api_call", "can_paginate", "close", "get_paginator", "get_waiter"]
                .iter()
                .map(|op| op.to_string()),
        );

        Ok(Arc::new(MockClient {
            region: region.to_string(),
            operations,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn service_model(&self, service_name: &str) -> Result<Arc<dyn ServiceModel>, ModelError> {
        match &self.model {
            Some(model) => Ok(Arc::new(model.clone())),
            None => Err(ModelError::ServiceNotFound {
                service: service_name.to_string(),
                searched: Vec::new(),
            }),
        }
    }
}

pub struct MockClient {
    region: String,
    operations: Vec<String>,
    shared: Arc<Shared>,
}

#[async_trait]
impl ServiceClient for MockClient {
    fn operation_names(&self) -> Vec<String> {
        self.operations.clone()
    }

    async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value, CallError> {
        self.shared.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            region: self.region.clone(),
            params,
        });

        let response = self.shared.responses.lock().unwrap().get(operation).cloned();
        match response {
            Some(MockResponse::Value(value)) => Ok(value),
            Some(MockResponse::ServiceError { code, message }) => Err(CallError::Service(ServiceError { code, message })),
            Some(MockResponse::Failure(message)) => Err(CallError::Other(eyre::eyre!(message))),
            Some(MockResponse::Panic) => panic!("mock client panicked in {}", operation),
            None => Ok(json!({ "ResponseMetadata": { "RequestId": "mock-request" } })),
        }
    }
}
