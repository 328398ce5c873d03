use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_tool_generator::{
    AwsToolGenerator, CallError, GeneratorConfig, InMemoryToolRegistry, JsonServiceModel, ModelError,
    ServiceClient, ServiceError, ServiceModel, Session, ToolRegistry,
};
use serde_json::{json, Map, Value};

fn sqs_model() -> JsonServiceModel {
    JsonServiceModel::from_value(
        "sqs",
        json!({
            "operations": {
                "GetQueueUrl": { "input": { "shape": "GetQueueUrlRequest" } }
            },
            "shapes": {
                "String": { "type": "string" },
                "GetQueueUrlRequest": {
                    "type": "structure",
                    "required": ["QueueName"],
                    "members": {
                        "QueueName": { "shape": "String", "documentation": "The name of the queue." }
                    }
                }
            }
        }),
    )
    .unwrap()
}

struct FakeSqs {
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

#[async_trait]
impl ServiceClient for FakeSqs {
    fn operation_names(&self) -> Vec<String> {
        vec!["get_queue_url".to_string(), "get_paginator".to_string()]
    }

    async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value, CallError> {
        self.calls.lock().unwrap().push((operation.to_string(), params.clone()));
        match params.get("QueueName").and_then(Value::as_str) {
            Some("my-queue") => Ok(json!({ "QueueUrl": "https://sqs.us-east-1.amazonaws.com/123456789012/my-queue" })),
            _ => Err(CallError::Service(ServiceError {
                code: "QueueDoesNotExist".to_string(),
                message: "The specified queue does not exist".to_string(),
            })),
        }
    }
}

struct FakeSession {
    client: Arc<FakeSqs>,
}

#[async_trait]
impl Session for FakeSession {
    async fn client(
        &self,
        _service_name: &str,
        _profile_name: Option<&str>,
        _region: &str,
    ) -> eyre::Result<Arc<dyn ServiceClient>> {
        Ok(self.client.clone())
    }

    fn service_model(&self, _service_name: &str) -> Result<Arc<dyn ServiceModel>, ModelError> {
        Ok(Arc::new(sqs_model()))
    }
}

async fn registry() -> (InMemoryToolRegistry, Arc<FakeSqs>) {
    let client = Arc::new(FakeSqs {
        calls: Mutex::new(Vec::new()),
    });
    let session = Arc::new(FakeSession { client: client.clone() });
    let generator =
        AwsToolGenerator::new(GeneratorConfig::new("sqs", "Amazon SQS"), session, Vec::new()).unwrap();
    let mut registry = InMemoryToolRegistry::new();
    generator.generate(&mut registry).await.unwrap();
    (registry, client)
}

#[tokio::test]
async fn get_queue_url_returns_response_unchanged() {
    let (registry, client) = registry().await;
    assert!(registry.contains("get_queue_url"));
    assert!(!registry.contains("get_paginator"));

    let result = registry
        .call("get_queue_url", json!({ "QueueName": "my-queue" }))
        .await
        .unwrap();
    assert_eq!(
        result.into_value(),
        json!({ "QueueUrl": "https://sqs.us-east-1.amazonaws.com/123456789012/my-queue" })
    );

    let calls = client.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "get_queue_url");
    assert_eq!(Value::Object(calls[0].1.clone()), json!({ "QueueName": "my-queue" }));
}

#[tokio::test]
async fn get_queue_url_normalizes_service_error() {
    let (registry, _) = registry().await;
    let result = registry
        .call("get_queue_url", json!({ "QueueName": "missing" }))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({ "error": "The specified queue does not exist", "code": "QueueDoesNotExist" })
    );
}

#[tokio::test]
async fn tool_definition_lists_parameters() {
    let (registry, _) = registry().await;
    let definitions = serde_json::to_value(registry.definitions()).unwrap();
    assert_eq!(definitions[0]["name"], "get_queue_url");
    assert_eq!(definitions[0]["inputSchema"]["required"], json!(["QueueName"]));
    assert_eq!(
        definitions[0]["inputSchema"]["properties"]["QueueName"]["description"],
        "The name of the queue."
    );
    assert!(definitions[0]["inputSchema"]["properties"]["region"].is_object());
}
