use std::collections::HashMap;
use std::sync::Arc;

use aws_tool_generator::{
    AwsCliSession, AwsToolGenerator, GeneratorConfig, InMemoryToolRegistry, OverrideSpec, ServiceModel, Session,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("aws_tool_generator=info")
        .init();

    // AWS_DATA_PATH must point at a botocore data directory containing sqs/<version>/service-2.json
    let session = Arc::new(AwsCliSession::from_env());
    let config = GeneratorConfig::new("sqs", "Amazon SQS").with_env().read_only(true);
    let overrides = HashMap::from([(
        "get_queue_url".to_string(),
        OverrideSpec::default().with_validator(|params| {
            match params.get("QueueName").and_then(|v| v.as_str()) {
                Some(name) if name.len() > 80 => Err("QueueName must be at most 80 characters".to_string()),
                _ => Ok(()),
            }
        }),
    )]);

    let generator = AwsToolGenerator::new(config, session.clone(), overrides)?;
    let mut registry = InMemoryToolRegistry::new();
    let summary = generator.generate(&mut registry).await?;

    for definition in registry.definitions() {
        println!("{}", serde_json::to_string_pretty(&definition)?);
    }
    println!(
        "\nRegistered {} tools, filtered {}",
        summary.registered.len(),
        summary.filtered.len()
    );

    // Generate and display the human-readable description of a call
    let descriptor = session.service_model("sqs")?.operation("get_queue_url")?;
    let tool = generator.synthesizer().synthesize(&descriptor, None, None)?;
    let args = serde_json::json!({ "QueueName": "orders", "region": "us-west-2" });
    let mut output = Vec::new();
    tool.queue_description(&args, &mut output)?;
    println!("\n{}", String::from_utf8(output)?);

    Ok(())
}
