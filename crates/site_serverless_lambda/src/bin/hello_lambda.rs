use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use site_serverless_lambda::adapters::clock::SystemClock;
use site_serverless_lambda::handlers::hello::{handle_hello_event, ApiGatewayResponse};

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_hello_event(&event.payload, &SystemClock))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // CloudWatch stamps ingestion time, so no timestamps or targets here.
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    lambda_runtime::run(service_fn(handle_request)).await
}
