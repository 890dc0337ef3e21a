use lambda_runtime::{run, service_fn, Error, LambdaEvent};

use backup_core::config_rule::ConfigRuleEvent;
use config_rule_backup::{ConfigRuleService, RuleResponse};

async fn function_handler(event: LambdaEvent<ConfigRuleEvent>) -> Result<RuleResponse, Error> {
    let service = ConfigRuleService::new().await;
    service.process(&event.payload).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
