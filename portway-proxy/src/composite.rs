//! The Composite Orchestrator (`spec.md` §4.G): topologically orders
//! `Steps`, resolves each step's body via [`crate::template`], invokes the
//! referenced endpoint, and accumulates `ctx[stepName]`.
//!
//! Atomicity across heterogeneous backends is explicitly out of scope
//! (`spec.md` §9 open question ii); this is best-effort sequential
//! execution with per-step status, not two-phase commit.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use portway_registry::{validate::topo_sort, CompositeEndpoint, CompositeStep, DescriptorError};
use serde_json::{json, Value};

use crate::error::ProxyError;
use crate::template::{render, resolve};

/// Invokes one named endpoint on behalf of a composite step. Implemented by
/// the dispatcher, which alone knows how to resolve an endpoint name
/// against the registry and route it to the SQL/proxy/file handler.
#[async_trait]
pub trait StepInvoker: Sync {
    async fn invoke(&self, endpoint: &str, method: &str, body: Option<Value>) -> Result<Value, ProxyError>;
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub value: Value,
    pub failed: bool,
}

pub struct CompositeOutcome {
    pub success: bool,
    pub step_results: HashMap<String, Value>,
}

fn order_steps(composite: &CompositeEndpoint) -> Result<Vec<&CompositeStep>, DescriptorError> {
    let order = topo_sort(composite)?;
    Ok(order
        .into_iter()
        .map(|name| composite.steps.iter().find(|s| s.name == name).expect("topo_sort only returns declared step names"))
        .collect())
}

/// Groups the ordered steps into dependency levels: every step in a level
/// depends only on steps in earlier levels, so steps within one level can
/// run concurrently (`spec.md` §4.G step 3).
fn group_into_levels<'a>(ordered: &[&'a CompositeStep]) -> Vec<Vec<&'a CompositeStep>> {
    let mut resolved: Vec<&str> = Vec::new();
    let mut levels: Vec<Vec<&CompositeStep>> = Vec::new();
    let mut remaining: Vec<&CompositeStep> = ordered.to_vec();

    while !remaining.is_empty() {
        let (ready, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|step| step.depends_on.iter().all(|dep| resolved.contains(&dep.as_str())));
        for step in &ready {
            resolved.push(step.name.as_str());
        }
        levels.push(ready);
        remaining = rest;
    }
    levels
}

async fn run_step(
    step: &CompositeStep,
    ctx: &HashMap<String, Value>,
    request: &Value,
    invoker: &dyn StepInvoker,
) -> StepResult {
    async fn run_one(
        step: &CompositeStep,
        ctx: &HashMap<String, Value>,
        invoker: &dyn StepInvoker,
        item: Option<&Value>,
    ) -> Result<Value, ProxyError> {
        let mut local_ctx = ctx.clone();
        if let Some(item) = item {
            local_ctx.insert("item".to_owned(), item.clone());
        }
        let body = match &step.template_body {
            Some(template) => match render(template, &local_ctx) {
                Ok(rendered) => Some(rendered),
                Err(e) => return Err(e),
            },
            None => None,
        };
        invoker.invoke(&step.endpoint, &step.method, body).await
    }

    if step.is_array {
        let array_property = step.array_property.as_deref().unwrap_or("");
        let items = resolve(ctx, &format!("$request.{array_property}"))
            .unwrap_or(Value::Array(vec![]));
        let items = items.as_array().cloned().unwrap_or_default();
        let mut results = Vec::with_capacity(items.len());
        let mut failed = false;
        for item in &items {
            match run_one(step, ctx, invoker, Some(item)).await {
                Ok(value) => results.push(value),
                Err(e) => {
                    failed = true;
                    if step.continue_on_error {
                        results.push(json!({"error": e.to_string()}));
                    } else {
                        return StepResult {
                            name: step.name.clone(),
                            value: json!({"error": e.to_string(), "partial": results}),
                            failed: true,
                        };
                    }
                }
            }
        }
        StepResult {
            name: step.name.clone(),
            value: Value::Array(results),
            failed,
        }
    } else {
        let _ = request;
        match run_one(step, ctx, invoker, None).await {
            Ok(value) => StepResult {
                name: step.name.clone(),
                value,
                failed: false,
            },
            Err(e) => StepResult {
                name: step.name.clone(),
                value: json!({"error": e.to_string()}),
                failed: true,
            },
        }
    }
}

pub async fn execute(
    composite: &CompositeEndpoint,
    request_body: Value,
    invoker: &dyn StepInvoker,
) -> Result<CompositeOutcome, DescriptorError> {
    let ordered = order_steps(composite)?;
    let levels = group_into_levels(&ordered);

    let mut ctx: HashMap<String, Value> = HashMap::new();
    ctx.insert("request".to_owned(), request_body.clone());

    let mut success = true;
    for level in levels {
        let outcomes = join_all(
            level
                .iter()
                .map(|step| run_step(step, &ctx, &request_body, invoker)),
        )
        .await;
        for outcome in outcomes {
            let step_name = ordered
                .iter()
                .find(|s| s.name == outcome.name)
                .expect("step name came from the ordered list");
            if outcome.failed && !step_name.continue_on_error {
                success = false;
            }
            ctx.insert(outcome.name.clone(), outcome.value);
        }
        if !success {
            break;
        }
    }

    Ok(CompositeOutcome {
        success,
        step_results: ctx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use portway_registry::EndpointMeta;
    use serde_json::Map;

    struct EchoInvoker;

    #[async_trait]
    impl StepInvoker for EchoInvoker {
        async fn invoke(&self, endpoint: &str, _method: &str, body: Option<Value>) -> Result<Value, ProxyError> {
            if endpoint == "fail" {
                return Err(ProxyError::BadGateway("simulated failure".to_owned()));
            }
            Ok(json!({"endpoint": endpoint, "body": body}))
        }
    }

    fn meta() -> EndpointMeta {
        EndpointMeta {
            name: "CreateOrder".to_owned(),
            namespace: None,
            allowed_methods: vec![],
            is_private: false,
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn runs_steps_in_dependency_order_p5() {
        let composite = CompositeEndpoint {
            meta: meta(),
            steps: vec![
                CompositeStep {
                    name: "second".to_owned(),
                    endpoint: "b".to_owned(),
                    method: "POST".to_owned(),
                    is_array: false,
                    array_property: None,
                    source_property: None,
                    template_body: None,
                    depends_on: vec!["first".to_owned()],
                    continue_on_error: false,
                },
                CompositeStep {
                    name: "first".to_owned(),
                    endpoint: "a".to_owned(),
                    method: "POST".to_owned(),
                    is_array: false,
                    array_property: None,
                    source_property: None,
                    template_body: None,
                    depends_on: vec![],
                    continue_on_error: false,
                },
            ],
        };

        let outcome = execute(&composite, json!({}), &EchoInvoker).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.step_results.contains_key("first"));
        assert!(outcome.step_results.contains_key("second"));
    }

    #[tokio::test]
    async fn continue_on_error_keeps_orchestration_running() {
        let composite = CompositeEndpoint {
            meta: meta(),
            steps: vec![CompositeStep {
                name: "optional".to_owned(),
                endpoint: "fail".to_owned(),
                method: "POST".to_owned(),
                is_array: false,
                array_property: None,
                source_property: None,
                template_body: None,
                depends_on: vec![],
                continue_on_error: true,
            }],
        };

        let outcome = execute(&composite, json!({}), &EchoInvoker).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn a_required_step_failure_reports_partial_results() {
        let composite = CompositeEndpoint {
            meta: meta(),
            steps: vec![CompositeStep {
                name: "required".to_owned(),
                endpoint: "fail".to_owned(),
                method: "POST".to_owned(),
                is_array: false,
                array_property: None,
                source_property: None,
                template_body: None,
                depends_on: vec![],
                continue_on_error: false,
            }],
        };

        let outcome = execute(&composite, json!({}), &EchoInvoker).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.step_results.contains_key("required"));
    }
}
