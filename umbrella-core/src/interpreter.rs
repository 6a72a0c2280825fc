//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//! References are resolved just before each Effect runs, against the
//! results of the Effects executed before it.

use log::{debug, info};

use crate::effect::Effect;
use crate::graph::{BindingMap, resolve_resource, unresolved_attributes};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{Resource, ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Data source read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete followed by create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
///
/// `outcomes[i]` belongs to `plan.effects()[i]`; when execution stops at the
/// first failure the remaining Effects have no outcome.
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    ///
    /// `bindings` must hold the attributes of every binding that is not
    /// touched by the plan (refreshed state and data sources read at plan time).
    pub async fn apply(&self, plan: &Plan, mut bindings: BindingMap) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect, &mut bindings).await;

            match &result {
                Ok(_) => {
                    info!("{} ... done", effect);
                    success_count += 1;
                }
                Err(e) => {
                    info!("{} ... failed: {}", effect, e);
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Resolve references and fail if any value is still unknown
    fn prepare(&self, resource: &Resource, bindings: &BindingMap) -> ProviderResult<Resource> {
        let resolved = resolve_resource(resource, bindings);
        let unresolved = unresolved_attributes(&resolved);
        if !unresolved.is_empty() {
            return Err(ProviderError::new(format!(
                "Cannot resolve references in: {}",
                unresolved.join(", ")
            ))
            .for_resource(resource.id.clone()));
        }
        Ok(resolved)
    }

    /// Record the new state of a binding: configured values overlaid with
    /// what the API returned
    fn record(resolved: &Resource, mut state: State, bindings: &mut BindingMap) -> State {
        for (k, v) in &resolved.attributes {
            state
                .attributes
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        state.configured = resolved.attributes.keys().cloned().collect();
        bindings.insert(resolved.binding(), state.attributes.clone());
        state
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &mut BindingMap,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        debug!("executing {}", effect);

        match effect {
            Effect::Read(resource) => {
                let resolved = self.prepare(resource, bindings)?;
                let state = self.provider.read_data_source(&resolved).await?;
                let state = Self::record(&resolved, state, bindings);
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resolved = self.prepare(resource, bindings)?;
                let state = self.provider.create(&resolved).await?;
                let state = Self::record(&resolved, state, bindings);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::new("No identifier recorded for resource").for_resource(id.clone())
                })?;
                let resolved = self.prepare(to, bindings)?;
                let state = self
                    .provider
                    .update(id, identifier, from, &resolved)
                    .await?;
                let state = Self::record(&resolved, state, bindings);
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                let resolved = self.prepare(to, bindings)?;
                if let Some(identifier) = from.identifier.as_deref() {
                    self.provider.delete(id, identifier).await?;
                }
                let state = self.provider.create(&resolved).await?;
                let state = Self::record(&resolved, state, bindings);
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                bindings.remove(&id.address());
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::provider::BoxFuture;
    use crate::resource::Value;
    use crate::schema::ResourceSchema;

    /// Records calls and hands out sequential identifiers
    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<String>>,
    }

    impl TestProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn schemas(&self) -> Vec<ResourceSchema> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("read {}", resource.id));
            let mut attrs = HashMap::new();
            attrs.insert("count".to_string(), Value::Int(2));
            let state = State::existing(resource.id.clone(), attrs);
            Box::pin(async move { Ok(state) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("create {}", resource.id));
            let n = calls.len() as i64;
            let mut attrs = HashMap::new();
            attrs.insert("site_id".to_string(), Value::Int(n));
            let state = State::existing(resource.id.clone(), attrs).with_identifier(n.to_string());
            Box::pin(async move { Ok(state) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {} {}", id, identifier));
            let state =
                State::existing(id.clone(), to.attributes.clone()).with_identifier(identifier);
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {} {}", id, identifier));
            let fail = id.name == "fails";
            Box::pin(async move {
                if fail {
                    Err(ProviderError::new("refused"))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::default());
        let result = interpreter.apply(&Plan::new(), BindingMap::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_resolves_references_from_earlier_effects() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("umbrella_site", "hq").with_attribute("name", Value::String("HQ".into())),
        ));
        plan.add(Effect::Create(
            Resource::new("umbrella_internal_network", "lan").with_attribute(
                "site_id",
                Value::ResourceRef("umbrella_site.hq".to_string(), "site_id".to_string()),
            ),
        ));

        let result = interpreter.apply(&plan, BindingMap::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 2);
        match &result.outcomes[1] {
            Ok(EffectOutcome::Created { state }) => {
                // values returned by the API win over configured ones
                assert_eq!(state.attributes.get("site_id"), Some(&Value::Int(2)));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        match &result.outcomes[0] {
            Ok(EffectOutcome::Created { state }) => {
                assert_eq!(state.identifier.as_deref(), Some("1"));
                assert_eq!(
                    state.attributes.get("name"),
                    Some(&Value::String("HQ".into()))
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_records_configured_names() {
        let interpreter = Interpreter::new(TestProvider::default());
        let id = ResourceId::new("umbrella_destination_list", "blocked");
        let from = State::existing(id.clone(), HashMap::new())
            .with_identifier("15")
            .with_configured(["name", "description"]);
        let mut plan = Plan::new();
        plan.add(Effect::Update {
            id: id.clone(),
            from,
            to: Resource::new("umbrella_destination_list", "blocked")
                .with_attribute("name", Value::String("Blocked".into())),
            changed_attributes: vec!["description".to_string()],
        });

        let result = interpreter.apply(&plan, BindingMap::new()).await;
        match &result.outcomes[0] {
            Ok(EffectOutcome::Updated { state }) => {
                assert_eq!(state.configured.iter().collect::<Vec<_>>(), vec!["name"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn unresolvable_reference_fails_effect() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("umbrella_internal_network", "lan").with_attribute(
                "site_id",
                Value::ResourceRef("umbrella_site.hq".to_string(), "site_id".to_string()),
            ),
        ));

        let result = interpreter.apply(&plan, BindingMap::new()).await;
        assert_eq!(result.failure_count, 1);
        let err = result.outcomes[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("site_id"));
        assert!(interpreter.provider().calls().is_empty());
    }

    #[tokio::test]
    async fn replace_deletes_then_creates() {
        let interpreter = Interpreter::new(TestProvider::default());
        let id = ResourceId::new("umbrella_user", "ops");
        let from = State::existing(id.clone(), HashMap::new()).with_identifier("77");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id: id.clone(),
            from,
            to: Resource::new("umbrella_user", "ops"),
            changed_attributes: vec!["email".to_string()],
        });

        let result = interpreter.apply(&plan, BindingMap::new()).await;
        assert!(result.is_success());
        assert_eq!(
            interpreter.provider().calls(),
            vec![
                "delete umbrella_user.ops 77".to_string(),
                "create umbrella_user.ops".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn stops_on_first_error_unless_configured() {
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("umbrella_tag", "fails"),
            identifier: "1".to_string(),
        });
        plan.add(Effect::Delete {
            id: ResourceId::new("umbrella_tag", "ok"),
            identifier: "2".to_string(),
        });

        let interpreter = Interpreter::new(TestProvider::default());
        let result = interpreter.apply(&plan, BindingMap::new()).await;
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.failure_count, 1);

        let interpreter = Interpreter::new(TestProvider::default()).with_config(InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        });
        let result = interpreter.apply(&plan, BindingMap::new()).await;
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("umbrella_tag", "example")));

        let result = interpreter.apply(&plan, BindingMap::new()).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
        assert!(interpreter.provider().calls().is_empty());
    }
}
