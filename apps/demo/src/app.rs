use std::collections::BTreeMap;

use anyhow::{bail, Context};
use serde_json::json;
use slice_core::{
    Action, CombinedReducer, DeferredRegistry, DispatchContext, Facade, Handler, OperationKind,
    Slice,
};
use slice_effects::{EffectRunner, EffectRunnerConfig};
use tracing::{debug, info};

use crate::{
    config::Settings,
    handlers::{Counter, CounterActions, Filter, TodoActions, Todos},
    steps::Step,
    store::Store,
};

struct Route {
    primary: Facade,
    deferred: Facade,
    kinds: BTreeMap<String, OperationKind>,
}

impl Route {
    fn new<H: Handler>(slice: &Slice<H>, context: &DispatchContext, pure_by_default: bool) -> Self {
        let kinds = slice
            .classification()
            .declared()
            .iter()
            .filter_map(|name| slice.kind_of(name).map(|kind| (name.clone(), kind)))
            .collect();
        Self {
            primary: slice.facade(context.clone(), pure_by_default),
            deferred: slice.facade(context.clone(), false),
            kinds,
        }
    }

    fn facade_for(&self, operation: &str) -> &Facade {
        match self.kinds.get(operation) {
            Some(OperationKind::DeferredOperation) => &self.deferred,
            _ => &self.primary,
        }
    }
}

pub struct App {
    store: Store,
    runner: EffectRunner,
    context: DispatchContext,
    routes: BTreeMap<String, Route>,
}

impl App {
    pub fn bootstrap(settings: &Settings) -> anyhow::Result<Self> {
        let registry = DeferredRegistry::new();
        let context = DispatchContext::new();

        let counter = Slice::new(
            Counter {
                latency: settings.remote_latency(),
            },
            &registry,
        );
        let todos = Slice::new(
            Todos {
                latency: settings.remote_latency(),
            },
            &registry,
        );

        let runner = EffectRunner::with_config(
            registry.clone(),
            context.clone(),
            EffectRunnerConfig {
                timeout: settings.effect_timeout(),
                event_capacity: settings.event_capacity,
            },
        )?;
        let reducer = CombinedReducer::new()
            .with(counter.reducer())
            .with(todos.reducer());
        let store = Store::new(reducer, settings.event_capacity, Some(runner.clone()));
        context.register(store.clone());

        let mut routes = BTreeMap::new();
        routes.insert(
            counter.identity().to_string(),
            Route::new(&counter, &context, settings.pure_by_default),
        );
        routes.insert(
            todos.identity().to_string(),
            Route::new(&todos, &context, settings.pure_by_default),
        );
        info!(
            slices = routes.len(),
            deferred = registry.len(),
            pure_by_default = settings.pure_by_default,
            "demo store ready"
        );

        Ok(Self {
            store,
            runner,
            context,
            routes,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn runner(&self) -> &EffectRunner {
        &self.runner
    }

    pub fn apply(&self, step: &Step) -> anyhow::Result<Action> {
        let Some(route) = self.routes.get(&step.namespace) else {
            bail!(
                "unknown namespace '{}' (known: {})",
                step.namespace,
                self.routes.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };
        let action = route
            .facade_for(&step.operation)
            .call_value(&step.operation, step.payload.clone())
            .with_context(|| format!("step '{step}' failed"))?;
        debug!(step = %step, tag = action.tag(), "step dispatched");
        Ok(action)
    }

    pub async fn run_script(&self) -> anyhow::Result<()> {
        let counter = self.route("Counter")?;
        let todos = self.route("Todos")?;
        let counter_calls = CounterActions::new(counter.primary.clone());
        let counter_effects = CounterActions::new(counter.deferred.clone());
        let todo_calls = TodoActions::new(todos.primary.clone());
        let todo_effects = TodoActions::new(todos.deferred.clone());

        counter_calls.set_count(2)?;
        counter_calls.increment(3)?;
        counter_effects.fetch_remote(4)?;
        todo_effects.load(["write docs", "ship release"])?;
        self.runner.wait_idle().await;

        counter_calls.decrement(())?;
        todo_calls.add(json!({ "title": "celebrate" }))?;
        todo_calls.toggle(1)?;
        todo_calls.set_filter(Filter::Open)?;
        Ok(())
    }

    fn route(&self, namespace: &str) -> anyhow::Result<&Route> {
        self.routes
            .get(namespace)
            .with_context(|| format!("namespace '{namespace}' is not registered"))
    }

    /// Waits for outstanding deferred work, then unbinds the store.
    pub async fn shutdown(self) -> serde_json::Value {
        self.runner.wait_idle().await;
        self.context.shutdown();
        self.store.state()
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
