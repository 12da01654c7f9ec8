use std::sync::Mutex;

use serde_json::json;
use slice_core::{
    DispatchError, EffectContext, Handler, OperationSet, Reducer, Slice,
};

use super::*;

async fn fetch_remote(ctx: EffectContext, payload: Payload) -> anyhow::Result<Vec<Action>> {
    let base = payload.as_i64().context("fetchRemote expects a number")?;
    Ok(vec![ctx.action("setCount", json!(base * 10))])
}

async fn hang(_ctx: EffectContext, _payload: Payload) -> anyhow::Result<Vec<Action>> {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Ok(Vec::new())
}

async fn chain(ctx: EffectContext, payload: Payload) -> anyhow::Result<Vec<Action>> {
    Ok(vec![Action::from_tag(
        &slice_protocol::Tag::deferred(ctx.namespace(), "fetchRemote"),
        payload,
    )])
}

async fn explode(_ctx: EffectContext, _payload: Payload) -> anyhow::Result<Vec<Action>> {
    panic!("remote returned garbage")
}

struct Counter;

impl Handler for Counter {
    type State = i64;

    fn default_state(&self) -> i64 {
        0
    }

    fn operations(&self) -> OperationSet<i64> {
        OperationSet::<i64>::new()
            .transition("setCount", |_, payload| payload.as_i64().unwrap_or_default())
            .constant("count", 0)
            .deferred("fetchRemote", fetch_remote)
            .deferred("hang", hang)
            .deferred("chain", chain)
            .deferred("explode", explode)
    }
}

struct Harness {
    registry: DeferredRegistry,
    context: DispatchContext,
    state: Arc<Mutex<i64>>,
    slice: Slice<Counter>,
}

impl Harness {
    fn new() -> Self {
        let registry = DeferredRegistry::new();
        let slice = Slice::new(Counter, &registry);
        Self {
            registry,
            context: DispatchContext::new(),
            state: Arc::new(Mutex::new(0)),
            slice,
        }
    }

    fn runner(&self, timeout: Duration) -> EffectRunner {
        EffectRunner::with_config(
            self.registry.clone(),
            self.context.clone(),
            EffectRunnerConfig {
                timeout,
                event_capacity: 64,
            },
        )
        .expect("runner")
    }

    /// Sink applying the reducer and handing every action to the runner.
    fn install(&self, runner: EffectRunner) {
        let reducer: Reducer<i64> = self.slice.reducer();
        let state = Arc::clone(&self.state);
        self.context
            .register(move |action: Action| -> Result<Action, DispatchError> {
                {
                    let mut state = state.lock().expect("lock");
                    *state = reducer.reduce(Some(*state), &action);
                }
                runner.observe(&action);
                Ok(action)
            });
    }

    fn state(&self) -> i64 {
        *self.state.lock().expect("lock")
    }
}

#[test]
fn runner_requires_a_runtime() {
    let harness = Harness::new();
    assert!(EffectRunner::new(harness.registry.clone(), harness.context.clone()).is_err());
}

#[tokio::test]
async fn deferred_call_dispatches_follow_up_transition() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    let mut events = runner.subscribe_events();
    harness.install(runner.clone());

    let facade = harness.slice.facade(harness.context.clone(), false);
    facade.call("fetchRemote", 4).expect("dispatch");
    runner.wait_idle().await;

    assert_eq!(harness.state(), 40);
    assert_eq!(
        events.recv().await.expect("started"),
        EffectEvent::Started {
            tag: "Counter.fetchRemote@deferred".to_string()
        }
    );
    assert_eq!(
        events.recv().await.expect("completed"),
        EffectEvent::Completed {
            tag: "Counter.fetchRemote@deferred".to_string(),
            dispatched: 1
        }
    );
}

#[tokio::test]
async fn direct_actions_are_not_observed() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    harness.install(runner.clone());

    let facade = harness.slice.facade(harness.context.clone(), false);
    facade.call("setCount", 3).expect("dispatch");
    assert_eq!(runner.pending(), 0);
    assert_eq!(harness.state(), 3);
}

#[tokio::test]
async fn failing_operation_reports_and_leaves_state() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    let mut events = runner.subscribe_events();
    harness.install(runner.clone());

    let facade = harness.slice.facade(harness.context.clone(), false);
    facade.call("fetchRemote", "not a number").expect("dispatch");
    runner.wait_idle().await;

    assert_eq!(harness.state(), 0);
    let _started = events.recv().await.expect("started");
    match events.recv().await.expect("failed") {
        EffectEvent::Failed { tag, reason } => {
            assert_eq!(tag, "Counter.fetchRemote@deferred");
            assert!(reason.contains("expects a number"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_operation_times_out() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_millis(50));
    let mut events = runner.subscribe_events();
    harness.install(runner.clone());

    harness
        .slice
        .facade(harness.context.clone(), false)
        .call("hang", ())
        .expect("dispatch");
    runner.wait_idle().await;

    let _started = events.recv().await.expect("started");
    assert!(matches!(
        events.recv().await.expect("failed"),
        EffectEvent::Failed { reason, .. } if reason.contains("timed out")
    ));
}

#[tokio::test]
async fn panicking_operation_is_reported_and_releases_the_runner() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    let mut events = runner.subscribe_events();
    harness.install(runner.clone());

    harness
        .slice
        .facade(harness.context.clone(), false)
        .call("explode", ())
        .expect("dispatch");
    tokio::time::timeout(Duration::from_millis(500), runner.wait_idle())
        .await
        .expect("runner goes idle after a panic");

    assert_eq!(runner.pending(), 0);
    assert_eq!(harness.state(), 0);
    let _started = events.recv().await.expect("started");
    assert_eq!(
        events.recv().await.expect("failed"),
        EffectEvent::Failed {
            tag: "Counter.explode@deferred".to_string(),
            reason: "panicked".to_string()
        }
    );
}

#[tokio::test]
async fn aborted_operation_releases_its_pending_slot() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(3600));

    let action = Action::new("Counter.hang@deferred", Payload::Null).expect("action");
    let handle = runner.observe(&action).expect("spawned");
    assert_eq!(runner.pending(), 1);
    handle.abort();
    assert!(handle.await.expect_err("aborted").is_cancelled());

    tokio::time::timeout(Duration::from_millis(500), runner.wait_idle())
        .await
        .expect("runner goes idle after abort");
}

#[tokio::test]
async fn follow_up_deferred_actions_keep_the_runner_busy() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    harness.install(runner.clone());

    harness
        .slice
        .facade(harness.context.clone(), false)
        .call("chain", 2)
        .expect("dispatch");
    runner.wait_idle().await;

    assert_eq!(harness.state(), 20);
}

#[tokio::test]
async fn unregistered_deferred_tags_are_reported() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    let mut events = runner.subscribe_events();

    let action = Action::new("Ghost.load@deferred", Payload::Null).expect("action");
    assert!(runner.observe(&action).is_none());
    assert_eq!(
        events.recv().await.expect("event"),
        EffectEvent::Unregistered {
            tag: "Ghost.load@deferred".to_string()
        }
    );
}

#[tokio::test]
async fn run_consumes_a_broadcast_feed() {
    let harness = Harness::new();
    let runner = harness.runner(Duration::from_secs(5));
    let reducer = harness.slice.reducer();
    let state = Arc::clone(&harness.state);
    harness
        .context
        .register(move |action: Action| -> Result<Action, DispatchError> {
            let mut state = state.lock().expect("lock");
            *state = reducer.reduce(Some(*state), &action);
            Ok(action)
        });

    let (feed, rx) = broadcast::channel(16);
    let worker = tokio::spawn(runner.clone().run(rx));

    feed.send(Action::new("Counter.fetchRemote@deferred", json!(7)).expect("action"))
        .expect("send");
    drop(feed);
    worker.await.expect("runner task");

    assert_eq!(harness.state(), 70);
}
