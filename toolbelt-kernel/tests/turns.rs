use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use toolbelt_config::RegistryConfig;
use toolbelt_kernel::{ToolRegistry, TurnError, TurnState};
use toolbelt_primitives::{Descriptor, ToolId};
use toolbelt_tools::{ErrorKind, ToolError};

fn id(raw: &str) -> ToolId {
    ToolId::new(raw).unwrap()
}

fn descriptor(raw: &str, keywords: &[&str]) -> Descriptor {
    Descriptor::builder(id(raw))
        .name(raw)
        .and_then(|b| b.keywords(keywords.iter().copied()))
        .and_then(|b| b.build())
        .unwrap()
}

fn registry() -> ToolRegistry {
    let config = RegistryConfig {
        core: vec![id("clock")],
        ..RegistryConfig::default()
    };
    ToolRegistry::builder()
        .config(config)
        .descriptor(descriptor("calc", &["math", "calculate"]))
        .descriptor(descriptor("search", &["web", "lookup"]))
        .descriptor(descriptor("clock", &["time"]))
        .descriptor(descriptor("sleepy", &["nap"]))
        .bind_tool(id("calc"), |input: Value| async move {
            let a = input["a"].as_i64().unwrap_or_default();
            let b = input["b"].as_i64().unwrap_or_default();
            Ok::<_, ToolError>(json!(a + b))
        })
        .bind_tool(id("clock"), |_: Value| async move {
            Ok::<_, ToolError>(json!("12:00"))
        })
        .bind_tool(id("sleepy"), |_: Value| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ToolError>(Value::Null)
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn turn_walks_through_every_state() {
    let registry = registry();
    let mut turn = registry.begin_turn();
    assert_eq!(turn.state(), TurnState::Idle);

    assert_eq!(turn.rank("calculate a sum", 3).unwrap(), [id("calc")]);
    assert_eq!(turn.state(), TurnState::Ranking);

    assert_eq!(turn.union().unwrap(), [id("calc"), id("clock")]);
    assert_eq!(turn.state(), TurnState::Unioned);

    let loaded = turn.load().await.unwrap();
    assert_eq!(loaded, vec![id("calc"), id("clock")]);
    assert_eq!(turn.state(), TurnState::Ready);

    let sum = turn
        .invoke(&id("calc"), json!({ "a": 2, "b": 2 }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sum, json!(4));
    assert_eq!(turn.state(), TurnState::Ready);

    let time = turn.invoke(&id("clock"), Value::Null).await.unwrap().unwrap();
    assert_eq!(time, json!("12:00"));

    let summary = turn.finish().unwrap();
    assert_eq!(summary.selected, vec![id("calc"), id("clock")]);
    assert_eq!(summary.invocations.len(), 2);
    assert!(summary.invocations.iter().all(|record| record.error.is_none()));
}

#[tokio::test]
async fn out_of_order_steps_are_rejected() {
    let registry = registry();
    let mut turn = registry.begin_turn();

    let err = turn
        .invoke(&id("calc"), Value::Null)
        .await
        .expect_err("invoking before ready must fail");
    assert!(matches!(
        err,
        TurnError::InvalidTransition {
            from: TurnState::Idle,
            ..
        }
    ));

    assert!(turn.union().is_err());
    assert!(turn.load().await.is_err());
    assert_eq!(turn.state(), TurnState::Idle);
}

#[tokio::test]
async fn tools_outside_the_selection_cannot_be_invoked() {
    let registry = registry();
    let mut turn = registry.begin_turn();
    turn.prepare("calculate", 1).await.unwrap();

    let err = turn
        .invoke(&id("search"), Value::Null)
        .await
        .expect_err("search was never selected");
    assert!(matches!(err, TurnError::NotLoaded { ref tool, .. } if *tool == id("search")));
    assert_eq!(turn.state(), TurnState::Ready);
}

#[tokio::test]
async fn failed_ranking_still_yields_core_tools() {
    let registry = registry();
    let mut turn = registry.begin_turn();

    let loaded = turn.prepare("?!", 5).await.unwrap();
    assert!(turn.ranked().is_empty());
    assert_eq!(loaded, vec![id("clock")]);
}

#[tokio::test]
async fn cancelling_one_turn_leaves_others_running() {
    let registry = Arc::new(registry());

    let mut doomed = registry.begin_turn();
    doomed.prepare("nap", 1).await.unwrap();
    let token = doomed.cancellation_token();

    let mut healthy = registry.begin_turn();
    healthy.prepare("calculate", 1).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let sleepy = id("sleepy");
    let calc = id("calc");
    let (cancelled, computed) = tokio::join!(
        doomed.invoke(&sleepy, Value::Null),
        healthy.invoke(&calc, json!({ "a": 1, "b": 2 }))
    );

    assert_eq!(cancelled.unwrap().unwrap_err().kind(), ErrorKind::Cancelled);
    assert_eq!(computed.unwrap().unwrap(), json!(3));

    let summary = doomed.finish().unwrap();
    assert_eq!(summary.invocations[0].error, Some(ErrorKind::Cancelled));
}

#[tokio::test]
async fn abandoned_invocation_leaves_turn_ready() {
    let registry = registry();
    let mut turn = registry.begin_turn();
    turn.prepare("nap", 1).await.unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        turn.invoke(&id("sleepy"), Value::Null),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(turn.state(), TurnState::Ready);

    let time = turn.invoke(&id("clock"), Value::Null).await.unwrap().unwrap();
    assert_eq!(time, json!("12:00"));

    let summary = turn.finish().unwrap();
    assert_eq!(summary.invocations.len(), 1);
    assert_eq!(summary.invocations[0].tool, id("clock"));
}

#[tokio::test]
async fn abandoned_load_leaves_turn_ready() {
    let registry = ToolRegistry::builder()
        .descriptor(descriptor("remote", &["remote"]))
        .bind(id("remote"), |_: ToolId| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err::<Arc<dyn toolbelt_tools::Tool>, _>(ToolError::unavailable("unreachable"))
        })
        .build()
        .unwrap();
    let mut turn = registry.begin_turn();
    turn.rank("remote", 1).unwrap();
    turn.union().unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(20), turn.load()).await;
    assert!(abandoned.is_err());
    assert_eq!(turn.state(), TurnState::Ready);
    assert!(turn.handle(&id("remote")).is_none());
    assert!(turn.finish().unwrap().loaded.is_empty());
}
