mod common;

use common::*;
use ferrodoc::ferrodoc_core::{Error, path::DocumentPath, types::Method};
use futures::{StreamExt, TryStreamExt};
use serde_json::{Map, json};
use tonic::Status;

#[tokio::test]
async fn listen_decorates_every_written_message() {
    let script = Script::new();
    script.push_stream(
        Method::Listen,
        StreamScript::Items(vec![Ok(json!({"targetChange": {"targetIds": [1]}}))]),
    );
    // Project id is detected, so the request is built with the placeholder.
    let db = database(&script, ferrodoc::Settings::default());

    let listen = db
        .listen(json!({
            "documents": {"documents": ["projects/{{projectId}}/databases/(default)/documents/users/a"]},
            "targetId": 1,
        }))
        .await
        .unwrap();
    listen
        .send(json!({
            "database": "projects/{{projectId}}/databases/(default)",
            "removeTarget": 1,
        }))
        .await
        .unwrap();

    let (sink, responses) = listen.split();
    drop(sink);
    let responses: Vec<_> = responses.try_collect().await.unwrap();
    assert_eq!(responses, vec![json!({"targetChange": {"targetIds": [1]}})]);

    // Let the transport drain the outbound half.
    for _ in 0..10 {
        if script.outbound().len() == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let call = &script.calls_to(Method::Listen)[0];
    assert_eq!(
        call.resource_prefix.as_deref(),
        Some("projects/detected-project/databases/(default)")
    );
    assert_eq!(
        call.payload,
        json!({
            "database": "projects/detected-project/databases/(default)",
            "addTarget": {
                "documents": {"documents": ["projects/detected-project/databases/(default)/documents/users/a"]},
                "targetId": 1,
            },
        })
    );
    let outbound = script.outbound();
    assert_eq!(outbound.len(), 2);
    assert_eq!(
        outbound[1],
        json!({
            "database": "projects/detected-project/databases/(default)",
            "removeTarget": 1,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn listen_retries_calls_that_fail_to_open() {
    let script = Script::new();
    script
        .push_stream(Method::Listen, StreamScript::Fail(unavailable("connecting")))
        .push_stream(Method::Listen, StreamScript::Items(Vec::new()));
    let db = database(&script, settings());

    let mut listen = db.listen(json!({"targetId": 1})).await.unwrap();
    assert!(listen.next().await.is_none());
    assert_eq!(script.calls_to(Method::Listen).len(), 2);
}

#[tokio::test]
async fn run_query_yields_documents_only() {
    let script = Script::new();
    script.push_stream(
        Method::RunQuery,
        StreamScript::Items(vec![
            Ok(json!({
                "document": {"name": document_name("posts/p1"), "fields": {}},
                "readTime": "t1",
            })),
            Ok(json!({"readTime": "t2", "skippedResults": 3})),
            Ok(json!({
                "document": {"name": document_name("posts/p2"), "fields": {}},
                "readTime": "t3",
            })),
        ]),
    );
    let db = database(&script, settings());

    let query = json!({"from": [{"collectionId": "posts"}]});
    let snapshots: Vec<_> = db
        .run_query(None, query.clone())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = snapshots.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    let call = &script.calls_to(Method::RunQuery)[0];
    assert_eq!(
        call.payload,
        json!({
            "parent": "projects/demo/databases/(default)/documents",
            "structuredQuery": query,
        })
    );
}

#[tokio::test]
async fn write_batch_commits_once() {
    let script = Script::new();
    script.push_unary(Method::Commit, Err(Status::unavailable("busy").into()));
    let db = database(&script, settings());
    let path = DocumentPath::parse("users/alice").unwrap();

    let mut batch = db.batch();
    batch.create(&path, Map::new()).delete(&path);
    assert_eq!(batch.len(), 2);

    // Commits are not idempotent, so even a transient failure is final.
    let result = batch.commit().await;
    assert!(matches!(result, Err(Error::Rpc(_))));
    assert_eq!(script.calls_to(Method::Commit).len(), 1);

    let response = db.batch().commit().await.unwrap();
    assert_eq!(response.commit_time.as_deref(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(script.calls_to(Method::Commit)[1].payload["writes"], json!([]));
}
