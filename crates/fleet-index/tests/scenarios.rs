//! End-to-end index-substrate scenarios.

use fleet_core::Identifier;
use fleet_index::{GraphIndex, Quad, QueryFilter, VectorIndex, WILDCARD, parse_graph_query};
use fleet_storage::NullStore;
use std::sync::Arc;

fn doc(name: &str) -> Identifier {
    Identifier::new("resource.Document", name)
}

#[tokio::test]
async fn vector_recall_stops_before_budget_is_exceeded() {
    let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
    idx.add(doc("v1").with_tokens(10), vec![1.0, 0.0, 0.0]).await.unwrap();
    idx.add(doc("v2").with_tokens(15), vec![0.9, 0.1, 0.0]).await.unwrap();
    idx.add(doc("v3").with_tokens(20), vec![0.0, 0.0, 1.0]).await.unwrap();

    let filter = QueryFilter::unlimited().with_max_tokens(20);
    let results = idx.query_items(&[vec![1.0, 0.0, 0.0]], 0.5, &filter).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier.name, "v1");
}

fn node(name: &str) -> Identifier {
    Identifier::new("common.Resource", name)
}

#[tokio::test]
async fn graph_query_returns_only_matching_subject() {
    let idx = GraphIndex::new(Arc::new(NullStore::new()), "graph");
    idx.add(
        node("m1"),
        vec![Quad {
            subject: node("m1").to_canonical(),
            predicate: "rdf:type".into(),
            object: "schema:Message".into(),
            graph: None,
        }],
    )
    .await
    .unwrap();
    idx.add(
        node("t1"),
        vec![Quad {
            subject: node("t1").to_canonical(),
            predicate: "rdf:type".into(),
            object: "schema:ToolFunction".into(),
            graph: None,
        }],
    )
    .await
    .unwrap();

    let results = idx
        .query_items((WILDCARD, "rdf:type", "schema:Message"), &QueryFilter::unlimited())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier.name, "m1");

    // The same pattern, arriving as a text query line.
    let (subject, predicate, object) = parse_graph_query(r#"? rdf:type "schema:Message""#).unwrap();
    let parsed_results = idx
        .query_items((&subject, &predicate, &object), &QueryFilter::unlimited())
        .await;
    assert_eq!(parsed_results.len(), 1);
    assert_eq!(parsed_results[0].identifier.name, "m1");
}
