/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end editor scenarios against the in-memory backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use euclid::default::Point2D;
use overlay_editor::{
    DragPhase, EditorConfig, EditorError, EditorNotification, EditorSession, EdgeProps,
    GraphIntent, InMemoryTransport, LayoutConfig, Level, NodeProps, NodeRecord, RawGraph,
    RecordRef, EdgeRecord, RemoteEvent, SessionState, TransportError, VERSION,
};

fn node_record(id: &str, level: u8, weight: f32, x: f32, y: f32) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        graph_id: None,
        weight,
        level,
        props: format!(r#"{{"label":"{id}","position":{{"x":{x},"y":{y}}}}}"#),
    }
}

fn edge_record(id: &str, from: &str, to: &str, level: u8) -> EdgeRecord {
    EdgeRecord {
        id: id.to_string(),
        graph_id: None,
        from: RecordRef::from(from),
        to: RecordRef::from(to),
        weight: 0.5,
        level,
        props: "{}".to_string(),
    }
}

fn source(id: &str, nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> RawGraph {
    RawGraph {
        id: id.to_string(),
        name: id.to_string(),
        level: None,
        nodes,
        edges,
    }
}

/// `g0` holds verified `v`; `g1` holds editable `a` (100,100) and `b`.
fn two_sources() -> Vec<RawGraph> {
    vec![
        source("g0", vec![node_record("v", 0, 0.9, 0.0, 0.0)], Vec::new()),
        source(
            "g1",
            vec![
                node_record("a", 1, 0.6, 100.0, 100.0),
                node_record("b", 1, 0.4, 300.0, 100.0),
            ],
            vec![edge_record("ab", "a", "b", 1)],
        ),
    ]
}

fn seeded_transport() -> InMemoryTransport {
    let transport = InMemoryTransport::new();
    for graph in two_sources() {
        transport.insert_graph(graph);
    }
    transport
}

fn started_session(transport: &InMemoryTransport) -> EditorSession {
    let config = EditorConfig::with_graph_ids(["g0", "g1"]);
    let mut session = EditorSession::new(config, Arc::new(transport.clone())).unwrap();
    session.init(two_sources());
    session
}

fn new_node_ids(session: &EditorSession, known: &[&str]) -> Vec<String> {
    session
        .graph()
        .nodes()
        .filter(|node| !known.contains(&node.id.as_str()))
        .map(|node| node.id.clone())
        .collect()
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}

#[tokio::test]
async fn created_node_attaches_to_first_editable_source() {
    let transport = InMemoryTransport::new();
    transport.insert_graph(source("g0", vec![node_record("a", 0, 0.5, 0.0, 0.0)], Vec::new()));
    transport.insert_graph(source("g1", vec![node_record("b", 1, 0.5, 10.0, 10.0)], Vec::new()));
    let config = EditorConfig::with_graph_ids(["g0", "g1"]);
    let mut session = EditorSession::new(config, Arc::new(transport.clone())).unwrap();

    session.init_from_transport();
    session.settle(Instant::now()).await;
    assert_eq!(session.primary_writable(), Some("g1"));
    assert_eq!(session.graph().get_node("a").unwrap().level, Level::Verified);
    assert_eq!(session.history().labels(), vec!["Load"]);

    session.apply_intents([GraphIntent::CreateNode {
        position: Point2D::new(40.0, 40.0),
        props: NodeProps::default(),
    }]);
    session.settle(Instant::now()).await;

    let created = new_node_ids(&session, &["a", "b"]);
    assert_eq!(created.len(), 1);
    let node = session.graph().get_node(&created[0]).unwrap();
    assert_eq!(node.origin, "g1");
    assert_eq!(node.level, Level::Editable);
    assert!(transport.graph("g1").unwrap().nodes.iter().any(|record| record.id == created[0]));
}

#[tokio::test]
async fn duplicate_offsets_fresh_editable_copy() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);

    session.apply_intents([GraphIntent::DuplicateNode { id: "a".into() }]);
    session.settle(Instant::now()).await;

    let created = new_node_ids(&session, &["v", "a", "b"]);
    assert_eq!(created.len(), 1);
    let copy = session.graph().get_node(&created[0]).unwrap();
    assert_ne!(copy.id, "a");
    assert_eq!(copy.level, Level::Editable);
    assert_eq!(copy.position(), Point2D::new(150.0, 150.0));
    assert_eq!(copy.props.label, "a");
    assert_eq!(session.history().labels(), vec!["Load", "Duplicate node"]);
}

#[tokio::test]
async fn rapid_drag_produces_one_save_with_final_position() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    let start = Instant::now();

    for step in 0..20u32 {
        session.apply_intents([GraphIntent::SetNodePosition {
            id: "a".into(),
            position: Point2D::new(100.0 + step as f32 * 5.0, 100.0),
            phase: DragPhase::Dragging,
        }]);
        session.tick(start + Duration::from_millis(u64::from(step) * 20));
    }
    let last = start + Duration::from_millis(19 * 20);
    session.tick(last + Duration::from_millis(499));
    session.tick(last + Duration::from_millis(500));
    session.tick(last + Duration::from_secs(5));

    let saves: Vec<_> = session
        .take_notifications()
        .into_iter()
        .filter_map(|notification| match notification {
            EditorNotification::Save { nodes, .. } => Some(nodes),
            _ => None,
        })
        .collect();
    assert_eq!(saves.len(), 1);
    let saved_a = saves[0].iter().find(|node| node.id == "a").unwrap();
    assert_eq!(saved_a.position(), Point2D::new(195.0, 100.0));
    assert_eq!(session.history().len(), 1, "drag frames never commit");
}

#[tokio::test]
async fn teardown_mid_animation_writes_nothing() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    let start = Instant::now();

    session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig {
        animated: true,
        animation_duration_ms: 500,
    })]);
    session.tick(start);
    session.tick(start + Duration::from_millis(200));
    assert!(session.is_animating());

    session.dispose();
    let frozen = session.graph().clone();
    session.take_notifications();
    session.tick(start + Duration::from_millis(600));
    session.tick(start + Duration::from_secs(2));

    assert_eq!(session.state(), SessionState::Disposed);
    assert!(!session.is_animating());
    assert_eq!(session.graph().to_parts(), frozen.to_parts());
    assert_eq!(session.history().labels(), vec!["Load"]);
    assert!(session.take_notifications().is_empty());
    assert_eq!(transport.mutation_count("updateNode"), 0);
    session.shutdown().await;
}

#[tokio::test]
async fn animated_layout_commits_once_when_finished() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    let start = Instant::now();

    session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::default())]);
    session.tick(start);
    session.tick(start + Duration::from_millis(250));
    assert_eq!(session.history().len(), 1);
    session.tick(start + Duration::from_millis(500));

    assert!(!session.is_animating());
    assert_eq!(session.history().labels(), vec!["Load", "Apply layout"]);
    assert_eq!(session.graph().get_node("v").unwrap().position(), Point2D::new(0.0, 0.0));
    assert!(session.take_notifications().contains(&EditorNotification::FitToView));
    assert_eq!(transport.mutation_count("updateNode"), 2);
}

#[tokio::test]
async fn remote_create_for_known_identity_is_deduplicated() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    let mut known = node_record("b", 1, 0.4, 300.0, 100.0);
    known.graph_id = Some("g1".into());
    let mut fresh = node_record("remote", 1, 0.5, 5.0, 5.0);
    fresh.graph_id = Some("g1".into());

    transport.publish("g1", RemoteEvent::NodeCreated(known));
    transport.publish("g1", RemoteEvent::NodeCreated(fresh));
    session.settle(Instant::now()).await;

    assert_eq!(session.graph().node_count(), 4);
    let remote = session.graph().get_node("remote").unwrap();
    assert_eq!(remote.origin, "g1");
    assert_eq!(session.history().len(), 1, "remote changes are not undoable");
}

#[tokio::test]
async fn locked_entities_survive_every_write_path() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    let before = session.graph().get_node("v").cloned();

    session.apply_intents([
        GraphIntent::SetNodePosition {
            id: "v".into(),
            position: Point2D::new(50.0, 50.0),
            phase: DragPhase::Released,
        },
        GraphIntent::UpdateNodeProps {
            id: "v".into(),
            props: NodeProps::labeled("renamed", Point2D::new(1.0, 1.0)),
            weight: Some(0.1),
        },
        GraphIntent::DeleteNode { id: "v".into() },
    ]);
    transport.publish("g1", RemoteEvent::NodeDeleted { id: "v".into() });
    session.settle(Instant::now()).await;

    assert_eq!(session.graph().get_node("v").cloned(), before);
    assert!(transport.mutations().is_empty());
}

#[tokio::test]
async fn verified_edge_pins_its_editable_endpoint() {
    let sources = vec![
        source(
            "g1",
            vec![
                node_record("a", 1, 0.6, 100.0, 100.0),
                node_record("b", 1, 0.4, 300.0, 100.0),
            ],
            vec![edge_record("ab", "a", "b", 1)],
        ),
        source(
            "g0",
            vec![node_record("v", 0, 0.9, 0.0, 0.0)],
            vec![edge_record("va", "v", "a", 0)],
        ),
    ];
    let transport = InMemoryTransport::new();
    for graph in &sources {
        transport.insert_graph(graph.clone());
    }
    let config = EditorConfig::with_graph_ids(["g1", "g0"]);
    let mut session = EditorSession::new(config, Arc::new(transport.clone())).unwrap();
    session.init(sources);
    assert_eq!(session.graph().get_edge("va").unwrap().level, Level::Verified);

    session.apply_intents([GraphIntent::DeleteNode { id: "a".into() }]);
    transport.publish("g1", RemoteEvent::NodeDeleted { id: "a".into() });
    session.settle(Instant::now()).await;

    assert!(session.graph().contains_node("a"));
    assert!(session.graph().contains_edge("va"));
    assert!(session.graph().contains_edge("ab"));
    assert_eq!(session.history().labels(), vec!["Load"]);
    assert_eq!(transport.mutation_count("deleteNode"), 0);
}

#[tokio::test]
async fn edge_to_locked_node_is_never_added() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);

    session.apply_intents([GraphIntent::CreateEdge {
        from: "a".into(),
        to: "v".into(),
        props: EdgeProps::default(),
    }]);
    let mut remote = edge_record("av", "a", "v", 1);
    remote.graph_id = Some("g1".into());
    transport.publish("g1", RemoteEvent::EdgeCreated(remote));
    session.settle(Instant::now()).await;

    assert!(session.graph().edges().all(|edge| !edge.touches("v")));
    assert_eq!(transport.mutation_count("createEdge"), 0);
}

#[tokio::test]
async fn failed_write_notifies_and_keeps_local_change() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);
    transport.fail_next(TransportError::Rejected("conflict".into()));

    session.apply_intents([GraphIntent::SetNodePosition {
        id: "b".into(),
        position: Point2D::new(10.0, 10.0),
        phase: DragPhase::Released,
    }]);
    session.settle(Instant::now()).await;

    assert_eq!(session.graph().get_node("b").unwrap().position(), Point2D::new(10.0, 10.0));
    assert!(session.take_notifications().contains(&EditorNotification::Error(
        EditorError::Transport {
            operation: "updateNode",
            source: TransportError::Rejected("conflict".into()),
        }
    )));
}

#[tokio::test]
async fn undo_and_redo_walk_committed_edits() {
    let transport = seeded_transport();
    let mut session = started_session(&transport);

    session.apply_intents([
        GraphIntent::SetNodePosition {
            id: "a".into(),
            position: Point2D::new(120.0, 100.0),
            phase: DragPhase::Released,
        },
        GraphIntent::DeleteEdge { id: "ab".into() },
    ]);
    assert_eq!(session.history().labels(), vec!["Load", "Move node", "Delete edge"]);

    session.apply_intents([GraphIntent::Undo, GraphIntent::Undo]);
    assert!(session.graph().contains_edge("ab"));
    assert_eq!(session.graph().get_node("a").unwrap().position(), Point2D::new(100.0, 100.0));
    assert!(!session.history().can_undo());

    session.apply_intents([GraphIntent::Redo]);
    assert_eq!(session.graph().get_node("a").unwrap().position(), Point2D::new(120.0, 100.0));
    assert!(session.graph().contains_edge("ab"));
}

#[tokio::test]
async fn failed_source_fetch_is_reported() {
    let transport = seeded_transport();
    transport.fail_next(TransportError::NotFound("g0".into()));
    let config = EditorConfig::with_graph_ids(["g0"]);
    let mut session = EditorSession::new(config, Arc::new(transport.clone())).unwrap();

    session.init_from_transport();
    session.settle(Instant::now()).await;

    assert!(session.graph().is_empty());
    assert!(session.take_notifications().iter().any(|notification| matches!(
        notification,
        EditorNotification::Error(EditorError::SourceLoad { graph_id, .. }) if graph_id == "g0"
    )));
}
