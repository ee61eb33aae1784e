use mindgraph_app::{ControllerError, MindMapConfig, MindMapController};
use mindgraph_core::{NodeId, NodeKind, ThemeMode, TreeError};
use mindgraph_events::{Event, ReplaceOrigin};
use mindgraph_storage::Storage;
use std::time::Duration;

const SAMPLE: &str = r#"{"a": 1, "b": {"c": 2}}"#;

fn controller() -> MindMapController {
    MindMapController::with_seed(MindMapConfig::default(), 42)
}

fn loaded() -> MindMapController {
    let mut controller = controller();
    controller.apply_input(SAMPLE).unwrap();
    controller
}

fn child(controller: &MindMapController, key: &str) -> NodeId {
    controller
        .tree()
        .root()
        .unwrap()
        .children()
        .iter()
        .find(|c| c.key() == key)
        .unwrap()
        .id()
}

fn counts(controller: &MindMapController) -> (usize, usize) {
    (
        controller.graph().node_count(),
        controller.graph().link_count(),
    )
}

#[test]
fn test_input_builds_visible_graph() {
    let controller = loaded();
    assert_eq!(counts(&controller), (4, 3));
    assert_eq!(controller.input(), SAMPLE);

    let root = controller.tree().root().unwrap().id();
    let b = child(&controller, "b");
    let from_root = controller
        .graph()
        .links()
        .iter()
        .filter(|link| link.source == root)
        .count();
    assert_eq!(from_root, 2);
    assert!(controller.graph().links().iter().any(|link| link.source == b));
}

#[test]
fn test_delete_subtree_and_undo_redo() {
    let mut controller = loaded();
    let original = controller.tree().clone();
    let b = child(&controller, "b");

    assert_eq!(controller.delete_node(b).unwrap(), 2);
    assert_eq!(counts(&controller), (2, 1));
    let after_delete = controller.tree().clone();

    controller.undo().unwrap();
    assert!(controller.tree().content_eq(&original));
    assert_eq!(counts(&controller), (4, 3));

    controller.redo().unwrap();
    assert!(controller.tree().content_eq(&after_delete));
    assert_eq!(counts(&controller), (2, 1));
}

#[test]
fn test_collapse_root_then_expand_all() {
    let mut controller = loaded();
    let root = controller.tree().root().unwrap().id();

    assert!(controller.set_collapsed(root, true).unwrap());
    assert_eq!(counts(&controller), (1, 0));

    assert_eq!(controller.expand_all().unwrap(), 1);
    assert_eq!(counts(&controller), (4, 3));
}

#[test]
fn test_root_deletion_is_rejected() {
    let mut controller = loaded();
    let events = controller.events();
    let _ = events.try_iter().count();
    let history = controller.history().len();
    let root = controller.tree().root().unwrap().id();

    let err = controller.delete_node(root).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Structural(TreeError::RootDeletion)
    ));
    assert_eq!(counts(&controller), (4, 3));
    assert_eq!(controller.history().len(), history);
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, Event::StructuralRejected { .. }))
    );
}

#[test]
fn test_parse_failure_keeps_tree() {
    let mut controller = loaded();
    let events = controller.events();
    let _ = events.try_iter().count();
    let before = controller.tree().clone();
    let history = controller.history().len();

    assert!(matches!(
        controller.apply_input("{\"a\": [1,"),
        Err(ControllerError::Parse(_))
    ));
    assert!(controller.tree().content_eq(&before));
    assert_eq!(controller.input(), SAMPLE);
    assert_eq!(controller.history().len(), history);
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, Event::ParseFailed { .. }))
    );
}

#[test]
fn test_yaml_input_is_accepted() {
    let mut controller = controller();
    assert_eq!(controller.apply_input("a: 1\nb:\n  c: 2\n").unwrap(), 4);
    assert_eq!(counts(&controller), (4, 3));
}

#[test]
fn test_history_is_bounded() {
    let mut controller = loaded();
    let a = child(&controller, "a");
    for i in 0..60 {
        controller.begin_edit(a).unwrap();
        controller.update_edit(&format!("label {i}"));
        assert!(controller.commit_edit().unwrap());
    }
    assert_eq!(controller.history().len(), 50);

    let mut undone = 0;
    while controller.undo().is_ok() {
        undone += 1;
    }
    assert_eq!(undone, 49);
    assert!(!controller.can_undo());
}

#[test]
fn test_surviving_nodes_keep_identity_and_position() {
    let mut controller = loaded();
    controller.settle(1000);
    let a = child(&controller, "a");
    let position = controller.graph().node(a).unwrap().position;

    controller.delete_node(child(&controller, "b")).unwrap();
    let node = controller.graph().node(a).unwrap();
    assert_eq!(node.position, position);
    assert!(!controller.is_settled());
}

#[test]
fn test_empty_history_reports_info() {
    let mut controller = controller();
    let events = controller.events();
    assert!(matches!(
        controller.undo(),
        Err(ControllerError::NothingToRestore(_))
    ));
    assert!(matches!(
        controller.redo(),
        Err(ControllerError::NothingToRestore(_))
    ));
    let infos = events
        .try_iter()
        .filter(|e| matches!(e, Event::ShowInfo { .. }))
        .count();
    assert_eq!(infos, 2);
}

#[test]
fn test_session_round_trip_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mindgraph.db");

    let mut first = controller().with_storage(Storage::open(&path).unwrap());
    first.apply_input(SAMPLE).unwrap();
    let b = child(&first, "b");
    first.set_collapsed(b, true).unwrap();
    assert_eq!(first.toggle_theme().unwrap(), ThemeMode::Dark);
    first.save_session().unwrap();

    let mut second = controller().with_storage(Storage::open(&path).unwrap());
    assert_eq!(second.settings().theme, ThemeMode::Dark);
    let events = second.events();
    assert!(second.load_session().unwrap());
    assert!(
        second
            .tree()
            .root()
            .unwrap()
            .structurally_eq(first.tree().root().unwrap())
    );
    assert_eq!(second.input(), SAMPLE);
    assert_eq!(counts(&second), (3, 2));
    assert!(events.try_iter().any(|e| matches!(
        e,
        Event::TreeReplaced {
            origin: ReplaceOrigin::Session,
            ..
        }
    )));

    assert!(second.clear_session().unwrap());
    assert!(!second.load_session().unwrap());
}

#[test]
fn test_share_round_trip() {
    let mut source = loaded();
    let b = child(&source, "b");
    source.set_collapsed(b, true).unwrap();
    let url = source.share_url("https://example.org/map").unwrap();

    let mut target = controller();
    assert_eq!(target.load_share_url(&url).unwrap(), 4);
    assert!(
        target
            .tree()
            .root()
            .unwrap()
            .structurally_eq(source.tree().root().unwrap())
    );
    assert_eq!(counts(&target), (3, 2));
    let reparsed: serde_json::Value = serde_json::from_str(target.input()).unwrap();
    assert_eq!(reparsed, serde_json::from_str::<serde_json::Value>(SAMPLE).unwrap());
}

fn deep_document(levels: usize) -> String {
    format!("{}1{}", "[".repeat(levels), "]".repeat(levels))
}

#[test]
fn test_deep_document_survives_share_and_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mindgraph.db");
    let text = deep_document(100);

    let mut source = controller().with_storage(Storage::open(&path).unwrap());
    assert_eq!(source.apply_input(&text).unwrap(), 101);
    assert_eq!(source.stats().max_depth, 100);
    let token = source.share_token().unwrap();
    source.save_session().unwrap();

    let mut shared = controller();
    assert_eq!(shared.load_share(&token).unwrap(), 101);
    assert!(
        shared
            .tree()
            .root()
            .unwrap()
            .structurally_eq(source.tree().root().unwrap())
    );

    let mut restored = controller().with_storage(Storage::open(&path).unwrap());
    assert!(restored.load_session().unwrap());
    assert_eq!(restored.input(), text);
    assert!(
        restored
            .tree()
            .root()
            .unwrap()
            .structurally_eq(source.tree().root().unwrap())
    );
}

#[test]
fn test_bad_share_token_keeps_tree() {
    let mut controller = loaded();
    let before = controller.tree().clone();
    assert!(matches!(
        controller.load_share("not*base64"),
        Err(ControllerError::Share(_))
    ));
    assert!(controller.tree().content_eq(&before));
}

#[test]
fn test_background_parse_applies_latest_only() {
    let mut controller = controller();
    controller.submit_input("[1, 2, 3]");
    controller.submit_input(SAMPLE);

    let applied = controller.wait_parse(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(applied, 4);
    assert_eq!(controller.tree().root().unwrap().kind(), NodeKind::OBJECT);
    assert_eq!(controller.input(), SAMPLE);
    assert!(controller.poll_parse().is_none());
}

#[test]
fn test_sync_input_supersedes_background_parse() {
    let mut controller = controller();
    controller.submit_input("[1, 2, 3]");
    controller.apply_input(SAMPLE).unwrap();

    assert!(controller.wait_parse(Duration::from_millis(200)).is_none());
    assert_eq!(counts(&controller), (4, 3));
}

#[test]
fn test_export_reflects_visible_graph() {
    let mut controller = loaded();
    controller.set_collapsed(child(&controller, "b"), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&controller.export_json().unwrap()).unwrap();
    assert_eq!(value["metadata"]["nodes"], 3);
    assert_eq!(value["metadata"]["links"], 2);
    assert_eq!(value["originalData"], SAMPLE);
}

#[test]
fn test_export_without_tree_fails() {
    let controller = controller();
    let events = controller.events();
    assert!(matches!(
        controller.export_json(),
        Err(ControllerError::Export(_))
    ));
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, Event::ExportFailed { .. }))
    );
}

#[test]
fn test_large_document_warns() {
    let mut config = MindMapConfig::default();
    config.performance.large_data_threshold = 3;
    let mut controller = MindMapController::with_seed(config, 1);
    let events = controller.events();
    controller.apply_input(SAMPLE).unwrap();
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, Event::ShowWarning { .. }))
    );
}
