//! Integration tests for snapshot-to-view reconciliation.

use scribe_model::{EditorState, Node, NodeKey};
use scribe_reconciler::mock::MockViewHost;
use scribe_reconciler::Reconciler;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable tree the tests evolve between snapshots, so consecutive
/// snapshots share keys the way committed editor states do.
struct Tree {
    nodes: HashMap<NodeKey, Node>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeKey::root(), Node::element(NodeKey::root(), "root"));
        Tree { nodes }
    }

    fn add_element(&mut self, parent: &NodeKey, tag: &str) -> NodeKey {
        let mut node = Node::element(NodeKey::fresh(), tag);
        node.parent = Some(parent.clone());
        let key = node.key.clone();
        self.nodes
            .get_mut(parent)
            .unwrap()
            .children_mut()
            .unwrap()
            .push(key.clone());
        self.nodes.insert(key.clone(), node);
        key
    }

    fn add_text(&mut self, parent: &NodeKey, content: &str) -> NodeKey {
        let mut node = Node::text(NodeKey::fresh(), "text", content);
        node.parent = Some(parent.clone());
        let key = node.key.clone();
        self.nodes
            .get_mut(parent)
            .unwrap()
            .children_mut()
            .unwrap()
            .push(key.clone());
        self.nodes.insert(key.clone(), node);
        key
    }

    fn set_text(&mut self, key: &NodeKey, content: &str) {
        if let scribe_model::NodeBody::Text { content: c, .. } =
            &mut self.nodes.get_mut(key).unwrap().body
        {
            *c = content.to_string();
        }
    }

    fn move_node(&mut self, key: &NodeKey, new_parent: &NodeKey, index: usize) {
        let old_parent = self.nodes[key].parent.clone().unwrap();
        self.nodes
            .get_mut(&old_parent)
            .unwrap()
            .children_mut()
            .unwrap()
            .retain(|c| c != key);
        let children = self
            .nodes
            .get_mut(new_parent)
            .unwrap()
            .children_mut()
            .unwrap();
        let index = index.min(children.len());
        children.insert(index, key.clone());
        self.nodes.get_mut(key).unwrap().parent = Some(new_parent.clone());
    }

    fn remove(&mut self, key: &NodeKey) {
        if let Some(parent) = self.nodes[key].parent.clone() {
            self.nodes
                .get_mut(&parent)
                .unwrap()
                .children_mut()
                .unwrap()
                .retain(|c| c != key);
        }
        let mut stack = vec![key.clone()];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.remove(&k) {
                if let Some(children) = node.children() {
                    stack.extend(children.iter().cloned());
                }
            }
        }
    }

    fn snapshot(&self, version: u64) -> EditorState {
        let nodes = self
            .nodes
            .iter()
            .map(|(k, n)| (k.clone(), Arc::new(n.clone())))
            .collect();
        EditorState::from_parts(nodes, None, version)
    }
}

#[test]
fn test_initial_build_creates_all_mounts() {
    let mut tree = Tree::new();
    let para = tree.add_element(&NodeKey::root(), "paragraph");
    let text = tree.add_text(&para, "This works!");
    let next = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&next, &mut host).unwrap();

    assert_eq!(host.mount_count(), 3);
    let root_mount = reconciler.root_mount().unwrap();
    assert_eq!(host.child_keys(root_mount), vec![para.clone()]);

    let para_mount = reconciler.mount_of(&para).unwrap();
    assert_eq!(host.child_keys(para_mount), vec![text.clone()]);

    let text_mount = reconciler.mount_of(&text).unwrap();
    assert_eq!(host.mount(text_mount).unwrap().text.as_deref(), Some("This works!"));
}

#[test]
fn test_text_change_patches_in_place() {
    let mut tree = Tree::new();
    let para = tree.add_element(&NodeKey::root(), "paragraph");
    let text = tree.add_text(&para, "before");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();
    let text_mount = reconciler.mount_of(&text).unwrap();
    host.reset_counters();

    tree.set_text(&text, "after");
    let next = tree.snapshot(2);
    reconciler.reconcile(&prev, &next, &mut host).unwrap();

    assert_eq!(host.created, 0);
    assert_eq!(host.removed, 0);
    assert_eq!(host.moved, 0);
    assert_eq!(host.patched, 1);
    assert_eq!(reconciler.mount_of(&text), Some(text_mount));
    assert_eq!(host.mount(text_mount).unwrap().text.as_deref(), Some("after"));
}

#[test]
fn test_reorder_moves_existing_mounts() {
    let mut tree = Tree::new();
    let para = tree.add_element(&NodeKey::root(), "paragraph");
    let a = tree.add_text(&para, "a");
    let b = tree.add_text(&para, "b");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();
    host.reset_counters();

    tree.move_node(&b, &para, 0);
    let next = tree.snapshot(2);
    reconciler.reconcile(&prev, &next, &mut host).unwrap();

    assert_eq!(host.created, 0);
    assert_eq!(host.removed, 0);
    let para_mount = reconciler.mount_of(&para).unwrap();
    assert_eq!(host.child_keys(para_mount), vec![b, a]);
}

#[test]
fn test_cross_parent_move_preserves_mount() {
    let mut tree = Tree::new();
    let first = tree.add_element(&NodeKey::root(), "paragraph");
    let second = tree.add_element(&NodeKey::root(), "paragraph");
    let moved = tree.add_text(&first, "wanderer");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();
    let moved_mount = reconciler.mount_of(&moved).unwrap();
    host.reset_counters();

    tree.move_node(&moved, &second, 0);
    let next = tree.snapshot(2);
    reconciler.reconcile(&prev, &next, &mut host).unwrap();

    // Relocated, never destroyed and recreated.
    assert_eq!(host.created, 0);
    assert_eq!(host.removed, 0);
    assert_eq!(reconciler.mount_of(&moved), Some(moved_mount));
    assert_eq!(
        host.child_keys(reconciler.mount_of(&second).unwrap()),
        vec![moved]
    );
    assert!(host.child_keys(reconciler.mount_of(&first).unwrap()).is_empty());
}

#[test]
fn test_removed_subtree_is_torn_down() {
    let mut tree = Tree::new();
    let para = tree.add_element(&NodeKey::root(), "paragraph");
    tree.add_text(&para, "doomed");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();
    assert_eq!(host.mount_count(), 3);

    tree.remove(&para);
    let next = tree.snapshot(2);
    reconciler.reconcile(&prev, &next, &mut host).unwrap();

    assert_eq!(host.mount_count(), 1);
    assert!(reconciler.mount_of(&para).is_none());
}

#[test]
fn test_duplicate_reference_later_placement_wins() {
    let mut tree = Tree::new();
    let first = tree.add_element(&NodeKey::root(), "paragraph");
    let second = tree.add_element(&NodeKey::root(), "paragraph");
    let shared = tree.add_text(&first, "shared");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();

    // Corrupt the next snapshot: the same key listed under both parents.
    tree.nodes
        .get_mut(&second)
        .unwrap()
        .children_mut()
        .unwrap()
        .push(shared.clone());
    let next = tree.snapshot(2);
    reconciler.reconcile(&prev, &next, &mut host).unwrap();

    assert_eq!(
        host.child_keys(reconciler.mount_of(&second).unwrap()),
        vec![shared]
    );
    assert!(host.child_keys(reconciler.mount_of(&first).unwrap()).is_empty());
}

#[test]
fn test_host_failure_falls_back_to_full_rebuild() {
    let mut tree = Tree::new();
    let para = tree.add_element(&NodeKey::root(), "paragraph");
    let text = tree.add_text(&para, "before");
    let prev = tree.snapshot(1);

    let mut host = MockViewHost::new();
    let mut reconciler = Reconciler::new();
    reconciler.rebuild(&prev, &mut host).unwrap();

    // Corrupt the view behind the reconciler's back, then change the text so
    // the incremental pass has to touch the vanished mount.
    host.forget(reconciler.mount_of(&text).unwrap());
    tree.set_text(&text, "after");
    let next = tree.snapshot(2);

    let err = reconciler.reconcile(&prev, &next, &mut host);
    assert!(err.is_err());

    // The rebuilt view matches the next snapshot exactly.
    assert_eq!(host.mount_count(), 3);
    let text_mount = reconciler.mount_of(&text).unwrap();
    assert_eq!(host.mount(text_mount).unwrap().text.as_deref(), Some("after"));
}
