//! Tests for the update scheduler: batching, callback ordering, discard
//! semantics, and error delivery.

use scribe_editor::{
    Editor, EditorConfig, EditorError, NodeKey, NodeSpec, Selection, UpdateOptions,
};
use scribe_model::ModelError;
use std::cell::RefCell;
use std::rc::Rc;

fn new_editor() -> Editor {
    Editor::new(EditorConfig::new().with_nodes(vec![
        NodeSpec::element("paragraph"),
        NodeSpec::text("text"),
    ]))
    .unwrap()
}

fn append_paragraph(editor: &mut Editor) -> NodeKey {
    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let para = ctx.create_element("paragraph")?;
                ctx.append_child(&root, &para)
            },
            UpdateOptions::new(),
        )
        .unwrap();
    let children = editor.state().child_keys(&NodeKey::root());
    children[children.len() - 1].clone()
}

#[test]
fn test_mutator_fault_discards_whole_transaction() {
    let mut editor = new_editor();

    let result = editor.update(
        |ctx| {
            let root = ctx.root();
            let para = ctx.create_element("paragraph")?;
            ctx.append_child(&root, &para)?;
            // Fails after the draft already holds work.
            ctx.create_element("banner")?;
            Ok(())
        },
        UpdateOptions::new(),
    );

    // No error listener registered, so the failure is fatal to the caller
    // and nothing committed.
    assert!(matches!(
        result,
        Err(EditorError::Mutation(ModelError::UnknownTag(_)))
    ));
    assert_eq!(editor.state().version(), 0);
    assert!(editor.state().child_keys(&NodeKey::root()).is_empty());
}

#[test]
fn test_error_listener_absorbs_mutator_fault() {
    let mut editor = new_editor();

    let errors: Rc<RefCell<Vec<EditorError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    editor.on_error(move |err| sink.borrow_mut().push(err.clone()));

    let updates = Rc::new(RefCell::new(0usize));
    let counter = updates.clone();
    editor.on_update(move |_| *counter.borrow_mut() += 1);

    let fired = Rc::new(RefCell::new(false));
    let flag = fired.clone();
    let result = editor.update(
        |ctx| {
            ctx.create_element("banner")?;
            Ok(())
        },
        UpdateOptions::new().on_commit(move |_| *flag.borrow_mut() = true),
    );

    // Delivered through the bus: the call resolves, no update event, no
    // callback, snapshot untouched.
    assert!(result.is_ok());
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(*updates.borrow(), 0);
    assert!(!*fired.borrow());
    assert_eq!(editor.state().version(), 0);
}

#[test]
fn test_clean_transaction_skips_commit_and_callbacks() {
    let mut editor = new_editor();

    let updates = Rc::new(RefCell::new(0usize));
    let counter = updates.clone();
    editor.on_update(move |_| *counter.borrow_mut() += 1);

    let fired = Rc::new(RefCell::new(false));
    let flag = fired.clone();
    editor
        .update(
            |_ctx| Ok(()),
            UpdateOptions::new().on_commit(move |_| *flag.borrow_mut() = true),
        )
        .unwrap();

    assert_eq!(editor.state().version(), 0);
    assert_eq!(*updates.borrow(), 0);
    assert!(!*fired.borrow());
}

#[test]
fn test_selection_only_update_commits_quietly() {
    let mut editor = new_editor();
    let para = append_paragraph(&mut editor);
    let version = editor.state().version();

    let updates = Rc::new(RefCell::new(0usize));
    let counter = updates.clone();
    editor.on_update(move |_| *counter.borrow_mut() += 1);

    let target = para.clone();
    editor
        .update(
            move |ctx| {
                ctx.set_selection(Some(Selection::collapsed(target, 0)));
                Ok(())
            },
            UpdateOptions::new(),
        )
        .unwrap();

    // The selection landed in the snapshot but no update event fired.
    assert_eq!(
        editor.state().selection().map(|s| s.anchor.key.clone()),
        Some(para)
    );
    assert!(editor.state().version() > version);
    assert_eq!(*updates.borrow(), 0);
}

#[test]
fn test_nested_callbacks_fire_in_issue_order() {
    let mut editor = new_editor();

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let (d, e, f) = (order.clone(), order.clone(), order.clone());

    editor
        .update(
            move |ctx| {
                ctx.update(
                    move |ctx| {
                        ctx.update(
                            |ctx| {
                                let root = ctx.root();
                                let para = ctx.create_element("paragraph")?;
                                ctx.append_child(&root, &para)
                            },
                            UpdateOptions::new().on_commit(move |_| f.borrow_mut().push("F")),
                        )
                    },
                    UpdateOptions::new().on_commit(move |_| e.borrow_mut().push("E")),
                )
            },
            UpdateOptions::new().on_commit(move |_| d.borrow_mut().push("D")),
        )
        .unwrap();

    assert_eq!(*order.borrow(), vec!["D", "E", "F"]);
    // One transaction, one commit.
    assert_eq!(editor.state().version(), 1);
}

#[test]
fn test_callback_issued_updates_merge_into_one_wave() {
    let mut editor = new_editor();

    let versions: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = versions.clone();
    editor.on_update(move |event| seen.borrow_mut().push(event.version));

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let (outer, first, second) = (order.clone(), order.clone(), order.clone());

    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let para = ctx.create_element("paragraph")?;
                ctx.append_child(&root, &para)
            },
            UpdateOptions::new().on_commit(move |editor| {
                outer.borrow_mut().push("outer");
                editor
                    .update(
                        |ctx| {
                            let root = ctx.root();
                            let para = ctx.create_element("paragraph")?;
                            ctx.append_child(&root, &para)
                        },
                        UpdateOptions::new().on_commit(move |_| first.borrow_mut().push("first")),
                    )
                    .unwrap();
                editor
                    .update(
                        |ctx| {
                            let root = ctx.root();
                            let para = ctx.create_element("paragraph")?;
                            ctx.append_child(&root, &para)
                        },
                        UpdateOptions::new().on_commit(move |_| second.borrow_mut().push("second")),
                    )
                    .unwrap();
            }),
        )
        .unwrap();

    // The two callback-issued entries shared one transaction: two update
    // events total, not three, and all three paragraphs landed.
    assert_eq!(*versions.borrow(), vec![1, 2]);
    assert_eq!(*order.borrow(), vec!["outer", "first", "second"]);
    assert_eq!(editor.state().child_keys(&NodeKey::root()).len(), 3);
}

#[test]
fn test_discrete_update_jumps_the_queue() {
    let mut editor = new_editor();

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let (queued, discrete) = (order.clone(), order.clone());

    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let para = ctx.create_element("paragraph")?;
                ctx.append_child(&root, &para)
            },
            UpdateOptions::new().on_commit(move |editor| {
                editor
                    .update(
                        |ctx| {
                            let root = ctx.root();
                            let para = ctx.create_element("paragraph")?;
                            ctx.append_child(&root, &para)
                        },
                        UpdateOptions::new().on_commit(move |_| queued.borrow_mut().push("queued")),
                    )
                    .unwrap();
                editor
                    .update(
                        |ctx| {
                            let root = ctx.root();
                            let para = ctx.create_element("paragraph")?;
                            ctx.append_child(&root, &para)
                        },
                        UpdateOptions::new()
                            .discrete()
                            .on_commit(move |_| discrete.borrow_mut().push("discrete")),
                    )
                    .unwrap();
            }),
        )
        .unwrap();

    // The discrete call committed synchronously inside the callback, before
    // the queued entry's wave ran.
    assert_eq!(*order.borrow(), vec!["discrete", "queued"]);
    assert_eq!(editor.state().child_keys(&NodeKey::root()).len(), 3);
}

#[test]
fn test_runaway_transform_discards_and_reports_once() {
    let mut editor = new_editor();

    let errors: Rc<RefCell<Vec<EditorError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    editor.on_error(move |err| sink.borrow_mut().push(err.clone()));

    // Re-dirties its own node on every pass and never converges.
    editor
        .add_transform("text", |ctx, key| ctx.mark_dirty(key))
        .unwrap();

    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let text = ctx.create_text("text", "loop")?;
                ctx.append_child(&root, &text)
            },
            UpdateOptions::new(),
        )
        .unwrap();

    assert_eq!(errors.borrow().len(), 1);
    assert!(matches!(
        errors.borrow()[0],
        EditorError::TransformRunaway { .. }
    ));
    // The whole transaction was thrown away.
    assert_eq!(editor.state().version(), 0);
    assert!(editor.state().child_keys(&NodeKey::root()).is_empty());
}

#[test]
fn test_merged_moves_keep_last_assignment() {
    let mut editor = new_editor();
    let a = append_paragraph(&mut editor);
    let b = append_paragraph(&mut editor);
    let text = {
        let parent = a.clone();
        editor
            .update(
                move |ctx| {
                    let text = ctx.create_text("text", "mover")?;
                    ctx.append_child(&parent, &text)
                },
                UpdateOptions::new(),
            )
            .unwrap();
        editor.state().child_keys(&a)[0].clone()
    };

    // Two queued entries moving the same node merge into one transaction;
    // the later assignment wins and the committed snapshot is still a tree.
    let (m1, t1) = (text.clone(), a.clone());
    let (m2, t2) = (text.clone(), b.clone());
    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let para = ctx.create_element("paragraph")?;
                ctx.append_child(&root, &para)
            },
            UpdateOptions::new().on_commit(move |editor| {
                editor
                    .update(
                        move |ctx| ctx.move_node(&m1, &t1, 0),
                        UpdateOptions::new(),
                    )
                    .unwrap();
                editor
                    .update(
                        move |ctx| ctx.move_node(&m2, &t2, 0),
                        UpdateOptions::new(),
                    )
                    .unwrap();
            }),
        )
        .unwrap();

    assert!(editor.state().check_tree().is_ok());
    assert_eq!(
        editor.state().node(&text).unwrap().parent.as_ref(),
        Some(&b)
    );
    assert!(editor.state().child_keys(&a).is_empty());
    assert_eq!(editor.state().child_keys(&b).to_vec(), vec![text]);
}

#[test]
fn test_registry_conflict_is_synchronous() {
    let mut editor = new_editor();

    let errors = Rc::new(RefCell::new(0usize));
    let sink = errors.clone();
    editor.on_error(move |_| *sink.borrow_mut() += 1);

    // "text" is already registered with a different shape.
    let result = editor.register_node_types(vec![NodeSpec::element("text")]);
    assert!(matches!(result, Err(EditorError::Registry(_))));
    // Never routed through the listener bus.
    assert_eq!(*errors.borrow(), 0);
}

#[test]
fn test_update_event_follows_callbacks() {
    let mut editor = new_editor();

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let listener = order.clone();
    editor.on_update(move |_| listener.borrow_mut().push("update"));

    let callback = order.clone();
    editor
        .update(
            |ctx| {
                let root = ctx.root();
                let para = ctx.create_element("paragraph")?;
                ctx.append_child(&root, &para)
            },
            UpdateOptions::new().on_commit(move |_| callback.borrow_mut().push("callback")),
        )
        .unwrap();

    assert_eq!(*order.borrow(), vec!["callback", "update"]);
}

#[test]
fn test_update_event_carries_dirty_keys() {
    let mut editor = new_editor();

    let dirty: Rc<RefCell<Vec<NodeKey>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = dirty.clone();
    editor.on_update(move |event| *seen.borrow_mut() = event.dirty.clone());

    let para = append_paragraph(&mut editor);
    assert!(dirty.borrow().contains(&para));
    assert!(dirty.borrow().contains(&NodeKey::root()));
}
