use automerge::{transaction::Transactable, AutoCommit, ObjType, ROOT};
use autosurgeon::{hydrate, reconcile, Hydrate, Reconcile};
use collabtext::{Element, Text, TextDocument, TextError};
use serde_json::json;

#[derive(Debug, Clone, Default, Reconcile, Hydrate, PartialEq)]
struct Note {
    title: String,
    body: Text,
}

#[derive(Debug, Clone, Default, Reconcile, Hydrate, PartialEq)]
struct PlainNote {
    title: String,
    body: String,
}

fn note() -> Note {
    Note {
        title: "Shot list".to_string(),
        body: Text::from(vec![
            Element::from('w'),
            Element::from('i'),
            Element::embedded(json!({"shot": 1})),
            Element::from('d'),
            Element::from('e'),
        ]),
    }
}

#[test]
fn test_text_field_reconcile_hydrate() {
    let mut doc = AutoCommit::new();
    let original = note();
    reconcile(&mut doc, &original).unwrap();

    let hydrated: Note = hydrate(&doc).unwrap();
    assert_eq!(hydrated, original);
    // Hydrated structs are local snapshots
    assert!(!hydrated.body.is_attached());
}

#[test]
fn test_local_edit_then_reconcile() {
    let mut doc = AutoCommit::new();
    reconcile(&mut doc, &note()).unwrap();

    let mut local: Note = hydrate(&doc).unwrap();
    local.body.delete_at(2, 1).unwrap();
    local.body.insert_str(4, "-angle").unwrap();
    reconcile(&mut doc, &local).unwrap();

    let hydrated: Note = hydrate(&doc).unwrap();
    assert_eq!(hydrated.body.as_str(), "wide-angle");
}

#[test]
fn test_struct_field_bound_through_document() {
    let mut doc = AutoCommit::new();
    reconcile(&mut doc, &note()).unwrap();

    let mut text_doc = TextDocument::from_bytes(&doc.save()).unwrap();
    let mut bound = text_doc.text(&["body"]).unwrap();
    assert!(bound.is_attached());
    assert!(matches!(
        bound.set(0, 'W'),
        Err(TextError::IllegalMutation { .. })
    ));

    text_doc
        .change(|block| block.set(&["body"], 0, 'W'))
        .unwrap();

    let reloaded = AutoCommit::load(&text_doc.save()).unwrap();
    let hydrated: Note = hydrate(&reloaded).unwrap();
    assert_eq!(hydrated.title, "Shot list");
    assert_eq!(hydrated.body.get(0), Some(&Element::Character('W')));
    assert_eq!(hydrated.body.len(), 5);
}

#[test]
fn test_hydrate_from_plain_string_field() {
    let mut doc = AutoCommit::new();
    let plain = PlainNote {
        title: "t".to_string(),
        body: "legacy body".to_string(),
    };
    reconcile(&mut doc, &plain).unwrap();

    let hydrated: Note = hydrate(&doc).unwrap();
    assert_eq!(hydrated.body.as_str(), "legacy body");
}

#[test]
fn test_hydrate_from_native_text_object() {
    let mut doc = AutoCommit::new();
    doc.put(&ROOT, "title", "native").unwrap();
    let body = doc.put_object(&ROOT, "body", ObjType::Text).unwrap();
    doc.splice_text(&body, 0, 0, "from js").unwrap();

    let hydrated: Note = hydrate(&doc).unwrap();
    assert_eq!(hydrated.body.as_str(), "from js");
    assert_eq!(hydrated.body.len(), 7);
}

#[test]
fn test_attached_edit_leaves_document_untouched() {
    let mut text_doc = TextDocument::new();
    let mut bound = text_doc.put_text(&["body"], &Text::from("fixed")).unwrap();

    assert!(bound.insert_str(0, "x").is_err());
    assert!(bound.delete_at(0, 5).is_err());
    assert_eq!(bound.as_str(), "fixed");
    assert_eq!(text_doc.text(&["body"]).unwrap().as_str(), "fixed");
}

#[test]
fn test_detached_copy_is_editable() {
    let mut text_doc = TextDocument::new();
    let bound = text_doc.put_text(&["body"], &Text::from("copy me")).unwrap();

    let mut copy = bound.slice(..);
    assert!(!copy.is_attached());
    copy.insert_str(0, "please ").unwrap();
    assert_eq!(copy.as_str(), "please copy me");

    text_doc.put_text(&["body"], &copy).unwrap();
    assert_eq!(text_doc.text(&["body"]).unwrap().as_str(), "please copy me");
}
