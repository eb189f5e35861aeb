use serde_json::json;
use siphon::database::Database;
use siphon::item::Item;
use siphon::SiphonError;

fn setup() -> Database {
    let db = Database::new("pair: pair\nstruct pair { a: int b: string }").expect("schema ok");
    db.set("pair", &json!({"a": 7, "b": "seven"})).expect("set ok");
    db
}

#[test]
fn full_object_replaces_every_field() {
    let db = setup();
    db.set("pair", &json!({"a": 8, "b": "eight"})).expect("set ok");
    assert_eq!(db.json("pair").expect("json ok"), json!({"a": 8, "b": "eight"}));
}

#[test]
fn missing_field_is_rejected_without_changes() {
    let db = setup();
    let err = db.set("pair", &json!({"a": 1})).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
    assert_eq!(db.json("pair").expect("json ok"), json!({"a": 7, "b": "seven"}));
}

#[test]
fn unknown_field_is_an_index_error() {
    let db = setup();
    let err = db.set("pair", &json!({"a": 1, "b": "one", "c": true})).unwrap_err();
    assert_eq!(err.kind(), "index");
    assert_eq!(db.json("pair").expect("json ok"), json!({"a": 7, "b": "seven"}));
}

#[test]
fn bad_nested_value_leaves_earlier_fields_alone() {
    let db = setup();
    // `a` is valid, `b` is not; neither may be written
    let err = db.set("pair", &json!({"a": 1, "b": 2})).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
    assert_eq!(db.json("pair.a").expect("json ok"), json!(7));
}

#[test]
fn single_fields_are_set_through_the_selector() {
    let db = setup();
    db.set("pair.a", &json!(-3)).expect("set ok");
    assert_eq!(db.json("pair").expect("json ok"), json!({"a": -3, "b": "seven"}));
    let err = db.set("pair.c", &json!(1)).unwrap_err();
    assert_eq!(err.kind(), "index");
    let err = db.set("pair.a", &json!("three")).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
}

#[test]
fn set_field_checks_the_declared_type() {
    let db = setup();
    let mut pair = db.query("pair").expect("query ok");
    pair.set_field("a", Item::Int(42)).expect("same type");
    assert_eq!(pair.get_field("a").expect("field").to_json(), json!(42));
    let err = pair.set_field("a", Item::Int32(42)).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
    let err = pair.set_field("missing", Item::Int(1)).unwrap_err();
    assert!(matches!(err, SiphonError::Index(_)));
    let err = Item::Int(1).get_field("a").unwrap_err();
    assert_eq!(err.kind(), "noop");
}

#[test]
fn integers_are_range_checked() {
    let db = Database::new("tiny: int8\nunsigned: uint16\nf: float32").expect("schema ok");
    db.set("tiny", &json!(-128)).expect("in range");
    assert_eq!(db.set("tiny", &json!(128)).unwrap_err().kind(), "type_mismatch");
    assert_eq!(db.set("unsigned", &json!(-1)).unwrap_err().kind(), "type_mismatch");
    assert_eq!(db.set("unsigned", &json!(1.5)).unwrap_err().kind(), "type_mismatch");
    db.set("unsigned", &json!(2.0)).expect("integral float accepted");
    assert_eq!(db.json("unsigned").expect("json ok"), json!(2));
    assert_eq!(db.set("f", &json!(1e300)).unwrap_err().kind(), "type_mismatch");
    db.set("f", &json!(0.1)).expect("set ok");
    assert_eq!(db.json("f").expect("json ok"), json!(0.1));
}

#[test]
fn invalid_regexp_is_rejected() {
    let db = Database::new("pattern: regexp").expect("schema ok");
    assert_eq!(db.set("pattern", &json!("(unclosed")).unwrap_err().kind(), "type_mismatch");
    db.set("pattern", &json!("^ok$")).expect("set ok");
    assert_eq!(db.json("pattern").expect("json ok"), json!("^ok$"));
}
