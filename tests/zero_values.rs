use serde_json::{json, Value};
use siphon::database::Database;
use siphon::datatype::Type;
use siphon::item::Item;
use siphon::schema;

const SCHEMA: &str = "
flag: bool
big: int
small: int8
count: uint32
ratio: float
narrow: float32
name: string
pattern: regexp
tags: [string]
scores: <string:int>
owner: person
struct person { name: string age: uint8 friends: [person] home: address }
struct address { street: string zip: int32 }
";

#[test]
fn zero_items_have_their_declared_type() {
    let registry = schema::load(SCHEMA).expect("schema ok");
    let Type::Struct(root) = registry.root() else {
        panic!("root should be a struct");
    };
    for (name, ty) in root.fields().expect("fields") {
        let zero = Item::zero(&ty).expect("zero value");
        assert!(zero.type_of().equals(&ty), "zero of {name} should be a {ty}, got {}", zero.type_of());
        let reparsed: Value = serde_json::from_str(&zero.json()).expect("valid JSON");
        assert_eq!(reparsed, zero.to_json());
    }
}

#[test]
fn fresh_database_renders_zero_values() {
    let db = Database::new(SCHEMA).expect("schema ok");
    let expected = json!({
        "flag": false,
        "big": 0,
        "small": 0,
        "count": 0,
        "ratio": 0.0,
        "narrow": 0.0,
        "name": "",
        "pattern": "",
        "tags": [],
        "scores": {},
        "owner": {
            "name": "",
            "age": 0,
            "friends": [],
            "home": { "street": "", "zip": 0 }
        }
    });
    assert_eq!(db.json("").expect("root renders"), expected);
}

#[test]
fn struct_fields_render_in_declaration_order() {
    let db = Database::new(SCHEMA).expect("schema ok");
    let text = db.json("owner").expect("owner renders").to_string();
    assert_eq!(text, r#"{"name":"","age":0,"friends":[],"home":{"street":"","zip":0}}"#);
}

#[test]
fn any_has_no_zero_value() {
    let err = Item::zero(&Type::Any).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
}

#[test]
fn display_forms() {
    let db = Database::new(SCHEMA).expect("schema ok");
    db.set("name", &json!("Al \"the\" pal")).expect("set ok");
    db.set("pattern", &json!("^a.c$")).expect("set ok");
    db.set("tags", &json!(["a", "b"])).expect("set ok");
    assert_eq!(db.query("name").expect("query ok").to_string(), r#""Al \"the\" pal""#);
    assert_eq!(db.query("pattern").expect("query ok").to_string(), "/^a.c$/");
    assert_eq!(db.query("tags").expect("query ok").to_string(), r#"["a", "b"]"#);
    assert_eq!(
        db.query("owner.home").expect("query ok").to_string(),
        r#"address{street: "", zip: 0}"#
    );
}

#[test]
fn long_lists_are_abbreviated_when_displayed() {
    let db = Database::new("numbers: [int]").expect("schema ok");
    db.set("numbers", &json!((0..20).collect::<Vec<i64>>())).expect("set ok");
    let shown = db.query("numbers").expect("query ok").to_string();
    assert!(shown.starts_with("[0, 1, 2"));
    assert!(shown.ends_with(", ...]"), "got {shown}");
    // JSON is never abbreviated
    assert_eq!(db.json("numbers").expect("json ok").as_array().map(Vec::len), Some(20));
}
