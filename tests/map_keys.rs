use serde_json::json;
use siphon::database::Database;
use siphon::datatype::Type;
use siphon::hashmap::{digest, Hashmap};
use siphon::item::{Comparison, Item};
use siphon::schema;

#[test]
fn key_type_is_enforced() {
    let mut map = Item::Map(Hashmap::new(Type::String, Type::Int));
    let err = map.set_key(Item::Int(1), Item::Int(1)).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
    let err = map.set_key(Item::String("a".into()), Item::Bool(true)).unwrap_err();
    assert_eq!(err.kind(), "type_mismatch");
    map.set_key(Item::String("a".into()), Item::Int(1)).expect("well typed");
    let err = map.get_key(&Item::String("b".into())).unwrap_err();
    assert_eq!(err.kind(), "index");
    assert_eq!(map.get_key(&Item::String("a".into())).expect("present").to_json(), json!(1));
}

#[test]
fn equal_values_share_a_digest() {
    let a = Item::String("key".into());
    let b = Item::String("key".into());
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&Item::String("kez".into())));
    // the same bits in a different variant are a different key
    assert_ne!(digest(&Item::Int(1)), digest(&Item::Uint(1)));
    assert_ne!(digest(&Item::String("ab".into())), digest(&Item::Regexp(regex::Regex::new("ab").expect("regex"))));
    assert_eq!(digest(&Item::Float(0.0)), digest(&Item::Float(-0.0)));
}

#[test]
fn overwriting_keeps_one_entry() {
    let db = Database::new("scores: <string:int>").expect("schema ok");
    db.set_key("scores", &json!("al"), &json!(1)).expect("key ok");
    db.set_key("scores", &json!("al"), &json!(2)).expect("key ok");
    assert_eq!(db.json("scores").expect("json ok"), json!({"al": 2}));
    assert_eq!(db.json("scores[\"al\"]").expect("json ok"), json!(2));
    assert_eq!(db.json("scores['bo']").unwrap_err().kind(), "index");
}

#[test]
fn unset_removes_existing_keys_only() {
    let db = Database::new("scores: <string:int>").expect("schema ok");
    db.set("scores", &json!({"al": 1, "bo": 2})).expect("set ok");
    db.unset_key("scores", &json!("al")).expect("unset ok");
    assert_eq!(db.json("scores").expect("json ok"), json!({"bo": 2}));
    assert_eq!(db.unset_key("scores", &json!("al")).unwrap_err().kind(), "index");
    assert_eq!(db.unset_key("scores", &json!(3)).unwrap_err().kind(), "type_mismatch");
}

#[test]
fn non_string_keys_round_trip_through_json_text() {
    let db = Database::new("names: <int:string>").expect("schema ok");
    db.set("names", &json!({"3": "three", "-1": "minus one"})).expect("set ok");
    assert_eq!(db.json("names[3]").expect("json ok"), json!("three"));
    assert_eq!(db.json("names[-1]").expect("json ok"), json!("minus one"));
    let rendered = db.json("names").expect("json ok");
    assert_eq!(rendered, json!({"3": "three", "-1": "minus one"}));
    assert_eq!(db.set("names", &json!({"x": "bad"})).unwrap_err().kind(), "type_mismatch");
}

#[test]
fn literal_index_is_decoded_into_the_key_type() {
    let db = Database::new("bytes: <uint8:bool>").expect("schema ok");
    db.set_key("bytes", &json!(7), &json!(true)).expect("key ok");
    assert_eq!(db.json("bytes[7]").expect("json ok"), json!(true));
    assert_eq!(db.json("bytes[300]").unwrap_err().kind(), "type_mismatch");
    assert_eq!(db.json("bytes[/7/]").unwrap_err().kind(), "noop");
}

#[test]
fn struct_keys_are_addressed_by_value() {
    let mut map = Item::Map(Hashmap::new(Type::list(Type::Int), Type::String));
    let key = |v: &[i64]| {
        let items = v.iter().map(|i| Item::Int(*i)).collect();
        Item::List(siphon::item::List::new(Type::Int, items).expect("list ok"))
    };
    map.set_key(key(&[1, 2]), Item::String("one two".into())).expect("key ok");
    assert_eq!(map.get_key(&key(&[1, 2])).expect("present").to_json(), json!("one two"));
    assert_eq!(map.get_key(&key(&[2, 1])).unwrap_err().kind(), "index");
    let rendered = map.to_json();
    assert_eq!(rendered, json!({"[1, 2]": "one two"}));
}

#[test]
fn same_shaped_structs_are_one_key() {
    let registry = schema::load(
        "struct a { x: int y: int }\nstruct b { x: int y: int }\nstruct c { y: int x: int }",
    )
    .expect("schema ok");
    let named = |name: &str| registry.named(name).expect("declared");
    let (a, b, c) = (named("a"), named("b"), named("c"));
    assert!(a.equals(&b) && a.equals(&c));

    let value = json!({"x": 1, "y": 2});
    let ka = Item::from_json(&a, &value).expect("decode a");
    let kb = Item::from_json(&b, &value).expect("decode b");
    let kc = Item::from_json(&c, &value).expect("decode c");
    assert_eq!(digest(&ka), digest(&kb));
    assert_eq!(digest(&ka), digest(&kc));
    assert_eq!(ka.compare(Comparison::Equal, &kb).expect("comparable"), true);
    assert_eq!(ka.compare(Comparison::NotEqual, &kc).expect("comparable"), false);

    let mut map = Item::Map(Hashmap::new(a, Type::Int));
    map.set_key(ka, Item::Int(5)).expect("well typed");
    assert_eq!(map.get_key(&kb).expect("found by b").to_json(), json!(5));
    assert_eq!(map.get_key(&kc).expect("found by c").to_json(), json!(5));

    let other = Item::from_json(&b, &json!({"x": 2, "y": 1})).expect("decode b");
    assert_eq!(map.get_key(&other).unwrap_err().kind(), "index");
}
