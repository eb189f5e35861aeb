use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use siphon::database::Database;

const SCHEMA: &str = "
users: [user]
index: <string:user>
struct user { name: string age: int tags: [string] }
";

fn populated() -> Database {
    let db = Database::new(SCHEMA).expect("schema ok");
    for i in 0..10_000 {
        let user = json!({"name": format!("user{i}"), "age": i % 90, "tags": ["a", "b"]});
        db.append("users", &user).expect("append ok");
        db.set_key("index", &json!(format!("user{i}")), &user).expect("key ok");
    }
    db
}

fn selector_filter(c: &mut Criterion) {
    let db = populated();
    c.bench_function("filter 10k users by age", |b| {
        b.iter(|| db.query(black_box("users[age >= 65]")).expect("query ok"))
    });
    c.bench_function("filter 10k users by regexp", |b| {
        b.iter(|| db.query(black_box("users[name ~ /99$/]")).expect("query ok"))
    });
}

fn map_lookup(c: &mut Criterion) {
    let db = populated();
    c.bench_function("map lookup by key", |b| {
        b.iter(|| db.json(black_box("index['user4242'].age")).expect("query ok"))
    });
}

fn mutation(c: &mut Criterion) {
    let db = populated();
    c.bench_function("set a field through a filter", |b| {
        b.iter(|| db.set(black_box("users[age = 42][0].name"), &json!("answer")).expect("set ok"))
    });
}

criterion_group!(benches, selector_filter, map_lookup, mutation);
criterion_main!(benches);
