mod common;

use std::ops::ControlFlow;

use common::*;
use jvm2js::{CacheError, ClassDataCache, MemoryResources};
use pretty_assertions::assert_eq;

fn hierarchy() -> MemoryResources {
    let mut res = MemoryResources::new();
    res.insert_class("java/lang/Object", object_class());
    res.insert_class(
        "demo/Named",
        ClassBuilder::object("demo/Named")
            .access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
            .method(ACC_PUBLIC | ACC_ABSTRACT, "name", "()Ljava/lang/String;", None)
            .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "PREFIX", "Ljava/lang/String;")
            .build(),
    );
    res.insert_class(
        "demo/Base",
        ClassBuilder::object("demo/Base")
            .field(ACC_PROTECTED, "id", "I")
            .method(ACC_PUBLIC, "name", "()Ljava/lang/String;", Some(Code::new(1, 1).op(op::ACONST_NULL).op(op::ARETURN)))
            .build(),
    );
    res.insert_class(
        "demo/Leaf",
        ClassBuilder::new("demo/Leaf", Some("demo/Base"))
            .implements("demo/Named")
            .build(),
    );
    res
}

#[test]
fn caches_parsed_classes() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    let first = cache.get_class("demo/Leaf").unwrap();
    let second = cache.get_class("demo/Leaf").unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn missing_classes_are_absent_not_errors() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    assert!(cache.find_class("demo/Nowhere").unwrap().is_none());
    assert!(matches!(
        cache.get_class("demo/Nowhere"),
        Err(CacheError::ClassNotFound(name)) if name == "demo/Nowhere"
    ));
}

#[test]
fn malformed_class_is_a_parse_error() {
    let res = MemoryResources::new().with("demo/Broken.class", b"\xca\xfe\xba\xbe\x00".to_vec());
    let cache = ClassDataCache::new(&res);
    assert!(matches!(
        cache.find_class("demo/Broken"),
        Err(CacheError::Parse { resource, .. }) if resource == "demo/Broken.class"
    ));
}

#[test]
fn superclass_chain_wins_over_interfaces() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    let found = cache
        .find_method("demo/Leaf", "name", "()Ljava/lang/String;")
        .unwrap()
        .unwrap();
    assert_eq!(found.class.name(), "demo/Base");
    assert!(!found.method().is_abstract());
}

#[test]
fn all_declarations_in_lookup_order() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    let mut owners = Vec::new();
    cache
        .find_methods("demo/Leaf", "name", "()Ljava/lang/String;", |m| {
            owners.push(m.class.name().to_string());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(owners, vec!["demo/Base", "demo/Named"]);
}

#[test]
fn finds_inherited_fields() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    let id = cache.find_field("demo/Leaf", "id", "I").unwrap().unwrap();
    assert_eq!(id.class.name(), "demo/Base");
    let prefix = cache
        .find_field("demo/Leaf", "PREFIX", "Ljava/lang/String;")
        .unwrap()
        .unwrap();
    assert_eq!(prefix.class.name(), "demo/Named");
    assert!(cache.find_field("demo/Leaf", "id", "J").unwrap().is_none());
}

#[test]
fn hierarchy_visits_each_class_once() {
    let res = hierarchy();
    let cache = ClassDataCache::new(&res);
    let mut visited = Vec::new();
    cache
        .traverse_hierarchy("demo/Leaf", |c| {
            visited.push(c.name().to_string());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(visited, vec!["demo/Leaf", "demo/Base", "java/lang/Object", "demo/Named"]);
}
