use super::*;
use serde_json::json;

#[test]
fn test_objects_compare_by_identity() {
    let a = Instance::new("Clock");
    let b = Instance::new("Clock");
    assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
    assert_ne!(Value::Object(a), Value::Object(b));
}

#[test]
fn test_scalars_compare_structurally() {
    assert_eq!(Value::from("x"), Value::Str("x".to_string()));
    assert_eq!(Value::from(vec![Value::Int(1)]), Value::List(vec![Value::Int(1)]));
    assert_ne!(Value::Int(1), Value::Float(1.0));
}

#[test]
fn test_runtime_type_reports_class() {
    assert_eq!(Value::Object(Instance::new("Mailer")).runtime_type(), "Mailer");
    assert_eq!(Value::Null.runtime_type(), "null");
    assert_eq!(Value::from(LazyValue::literal(1)).type_name(), "lazy");
}

#[test]
fn test_accessors_reject_wrong_variant() {
    assert_eq!(Value::from("s").as_str().unwrap(), "s");
    assert!(matches!(
        Value::Int(1).as_str(),
        Err(DiError::InvalidValue {
            expected: "string",
            actual: "int"
        })
    ));
    assert!(Value::Null.as_object().is_err());
    assert!(Value::Null.as_lazy().is_none());
}

#[test]
fn test_variant_predicates() {
    let callable = Value::from(Callable::new("noop", |_| Ok(Value::Null)));
    assert!(callable.is_callable());
    assert_eq!(callable.type_name(), "callable");
    assert!(!Value::from("noop").is_callable());
    assert!(!Value::from(LazyValue::literal(1)).is_callable());
}

#[test]
fn test_instance_fields_keep_assignment_order() {
    let obj = Instance::new("Widget");
    obj.set("b", Value::Int(1));
    obj.set("a", Value::Int(2));
    assert_eq!(obj.set("b", Value::Int(3)), Some(Value::Int(1)));
    assert_eq!(obj.field_names(), vec!["b", "a"]);
    assert!(obj.has("a"));
    assert_eq!(obj.get("missing"), None);
}

#[test]
fn test_callable_errors_are_wrapped() {
    let ok = Callable::new("double", |args| Ok(Value::Int(args[0].as_int()? * 2)));
    assert_eq!(ok.call(&[Value::Int(21)]).unwrap(), Value::Int(42));

    let failing = Callable::new("fail", |_| Err(anyhow::anyhow!("nope")));
    match failing.call(&[]) {
        Err(DiError::InvocationFailed { name, .. }) => assert_eq!(name, "fail"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_from_json() {
    let value = Value::from(json!({"n": 1, "x": 1.5, "list": [true, null]}));
    match value {
        Value::Map(map) => {
            assert_eq!(map["n"], Value::Int(1));
            assert_eq!(map["x"], Value::Float(1.5));
            assert_eq!(map["list"], Value::List(vec![Value::Bool(true), Value::Null]));
        }
        other => panic!("expected map, got {other:?}"),
    }
}

#[test]
fn test_lock_lazies_walks_collections() {
    let node = Arc::new(LazyValue::registry_get("svc"));
    let mut map = IndexMap::new();
    map.insert("inner".to_string(), Value::List(vec![Value::Lazy(node.clone())]));

    Value::Map(map).lock_lazies(&mut FxHashSet::default());
    assert!(node.is_locked());
}
