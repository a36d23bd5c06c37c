use super::*;

#[test]
fn integral_float_keys_normalise_to_int() {
    assert_eq!(
        TableKey::from_value(&Value::Number(3.0)),
        Some(TableKey::Int(3))
    );
    assert!(matches!(
        TableKey::from_value(&Value::Number(0.5)),
        Some(TableKey::Float(_))
    ));
    assert_eq!(TableKey::from_value(&Value::Nil), None);
    assert_eq!(TableKey::from_value(&Value::Number(f64::NAN)), None);
}

#[test]
fn sequence_grows_and_absorbs_map_entries() {
    let mut t = Table::new();
    t.set(TableKey::Int(2), Value::from("b"));
    assert_eq!(t.len(), 0);
    t.set(TableKey::Int(1), Value::from("a"));
    assert_eq!(t.len(), 2);
    assert_eq!(t.get_index(2).as_str(), Some("b"));
}

#[test]
fn assigning_nil_to_last_element_shrinks_sequence() {
    let mut t = Table::new();
    t.push(Value::from(1.0));
    t.push(Value::from(2.0));
    t.set(TableKey::Int(2), Value::Nil);
    assert_eq!(t.len(), 1);
    assert!(t.get_index(2).is_nil());
}

#[test]
fn positional_slots_keep_nil_holes() {
    let mut t = Table::new();
    t.set_positional(vec![Value::Nil, Value::from("b"), Value::Nil]);
    assert_eq!(t.len(), 3);
    assert!(t.sequence()[0].is_nil());
    assert_eq!(t.get_index(2).as_str(), Some("b"));
    // `pairs` skips the holes.
    assert_eq!(t.entries().len(), 1);
}

#[test]
fn positional_values_override_keyed_integers() {
    let mut t = Table::new();
    t.set(TableKey::Int(1), Value::from("keyed"));
    t.set(TableKey::Int(3), Value::from("tail"));
    t.set_positional(vec![Value::from("a"), Value::from("b")]);
    assert_eq!(t.len(), 3);
    assert_eq!(t.get_index(1).as_str(), Some("a"));
    assert_eq!(t.get_index(3).as_str(), Some("tail"));
}

#[test]
fn entries_list_array_part_first_then_keys_in_order() {
    let mut t = Table::new();
    t.set_str("b", Value::from(2.0));
    t.set_str("a", Value::from(1.0));
    t.push(Value::from("x"));
    let keys: Vec<String> = t.entries().iter().map(|(k, _)| k.display()).collect();
    assert_eq!(keys, vec!["1", "a", "b"]);
}

#[test]
fn number_text_forms() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(-0.5), "-0.5");
    assert_eq!(parse_number(" 0x10 "), Some(16.0));
    assert_eq!(parse_number("-2.5e1"), Some(-25.0));
    assert_eq!(parse_number("12px"), None);
    assert_eq!(parse_number(""), None);
}

#[test]
fn coercion_and_truthiness() {
    assert_eq!(Value::from("42").coerce_number(), Some(42.0));
    assert_eq!(Value::from("42").as_number(), None);
    assert!(Value::Number(0.0).truthy());
    assert!(!Value::Bool(false).truthy());
    assert!(!Value::Nil.truthy());
}

#[test]
fn reference_values_compare_by_identity() {
    let a = Value::new_table(Table::new());
    let b = Value::new_table(Table::new());
    assert!(a.raw_eq(&a.clone()));
    assert!(!a.raw_eq(&b));
    assert!(Value::from("x").raw_eq(&Value::from("x")));
}

#[derive(Debug)]
struct Marker(u8);

impl UserData for Marker {
    fn type_name(&self) -> &'static str {
        "Marker"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn userdata_downcasts_to_its_concrete_type_only() {
    let v = Value::user_data(Marker(7));
    assert_eq!(v.type_name(), "Marker");
    assert_eq!(v.downcast_ref::<Marker>().map(|m| m.0), Some(7));
    assert!(v.downcast_ref::<String>().is_none());
    assert!(Value::from(1.0).downcast_ref::<Marker>().is_none());
}
