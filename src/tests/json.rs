//! JSON materializer rendering (spec.md §4.4b).

use pretty_assertions::assert_eq;

use super::fixtures::*;
use crate::config::{DeserializeOptions, SerializeOptions};
use crate::de::{deserialize, DeserializeOutput};
use crate::ser::serialize_to_vec;

#[test]
fn simple_scenario_renders_expected_json() {
    let mut anchors = Anchors::new();
    let record = build_simple(&mut anchors, SimpleArgs::default());
    let encoded = serialize_to_vec(SerializeOptions::new(), &SIMPLE_DESC, &record).unwrap();

    let decoded = deserialize(DeserializeOptions::json(), &SIMPLE_DESC, &encoded).unwrap();
    let DeserializeOutput::Json(json) = decoded else { panic!("expected Json output") };

    // spec.md §4.4b: a top-level `Blob` renders as an array of unsigned byte decimals, not a hex string.
    let mut blob = vec![1u8, 2, 3, 4];
    blob.resize(32, 0);
    let blob_json = blob.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(",");

    let expected = format!(
        "{{\"Id\":42,\"value\":3.140000,\"active\":true,\"name\":\"Hello, World!\",\"PassportNumber\":\"1234567890\",\"Data\":[{blob_json}]}}"
    );
    assert_eq!(json, expected);
}

#[test]
fn string_values_are_json_escaped() {
    let mut anchors = Anchors::new();
    let record = build_simple(&mut anchors, SimpleArgs { name: Some("a\"b\\c\n\td"), ..Default::default() });
    let encoded = serialize_to_vec(SerializeOptions::new(), &SIMPLE_DESC, &record).unwrap();

    let decoded = deserialize(DeserializeOptions::json(), &SIMPLE_DESC, &encoded).unwrap();
    let DeserializeOutput::Json(json) = decoded else { panic!("expected Json output") };
    assert!(json.contains("\"name\":\"a\\\"b\\\\c\\n\\td\""));
}

#[test]
fn nested_struct_renders_as_json_object() {
    let mut anchors = Anchors::new();
    let sub = build_simple(&mut anchors, SimpleArgs::default());
    let record = build_nested(&mut anchors, 7, &sub, "child");
    let encoded = serialize_to_vec(SerializeOptions::new(), &NESTED_DESC, &record).unwrap();

    let decoded = deserialize(DeserializeOptions::json(), &NESTED_DESC, &encoded).unwrap();
    let DeserializeOutput::Json(json) = decoded else { panic!("expected Json output") };

    assert!(json.starts_with("{\"id\":7,\"sub\":{\"Id\":42"));
    assert!(json.contains("\"name\":\"child\"}"));
}

#[test]
fn union_absent_optional_is_omitted_from_json() {
    let mut anchors = Anchors::new();
    let record = build_union(&mut anchors, 0, 0, None);
    let encoded = serialize_to_vec(SerializeOptions::new(), &UNION_DESC, &record).unwrap();

    let decoded = deserialize(DeserializeOptions::json(), &UNION_DESC, &encoded).unwrap();
    let DeserializeOutput::Json(json) = decoded else { panic!("expected Json output") };
    assert_eq!(json, "{\"id\":0}");
}
