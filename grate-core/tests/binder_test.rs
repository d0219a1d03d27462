use grate_core::{
    binder::{BindError, bind, graft},
    path::resolve_field_path,
    prost_reflect::{DynamicMessage, Value},
    schema::FieldPath,
};
use library_schema::message;


fn book() -> DynamicMessage {
    DynamicMessage::new(message("library.v1.Book"))
}

fn path(dotted: &str) -> FieldPath {
    resolve_field_path(&message("library.v1.Book"), dotted)
        .unwrap_or_else(|| panic!("'{dotted}' should resolve"))
}

fn json(message: &DynamicMessage) -> serde_json::Value {
    serde_json::to_value(message).unwrap()
}

#[test]
fn test_scalar_kinds() {
    let mut book = book();

    bind(&mut book, &path("name"), &["Dune"]).unwrap();
    bind(&mut book, &path("count"), &["-3"]).unwrap();
    bind(&mut book, &path("rating"), &["4.5"]).unwrap();
    bind(&mut book, &path("weight"), &["0.25"]).unwrap();
    bind(&mut book, &path("available"), &["TRUE"]).unwrap();
    bind(&mut book, &path("sales"), &["18446744073709551615"]).unwrap();
    bind(&mut book, &path("delta"), &["-7"]).unwrap();
    bind(&mut book, &path("checksum"), &["42"]).unwrap();

    assert_eq!(
        json(&book),
        serde_json::json!({
            "name": "Dune",
            "count": -3,
            "rating": 4.5,
            "weight": 0.25,
            "available": true,
            "sales": "18446744073709551615",
            "delta": -7,
            "checksum": "42",
        })
    );
}

#[test]
fn test_nested_messages_are_created() {
    let mut book = book();

    bind(&mut book, &path("author.display_name"), &["Frank Herbert"]).unwrap();
    bind(&mut book, &path("author.born"), &["1920"]).unwrap();

    assert_eq!(
        json(&book),
        serde_json::json!({ "author": { "displayName": "Frank Herbert", "born": 1920 } })
    );
}

#[test]
fn test_json_names_resolve() {
    let mut book = book();

    bind(&mut book, &path("author.displayName"), &["Ursula"]).unwrap();

    assert_eq!(json(&book)["author"]["displayName"], "Ursula");
}

#[test]
fn test_repeated_values_keep_their_order() {
    let mut book = book();

    bind(&mut book, &path("tags"), &["b", "a"]).unwrap();
    bind(&mut book, &path("tags"), &["c"]).unwrap();
    bind(&mut book, &path("ids"), &["3", "1", "2"]).unwrap();

    let json = json(&book);
    assert_eq!(json["tags"], serde_json::json!(["b", "a", "c"]));
    assert_eq!(json["ids"], serde_json::json!(["3", "1", "2"]));
}

#[test]
fn test_singular_fields_reject_multiple_values() {
    let mut book = book();

    let err = bind(&mut book, &path("name"), &["a", "b"]).unwrap_err();

    assert!(matches!(err, BindError::MultipleValues(field) if field == "name"));
    assert!(!book.has_field_by_name("name"));
}

#[test]
fn test_last_write_wins_for_singular_fields() {
    let mut book = book();

    bind(&mut book, &path("name"), &["first"]).unwrap();
    bind(&mut book, &path("name"), &["second"]).unwrap();

    assert_eq!(json(&book)["name"], "second");
}

#[test]
fn test_invalid_numbers() {
    let mut book = book();

    let err = bind(&mut book, &path("count"), &["abc"]).unwrap_err();
    assert!(matches!(err, BindError::InvalidValue { ref kind, .. } if kind == "int32"));
    assert_eq!(
        err.to_string(),
        "Invalid value 'abc' for field 'count' of type int32"
    );

    let err = bind(&mut book, &path("sales"), &["-1"]).unwrap_err();
    assert!(matches!(err, BindError::InvalidValue { .. }));

    let err = bind(&mut book, &path("available"), &["yes"]).unwrap_err();
    assert!(matches!(err, BindError::InvalidValue { .. }));
}

#[test]
fn test_bytes_are_base64() {
    let mut book = book();

    bind(&mut book, &path("cover"), &["aGVsbG8="]).unwrap();
    assert_eq!(
        book.get_field_by_name("cover").unwrap().as_bytes().unwrap().as_ref(),
        b"hello"
    );

    let err = bind(&mut book, &path("cover"), &["not base64!"]).unwrap_err();
    assert!(matches!(err, BindError::InvalidBase64 { .. }));
}

#[test]
fn test_enums_by_number_and_name() {
    let mut book = book();

    bind(&mut book, &path("genre"), &["2"]).unwrap();
    assert_eq!(json(&book)["genre"], "SCIENCE");

    bind(&mut book, &path("genre"), &["FICTION"]).unwrap();
    assert_eq!(json(&book)["genre"], "FICTION");

    bind(&mut book, &path("genres"), &["SCIENCE", "1"]).unwrap();
    assert_eq!(json(&book)["genres"], serde_json::json!(["SCIENCE", "FICTION"]));

    let err = bind(&mut book, &path("genre"), &["fiction"]).unwrap_err();
    assert!(matches!(
        err,
        BindError::UnknownEnumValue { ref enum_name, .. } if enum_name == "library.v1.Genre"
    ));
}

#[test]
fn test_wrappers_take_their_inner_value() {
    let mut book = book();

    bind(&mut book, &path("subtitle"), &["Book One"]).unwrap();
    bind(&mut book, &path("edition"), &["3"]).unwrap();

    let json = json(&book);
    assert_eq!(json["subtitle"], "Book One");
    assert_eq!(json["edition"], 3);

    let err = bind(&mut book.clone(), &path("edition"), &["third"]).unwrap_err();
    assert!(matches!(err, BindError::InvalidValue { .. }));
}

#[test]
fn test_timestamps_parse_from_rfc3339() {
    let mut book = book();

    bind(&mut book, &path("published"), &["1965-08-01T00:00:00Z"]).unwrap();
    assert_eq!(json(&book)["published"], "1965-08-01T00:00:00Z");

    let err = bind(&mut book, &path("published"), &["last summer"]).unwrap_err();
    assert!(matches!(err, BindError::WellKnownType { .. }));
}

#[test]
fn test_unbindable_fields() {
    let mut book = book();

    let err = bind(&mut book, &path("author"), &["x"]).unwrap_err();
    assert!(matches!(
        err,
        BindError::UnsupportedMessage { ref message, .. } if message == "library.v1.Author"
    ));

    let err = bind(&mut book, &path("labels"), &["x"]).unwrap_err();
    assert!(matches!(err, BindError::MapField(_)));
}

#[test]
fn test_empty_values_are_a_no_op() {
    let mut book = book();

    bind::<&str>(&mut book, &path("author.display_name"), &[]).unwrap();

    assert!(!book.has_field_by_name("author"));
}

#[test]
fn test_graft_sets_and_appends() {
    let mut book = book();
    bind(&mut book, &path("tags"), &["existing"]).unwrap();

    graft(
        &mut book,
        &path("tags"),
        Value::List(vec![Value::String("new".to_string())]),
    )
    .unwrap();
    graft(&mut book, &path("author.born"), Value::I32(1929)).unwrap();

    let json = json(&book);
    assert_eq!(json["tags"], serde_json::json!(["existing", "new"]));
    assert_eq!(json["author"]["born"], 1929);
}

#[test]
fn test_paths_through_repeated_fields_do_not_resolve() {
    let book = message("library.v1.Book");

    assert!(resolve_field_path(&book, "co_authors.display_name").is_none());
    assert!(resolve_field_path(&book, "name.length").is_none());
    assert!(resolve_field_path(&book, "author.nickname").is_none());
    assert!(resolve_field_path(&book, "").is_none());
}
