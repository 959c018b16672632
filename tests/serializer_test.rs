//! Serialize and deserialize behavior against a shared todo/photo schema.

use jsonapi_schema::{display_value, FieldKind, FieldSpec, RelSpec, Schema, SerializeError, Serializer};
use serde_json::{json, Value};

fn schema() -> Schema {
    let mut schema = Schema::from_value(&json!({
        "todos": {
            "fields": {
                "title": "string",
                "created": { "type": "date", "readOnly": true }
            },
            "relationships": {
                "user": "users",
                "comments": "comments"
            }
        },
        "users": {
            "fields": { "name": "string" },
            "relationships": { "todos": "todos" }
        },
        "comments": {
            "fields": { "text": "string" },
            "relationships": { "author": "users" }
        },
        "photos": {
            "fields": {
                "name": "string",
                "owner_type": { "type": "string", "readOnly": true }
            }
        }
    }));

    if let Some(todos) = schema.get_mut("todos") {
        todos.set_field(
            "status",
            FieldSpec::new(FieldKind::String)
                .read_only()
                .resolve_with(|value, _, _| {
                    json!(value.map(display_value).unwrap_or_default().to_uppercase())
                }),
        );
    }
    if let Some(photos) = schema.get_mut("photos") {
        photos.set_field(
            "url",
            FieldSpec::untyped().resolve_with(|_, bag, _| {
                let name = bag.get("name").map(display_value).unwrap_or_default();
                json!(format!("/photos/{}", name))
            }),
        );
        photos.set_relationship(
            "owner",
            RelSpec::dynamic(|attrs| attrs.get("owner_type").and_then(Value::as_str).map(String::from)),
        );
    }
    schema
}

fn success() -> Value {
    json!({
        "data": {
            "id": "1",
            "type": "todos",
            "attributes": {
                "title": "Clean the kitchen!",
                "created": "2020-01-01T00:00:00.000Z"
            },
            "relationships": {
                "user": { "data": { "type": "users", "id": "2" } }
            }
        },
        "included": [
            { "id": "2", "type": "users", "attributes": { "name": "Steve" } }
        ]
    })
}

mod serialize {
    use super::*;

    #[test]
    fn without_schema() {
        let serializer = Serializer::default();
        let result = serializer
            .serialize("todos", &json!({ "id": 1, "title": "Clean the kitchen" }))
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "type": "todos",
                    "attributes": { "title": "Clean the kitchen" }
                }
            })
        );
    }

    #[test]
    fn with_schema() {
        let serializer = Serializer::new(schema());
        let result = serializer
            .serialize(
                "todos",
                &json!({
                    "id": 1,
                    "title": "Clean the kitchen",
                    "user": { "id": 2, "name": "Steve" },
                    "comments": [{ "id": "1", "text": "Almost done..." }]
                }),
            )
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "type": "todos",
                    "attributes": { "title": "Clean the kitchen" },
                    "relationships": {
                        "user": { "data": { "type": "users", "id": "2" } },
                        "comments": { "data": [{ "type": "comments", "id": "1" }] }
                    }
                }
            })
        );
    }

    #[test]
    fn polymorphic_owner() {
        let serializer = Serializer::new(schema());
        let result = serializer
            .serialize(
                "photos",
                &json!({
                    "id": 1,
                    "name": "todo.jpg",
                    "owner_type": "todos",
                    "owner": { "id": 1 }
                }),
            )
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "type": "photos",
                    "attributes": { "name": "todo.jpg" },
                    "relationships": {
                        "owner": { "data": { "type": "todos", "id": "1" } }
                    }
                }
            })
        );
    }

    #[test]
    fn omits_read_only_fields() {
        let serializer = Serializer::new(schema());
        let result = serializer
            .serialize(
                "todos",
                &json!({ "id": 1, "title": "Clean the kitchen", "status": "done" }),
            )
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "type": "todos",
                    "attributes": { "title": "Clean the kitchen" }
                }
            })
        );
    }

    #[test]
    fn field_serializer_hook() {
        let mut schema = schema();
        if let Some(todos) = schema.get_mut("todos") {
            todos.set_field(
                "title",
                FieldSpec::untyped().serialize_with(|value, attrs| {
                    let description = attrs.get("description").map(display_value).unwrap_or_default();
                    json!(format!("{}{}", display_value(value), description))
                }),
            );
        }
        let serializer = Serializer::new(schema);

        let result = serializer
            .serialize("todos", &json!({ "id": 1, "title": "foo", "description": "bar" }))
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "type": "todos",
                    "attributes": { "title": "foobar", "description": "bar" }
                }
            })
        );
    }

    #[test]
    fn list_of_resources() {
        let serializer = Serializer::new(schema());
        let result = serializer
            .serialize("todos", &json!([{ "id": 1, "title": "a" }, { "id": 2, "title": "b" }]))
            .unwrap();

        assert_eq!(
            result,
            json!({
                "data": [
                    { "type": "todos", "id": "1", "attributes": { "title": "a" } },
                    { "type": "todos", "id": "2", "attributes": { "title": "b" } }
                ]
            })
        );
    }

    #[test]
    fn nothing_to_serialize() {
        let serializer = Serializer::new(schema());
        assert_eq!(
            serializer.serialize("todos", &Value::Null).unwrap(),
            json!({ "type": "todos", "data": null })
        );
    }

    #[test]
    fn scalar_related_object_is_an_error() {
        let serializer = Serializer::new(schema());
        let err = serializer
            .serialize("todos", &json!({ "user": 5 }))
            .unwrap_err();
        assert!(matches!(
            err,
            SerializeError::InvalidResource { ref path, ref actual }
                if path == "/data/user" && actual == "number"
        ));
    }

    #[test]
    fn input_is_not_modified() {
        let serializer = Serializer::new(schema());
        let input = json!({ "id": 1, "_type": "users", "name": "x", "status": "done" });
        let before = input.clone();
        serializer.serialize("todos", &input).unwrap();
        assert_eq!(input, before);
    }
}

mod deserialize {
    use super::*;

    #[test]
    fn normalizes_a_successful_response() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&success());

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "title": "Clean the kitchen!",
                    "created": "2020-01-01T00:00:00.000Z",
                    "user": { "id": "2", "name": "Steve" }
                }
            })
        );
    }

    #[test]
    fn coerces_typed_attributes() {
        let serializer = Serializer::new(Schema::from_value(&json!({
            "todos": { "fields": { "created": { "type": "date" } } }
        })));
        let mut doc = success();
        doc["data"]["attributes"]["created"] = json!("2020-01-01T02:00:00+02:00");

        let result = serializer.deserialize(&doc);
        assert_eq!(result["data"]["created"], json!("2020-01-01T00:00:00.000Z"));
    }

    #[test]
    fn polymorphic_resources() {
        let serializer = Serializer::new(schema());
        let result = serializer.deserialize(&json!({
            "data": {
                "id": "1",
                "type": "photos",
                "attributes": { "name": "photo.jpg" },
                "relationships": {
                    "owner": { "data": { "type": "todos", "id": "1" } }
                }
            },
            "included": [{
                "id": "1",
                "type": "todos",
                "attributes": { "title": "Clean the kitchen!", "status": "done" }
            }]
        }));

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "name": "photo.jpg",
                    "url": "/photos/photo.jpg",
                    "owner": {
                        "id": "1",
                        "title": "Clean the kitchen!",
                        "status": "DONE"
                    }
                }
            })
        );
    }

    #[test]
    fn errors() {
        let serializer = Serializer::default();
        assert_eq!(
            serializer.deserialize(&json!({ "error": "Not found" })),
            json!({ "error": { "status": "400", "title": "Not found", "message": "Not found" } })
        );
    }

    #[test]
    fn errors_with_status() {
        let serializer = Serializer::default();
        assert_eq!(
            serializer.deserialize(&json!({ "status": 404, "error": "Not found" })),
            json!({ "error": { "status": "404", "title": "Not found", "message": "Not found" } })
        );
    }

    #[test]
    fn errors_list_picks_first_non_validation_error() {
        let serializer = Serializer::default();
        assert_eq!(
            serializer.deserialize(&json!({
                "errors": [
                    { "status": "422", "title": "Invalid" },
                    { "status": "404", "title": "Not found" }
                ]
            })),
            json!({ "error": { "status": "404", "title": "Not found" } })
        );
    }

    #[test]
    fn validation_errors_are_kept_as_list() {
        let serializer = Serializer::default();
        let doc = json!({ "errors": [{ "status": "422", "title": "x" }] });
        assert_eq!(serializer.deserialize(&doc), doc);
    }

    #[test]
    fn error_wins_over_errors() {
        let serializer = Serializer::default();
        assert_eq!(
            serializer.deserialize(&json!({ "error": "Boom", "errors": [{ "status": "404" }] })),
            json!({ "error": { "status": "400", "title": "Boom", "message": "Boom" } })
        );
    }

    #[test]
    fn general_meta_data() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": {
                "id": "1",
                "type": "todos",
                "attributes": { "title": "Clean the kitchen!" }
            },
            "meta": { "total": 10, "page": 1 }
        }));

        assert_eq!(
            result,
            json!({
                "data": { "id": "1", "title": "Clean the kitchen!" },
                "meta": { "total": 10, "page": 1 }
            })
        );
    }

    #[test]
    fn resource_meta_data() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": {
                "id": "1",
                "type": "todos",
                "attributes": { "title": "Clean the kitchen!" },
                "meta": {
                    "createdAt": "2023-04-26T06:00:02.000000Z",
                    "updatedAt": "2023-05-18T10:47:04.000000Z"
                }
            }
        }));

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "title": "Clean the kitchen!",
                    "meta": {
                        "createdAt": "2023-04-26T06:00:02.000000Z",
                        "updatedAt": "2023-05-18T10:47:04.000000Z"
                    }
                }
            })
        );
    }

    #[test]
    fn list_data() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": [
                {
                    "id": "1",
                    "type": "todos",
                    "attributes": { "title": "Clean the kitchen!" },
                    "meta": { "createdAt": "2023-04-26T06:00:02.000000Z" }
                },
                {
                    "id": "2",
                    "type": "todos",
                    "attributes": { "title": "Buy groceries" },
                    "meta": { "createdAt": "2023-04-14T12:00:02.000000Z" }
                }
            ]
        }));

        assert_eq!(
            result,
            json!({
                "data": [
                    {
                        "id": "1",
                        "title": "Clean the kitchen!",
                        "meta": { "createdAt": "2023-04-26T06:00:02.000000Z" }
                    },
                    {
                        "id": "2",
                        "title": "Buy groceries",
                        "meta": { "createdAt": "2023-04-14T12:00:02.000000Z" }
                    }
                ]
            })
        );
    }

    #[test]
    fn type_field_with_string_type() {
        let serializer = Serializer::new(Schema::from_value(&json!({
            "todos": {
                "type": "todos",
                "fields": { "todoType": "type", "status": "string", "created": "date" }
            }
        })));

        assert_eq!(
            serializer.deserialize(&success()),
            json!({
                "data": {
                    "id": "1",
                    "title": "Clean the kitchen!",
                    "todoType": "todos",
                    "created": "2020-01-01T00:00:00.000Z",
                    "user": { "id": "2", "name": "Steve" }
                }
            })
        );
    }

    #[test]
    fn type_field_with_polymorphic_schema() {
        let serializer = Serializer::new(Schema::from_value(&json!({
            "todos": {
                "type": ["todos", "tests", "test-todos"],
                "fields": { "title": "string", "todoType": "type" },
                "relationships": {
                    "user": { "type": "users" },
                    "comments": { "type": "comments" }
                }
            },
            "users": {
                "type": "users",
                "fields": { "test": "string", "testType": "type" },
                "relationships": {
                    "todos": { "type": "todos" },
                    "comments": { "type": "comments" }
                }
            },
            "comments": {
                "type": "comments",
                "fields": { "test": "string", "testType": "type" }
            }
        })));

        let result = serializer.deserialize(&json!({
            "data": {
                "id": "1",
                "type": "tests",
                "attributes": { "title": "testing type" },
                "relationships": {
                    "user": { "data": { "id": "2", "type": "users" } }
                }
            },
            "included": [{ "id": "2", "type": "users", "attributes": { "test": "test" } }]
        }));

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "title": "testing type",
                    "todoType": "tests",
                    "user": { "id": "2", "test": "test", "testType": "users" }
                }
            })
        );
    }

    #[test]
    fn broken_links() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": {
                "type": "todos", "id": "1",
                "relationships": {
                    "user": { "data": { "type": "users", "id": "9" } },
                    "comments": { "data": [
                        { "type": "comments", "id": "1" },
                        { "type": "comments", "id": "404" },
                        { "type": "comments", "id": "2" }
                    ] },
                    "project": { "data": null }
                }
            },
            "included": [
                { "type": "comments", "id": "2", "attributes": { "text": "second" } },
                { "type": "comments", "id": "1", "attributes": { "text": "first" } }
            ]
        }));

        assert_eq!(
            result,
            json!({
                "data": {
                    "id": "1",
                    "user": null,
                    "comments": [
                        { "id": "1", "text": "first" },
                        { "id": "2", "text": "second" }
                    ]
                }
            })
        );
    }

    #[test]
    fn resource_reached_twice_keeps_its_relationships() {
        let serializer = Serializer::new(schema());
        let result = serializer.deserialize(&json!({
            "data": {
                "type": "comments", "id": "1",
                "attributes": { "text": "hi" },
                "relationships": {
                    "author": { "data": { "type": "users", "id": "7" } },
                    "assignee": { "data": { "type": "users", "id": "7" } }
                }
            },
            "included": [
                {
                    "type": "users", "id": "7", "attributes": { "name": "Ann" },
                    "relationships": { "company": { "data": { "type": "companies", "id": "1" } } }
                },
                { "type": "companies", "id": "1", "attributes": { "name": "Acme" } }
            ]
        }));

        assert_eq!(
            result["data"]["author"],
            json!({ "id": "7", "name": "Ann", "company": { "id": "1", "name": "Acme" } })
        );
        assert_eq!(result["data"]["author"], result["data"]["assignee"]);
    }

    #[test]
    fn polymorphic_entry_key_is_not_a_wire_type() {
        let serializer = Serializer::new(Schema::from_value(&json!({
            "media": { "type": ["photos", "videos"], "fields": { "size": "number" } }
        })));

        let own_key = serializer.deserialize(&json!({
            "data": { "type": "media", "id": "1", "attributes": { "size": "12" } }
        }));
        assert_eq!(own_key, json!({ "data": { "id": "1", "size": "12" } }));

        let member = serializer.deserialize(&json!({
            "data": { "type": "videos", "id": "1", "attributes": { "size": "12" } }
        }));
        assert_eq!(member, json!({ "data": { "id": "1", "size": 12 } }));
    }

    #[test]
    fn single_type_entry_matches_its_key_only() {
        let serializer = Serializer::new(Schema::from_value(&json!({
            "todos": { "type": "tasks", "fields": { "done": "boolean" } }
        })));

        let by_type = serializer.deserialize(&json!({
            "data": { "type": "tasks", "id": "1", "attributes": { "done": "false" } }
        }));
        assert_eq!(by_type, json!({ "data": { "id": "1", "done": "false" } }));

        let by_key = serializer.deserialize(&json!({
            "data": { "type": "todos", "id": "1", "attributes": { "done": "false" } }
        }));
        assert_eq!(by_key, json!({ "data": { "id": "1", "done": false } }));
    }

    #[test]
    fn included_records_are_not_projected() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": [{ "type": "todos", "id": "1" }],
            "included": [{ "type": "users", "id": "1" }],
            "links": { "next": "/todos?page=2" }
        }));

        assert_eq!(
            result,
            json!({ "data": [{ "id": "1" }], "links": { "next": "/todos?page=2" } })
        );
    }

    #[test]
    fn primary_without_id_is_looked_up_by_type_alone() {
        let serializer = Serializer::default();
        let result = serializer.deserialize(&json!({
            "data": { "type": "todos" },
            "included": [{ "type": "todos", "id": "1" }]
        }));
        assert_eq!(result, json!({ "data": { } }));
    }

    #[test]
    fn resolve_hook_runs_for_absent_fields() {
        let mut schema = Schema::new();
        schema.insert(
            "todos",
            jsonapi_schema::TypeConfig::new("todos").field(
                "label",
                FieldSpec::untyped().resolve_with(|value, bag, record| {
                    assert!(value.is_none());
                    json!(format!(
                        "{}#{}",
                        record["type"].as_str().unwrap_or_default(),
                        bag.get("id").map(display_value).unwrap_or_default()
                    ))
                }),
            ),
        );
        let serializer = Serializer::new(schema);
        let result = serializer.deserialize(&json!({ "data": { "type": "todos", "id": "3" } }));
        assert_eq!(result, json!({ "data": { "id": "3", "label": "todos#3" } }));
    }

    #[test]
    fn document_is_not_modified() {
        let serializer = Serializer::new(schema());
        let doc = success();
        let before = doc.clone();
        serializer.deserialize(&doc);
        assert_eq!(doc, before);
    }
}
