//! Test object editing through the service and the file-backed store.

use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::object::{FileObjectStore, Identifier, ObjectStore};

#[test]
fn test_update_persists_to_file() {
    let server = TestServer::new();

    server.runtime.block_on(async {
        server
            .service
            .update_object("mine:layout", json!({ "name": "Layout", "composition": [] }))
            .await
            .unwrap();
    });

    // A fresh store over the same directory sees the object.
    let loaded = server.runtime.block_on(async {
        let store = FileObjectStore::open(server.directory.path()).await.unwrap();
        store.get(&Identifier::new("mine", "layout")).await.unwrap()
    });
    assert_eq!(loaded.unwrap().model["name"], "Layout");
}

#[test]
fn test_sequence_create_update_delete() {
    let server = TestServer::new();

    server.runtime.block_on(async {
        let service = &server.service;
        service.update_object("mine:plot", json!({ "v": 1 })).await.unwrap();
        service.update_object("mine:plot", json!({ "v": 2 })).await.unwrap();
        assert_eq!(
            service.get_object("mine:plot").await.unwrap().unwrap().model,
            json!({ "v": 2 })
        );

        service.delete_object("mine:plot").await.unwrap();
        assert!(service.get_object("mine:plot").await.unwrap().is_none());
    });
}

#[test]
fn test_escaped_namespace() {
    let server = TestServer::new();

    let object = server.runtime.block_on(async {
        server
            .service
            .update_object(r"a\:b:key", json!(true))
            .await
            .unwrap()
    });

    assert_eq!(object.identifier, Identifier::new("a:b", "key"));
}

#[test]
fn test_invalid_key_rejected() {
    let server = TestServer::new();

    let error = server.runtime.block_on(async {
        server
            .service
            .update_object("mine:", json!({}))
            .await
            .unwrap_err()
    });

    assert!(error.is_client_error());
}
