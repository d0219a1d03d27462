use bytes::Bytes;
use grate_core::{
    catalog::Catalog,
    gateway::Gateway,
    grpc::{RpcInvoker, client::GrpcClient},
    handler::Transcoder,
    prost_reflect::DynamicMessage,
    route::HttpRule,
    tonic::Code,
};
use http::{Method, Request, StatusCode};
use library_schema::{method, pool};
use library_service::LibraryService;
use serde_json::json;

mod library_service;

fn setup_gateway() -> Gateway<GrpcClient<LibraryService>> {
    let mut catalog = Catalog::new();
    catalog
        .insert(method("GetBook"), &HttpRule::get("/v1/{name=books/*}"))
        .unwrap();
    catalog
        .insert(
            method("WatchBooks"),
            &HttpRule::get("/v1/{parent=shelves/*}/books:watch"),
        )
        .unwrap();
    catalog
        .insert(method("ListBooks"), &HttpRule::get("/v1/{parent=shelves/*}/books"))
        .unwrap();

    let client = GrpcClient::new(LibraryService::new(pool()));
    Gateway::new(catalog, Transcoder::new(client))
}

fn get(uri: &str) -> http::request::Builder {
    Request::builder().method(Method::GET).uri(uri)
}

#[tokio::test]
async fn test_unary_call_over_grpc() {
    let gateway = setup_gateway();

    let request = get("/v1/books/dune")
        .header("x-user", "frank")
        .body(Bytes::new())
        .unwrap();
    let response = gateway.handle(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let documents = response.into_body().collect_json().await.unwrap();
    assert_eq!(
        documents,
        vec![json!({ "name": "books/dune", "author": { "displayName": "frank" } })]
    );
}

#[tokio::test]
async fn test_grpc_status_is_mapped() {
    let gateway = setup_gateway();

    let response = gateway
        .handle(get("/v1/books/missing").body(Bytes::new()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let documents = response.into_body().collect_json().await.unwrap();
    assert_eq!(
        documents,
        vec![json!({ "code": 5, "message": "Book 'books/missing' not found", "details": [] })]
    );
}

#[tokio::test]
async fn test_unimplemented_method() {
    let gateway = setup_gateway();

    let response = gateway
        .handle(get("/v1/shelves/1/books").body(Bytes::new()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_server_streaming_over_grpc() {
    let gateway = setup_gateway();

    let response = gateway
        .handle(
            get("/v1/shelves/1/books:watch?page_size=2")
                .body(Bytes::new())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let documents = response.into_body().collect_json().await.unwrap();
    assert_eq!(
        documents,
        vec![json!({ "name": "books/0" }), json!({ "name": "books/1" })]
    );
}

#[tokio::test]
async fn test_server_streaming_error_after_messages() {
    let gateway = setup_gateway();

    let response = gateway
        .handle(
            get("/v1/shelves/1/books:watch?pageSize=1&filter.tags=fail")
                .body(Bytes::new())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let documents = response.into_body().collect_json().await.unwrap();
    assert_eq!(
        documents,
        vec![
            json!({ "name": "books/0" }),
            json!({ "code": 14, "message": "Shelf closed", "details": [] }),
        ]
    );
}

#[tokio::test]
async fn test_invalid_metadata_is_rejected_by_the_client() {
    let client = GrpcClient::new(LibraryService::new(pool()));
    let get_book = method("GetBook");

    let status = client
        .unary(
            &get_book,
            DynamicMessage::new(get_book.input()),
            vec![("x-user".to_string(), "line\nbreak".to_string())],
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
}
