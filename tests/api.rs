use actix_web::http::{header, Method, StatusCode};
use actix_web::middleware::NormalizePath;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use ocean_catalog::api;
use ocean_catalog::app_state::AppState;
use ocean_catalog::auth::static_tokens::{StaticIntrospector, StaticToken};
use ocean_catalog::auth::Scope;
use ocean_catalog::config::AppConfig;
use ocean_catalog::metadata::sqlite_store::SQLiteCatalogStore;
use ocean_catalog::storage::local_store::LocalResourceStore;

const FULL: &str = "full-access";
const BOUNDARY: &str = "catalog-test-boundary";

macro_rules! catalog_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .configure(|cfg| api::configure(cfg, &$state)),
        )
        .await
    };
}

fn token(name: String, scopes: Vec<Scope>) -> StaticToken {
    StaticToken {
        token: name,
        client_id: "catalog-tests".to_string(),
        user_id: Some("tester".to_string()),
        scopes: scopes.iter().map(|s| s.as_str().to_string()).collect(),
        expires_at: None,
    }
}

fn only(scope: Scope) -> String {
    format!("only-{}", scope)
}

fn except(scope: Scope) -> String {
    format!("except-{}", scope)
}

fn token_table() -> Vec<StaticToken> {
    let mut tokens = vec![token(FULL.to_string(), Scope::ALL.to_vec())];
    for scope in Scope::ALL {
        tokens.push(token(only(scope), vec![scope]));
        tokens.push(token(
            except(scope),
            Scope::ALL.into_iter().filter(|s| *s != scope).collect(),
        ));
    }
    let mut expired = token("expired".to_string(), Scope::ALL.to_vec());
    expired.expires_at = Some(Utc::now() - chrono::Duration::hours(1));
    tokens.push(expired);
    tokens
}

fn harness_with_limit(max_upload_bytes: usize) -> (web::Data<AppState>, TempDir) {
    let root = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.resource_root = root.path().to_string_lossy().into_owned();
    config.storage.max_upload_bytes = max_upload_bytes;

    let state = AppState::with_backends(
        config,
        Arc::new(SQLiteCatalogStore::open_in_memory().unwrap()),
        Arc::new(LocalResourceStore::new(root.path()).unwrap()),
        Arc::new(StaticIntrospector::new(token_table())),
    );
    (web::Data::new(state), root)
}

fn harness() -> (web::Data<AppState>, TempDir) {
    harness_with_limit(1024 * 1024)
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

fn product_body(title: &str, superseded: Option<i64>) -> Value {
    json!({
        "title": title,
        "description": "Regional ocean model",
        "north_bound": -33.5,
        "south_bound": "-34.5",
        "east_bound": 27.0,
        "west_bound": 25.0,
        "superseded_product_id": superseded
    })
}

fn dataset_body(product_id: i64) -> Value {
    json!({
        "product_id": product_id,
        "title": "Surface temperature",
        "identifier": "sst",
        "type": "netcdf",
        "folder_path": "/data/sst"
    })
}

fn simulation_body() -> Value {
    json!({
        "title": "Hindcast 2020",
        "folder_path": "/runs/2020",
        "data_access_url": "https://thredds.example.org/runs/2020"
    })
}

fn multipart(filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        f = filename
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn upload(method: Method, uri: &str, filename: &str, data: &[u8]) -> test::TestRequest {
    let (content_type, body) = multipart(filename, data);
    test::TestRequest::default()
        .method(method)
        .uri(uri)
        .insert_header(bearer(FULL))
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

#[actix_web::test]
async fn test_every_route_requires_its_scope() {
    let (state, _root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("scoped", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;
    let req = test::TestRequest::post()
        .uri("/dataset")
        .insert_header(bearer(FULL))
        .set_json(dataset_body(pid))
        .to_request();
    let did: i64 = test::read_body_json(test::call_service(&app, req).await).await;
    let req = test::TestRequest::post()
        .uri(&format!("/product/{}/resource", pid))
        .insert_header(bearer(FULL))
        .set_json(json!({"reference": "https://example.org/t.png", "resource_type": "THUMBNAIL"}))
        .to_request();
    let rid: i64 = test::read_body_json(test::call_service(&app, req).await).await;
    let req = test::TestRequest::post()
        .uri("/simulation")
        .insert_header(bearer(FULL))
        .set_json(simulation_body())
        .to_request();
    let sid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let link = json!({"reference": "https://example.org/x", "resource_type": "DATA_ACCESS_URL"});
    let resource_update = json!({"title": "renamed", "resource_type": "THUMBNAIL"});
    let missing = 999_999;

    let routes: Vec<(Method, String, Scope, Option<Value>, bool)> = vec![
        (Method::GET, "/product/all".into(), Scope::ProductRead, None, false),
        (Method::GET, "/product/catalog_products".into(), Scope::ProductRead, None, false),
        (Method::GET, format!("/product/{}", pid), Scope::ProductRead, None, false),
        (Method::POST, "/product".into(), Scope::ProductAdmin, Some(product_body("new", None)), false),
        (Method::PUT, format!("/product/{}", pid), Scope::ProductAdmin, Some(product_body("scoped", None)), false),
        (Method::DELETE, format!("/product/{}", missing), Scope::ProductAdmin, None, false),
        (Method::GET, format!("/product/{}/resources", pid), Scope::ResourceRead, None, false),
        (Method::POST, format!("/product/{}/resource", pid), Scope::ResourceAdmin, Some(link.clone()), false),
        (Method::PUT, format!("/product/{}/resource?resource_type=THUMBNAIL", pid), Scope::ResourceAdmin, None, true),
        (Method::GET, "/dataset/all".into(), Scope::DatasetRead, None, false),
        (Method::GET, format!("/dataset/product_datasets/{}", pid), Scope::DatasetRead, None, false),
        (Method::GET, format!("/dataset/{}", did), Scope::DatasetRead, None, false),
        (Method::POST, "/dataset".into(), Scope::DatasetAdmin, Some(dataset_body(pid)), false),
        (Method::PUT, format!("/dataset/{}", did), Scope::DatasetAdmin, Some(dataset_body(pid)), false),
        (Method::DELETE, format!("/dataset/{}", missing), Scope::DatasetAdmin, None, false),
        (Method::GET, format!("/dataset/{}/resources", did), Scope::ResourceRead, None, false),
        (Method::POST, format!("/dataset/{}/resource", did), Scope::ResourceAdmin, Some(link.clone()), false),
        (Method::PUT, format!("/dataset/{}/resource?resource_type=COVER_IMAGE", did), Scope::ResourceAdmin, None, true),
        (Method::GET, format!("/resource/{}", rid), Scope::ResourceRead, None, false),
        (Method::PUT, format!("/resource/{}", rid), Scope::ResourceAdmin, Some(resource_update), false),
        (Method::PUT, format!("/resource/{}/file?entity_type=product&entity_id={}", rid, pid), Scope::ResourceAdmin, None, true),
        (Method::DELETE, format!("/resource/{}", missing), Scope::ResourceAdmin, None, false),
        (Method::GET, "/simulation/all".into(), Scope::SimulationRead, None, false),
        (Method::GET, format!("/simulation/{}", sid), Scope::SimulationRead, None, false),
        (Method::POST, "/simulation".into(), Scope::SimulationAdmin, Some(simulation_body()), false),
        (Method::PUT, format!("/simulation/{}", sid), Scope::SimulationAdmin, Some(simulation_body()), false),
        (Method::DELETE, format!("/simulation/{}", missing), Scope::SimulationAdmin, None, false),
    ];

    for (method, uri, scope, body, is_upload) in routes {
        let build = |token: String| {
            let req = if is_upload {
                let (content_type, payload) = multipart("scope.bin", b"scope");
                test::TestRequest::default()
                    .insert_header((header::CONTENT_TYPE, content_type))
                    .set_payload(payload)
            } else if let Some(body) = &body {
                test::TestRequest::default().set_json(body)
            } else {
                test::TestRequest::default()
            };
            req.method(method.clone())
                .uri(&uri)
                .insert_header(bearer(&token))
                .to_request()
        };

        let resp = test::call_service(&app, build(except(scope))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{} {} without {}", method, uri, scope);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"detail": "Forbidden"}));

        let resp = test::call_service(&app, build(only(scope))).await;
        let status = resp.status();
        assert!(
            status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN,
            "{} {} with {}: {}",
            method,
            uri,
            scope,
            status
        );
        if !uri.contains(&missing.to_string()) {
            assert!(status.is_success(), "{} {} with {}: {}", method, uri, scope, status);
        }
    }
}

#[actix_web::test]
async fn test_authentication_failures() {
    let (state, _root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::get().uri("/product/all").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"detail": "Not authenticated"}));

    let req = test::TestRequest::get()
        .uri("/product/all")
        .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    for token in ["expired", "unknown-token"] {
        let req = test::TestRequest::get()
            .uri("/product/all")
            .insert_header(bearer(token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN, "{}", token);
    }
}

#[actix_web::test]
async fn test_catalog_hides_superseded_products() {
    let (state, _root) = harness();
    let app = catalog_app!(state);

    let mut ids = Vec::new();
    for (title, supersedes) in [("p1", None), ("p2", Some(1)), ("p3", None)] {
        let req = test::TestRequest::post()
            .uri("/product/")
            .insert_header(bearer(FULL))
            .set_json(product_body(title, supersedes))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let id: i64 = test::read_body_json(resp).await;
        ids.push(id);
    }
    assert_eq!(ids, vec![1, 2, 3]);

    let req = test::TestRequest::get()
        .uri("/product/catalog_products/")
        .insert_header(bearer(FULL))
        .to_request();
    let catalog: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    let listed: Vec<i64> = catalog.iter().map(|p| p["id"].as_i64().unwrap()).collect();
    assert_eq!(listed, vec![2, 3]);
    assert!(catalog[0]["thumbnail"].is_null());

    let req = test::TestRequest::get().uri("/product/1").insert_header(bearer(FULL)).to_request();
    let detail: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(detail["superseded_by_product_id"], 2);
    assert!(detail["superseded_product_id"].is_null());
    assert_eq!(detail["south_bound"], -34.5);

    let req = test::TestRequest::get().uri("/product/all").insert_header(bearer(FULL)).to_request();
    let all: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(all.len(), 3);
}

#[actix_web::test]
async fn test_uploaded_file_is_served_back() {
    let (state, root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("pictured", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let payload: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    let req = upload(
        Method::PUT,
        &format!("/product/{}/resource?resource_type=THUMBNAIL&title=Preview", pid),
        "thumb.bin",
        &payload,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rid: i64 = test::read_body_json(resp).await;

    let req = test::TestRequest::get()
        .uri(&format!("/resource/{}", rid))
        .insert_header(bearer(FULL))
        .to_request();
    let resource: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let reference = format!("product/{}/thumb.bin", pid);
    assert_eq!(resource["reference"], reference);
    assert_eq!(resource["reference_type"], "PATH");
    assert_eq!(resource["resource_type"], "THUMBNAIL");
    assert_eq!(resource["title"], "Preview");
    assert_eq!(std::fs::read(root.path().join(&reference)).unwrap(), payload);

    let req = test::TestRequest::get().uri(&format!("/resources/{}", reference)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await.as_ref(), payload.as_slice());

    let req = test::TestRequest::get()
        .uri("/product/catalog_products")
        .insert_header(bearer(FULL))
        .to_request();
    let catalog: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(catalog[0]["thumbnail"]["id"], rid);
}

#[actix_web::test]
async fn test_replace_then_delete_file() {
    let (state, root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("covered", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let req = upload(
        Method::PUT,
        &format!("/product/{}/resource?resource_type=COVER_IMAGE", pid),
        "a.png",
        b"first",
    )
    .to_request();
    let rid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let old_file = root.path().join(format!("product/{}/a.png", pid));
    let new_file = root.path().join(format!("product/{}/b.png", pid));
    assert!(old_file.exists());

    let req = upload(
        Method::PUT,
        &format!("/resource/{}/file?entity_type=product&entity_id={}", rid, pid),
        "b.png",
        b"second",
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!old_file.exists());
    assert_eq!(std::fs::read(&new_file).unwrap(), b"second");

    let req = upload(
        Method::PUT,
        &format!("/resource/{}/file?entity_type=dataset&entity_id={}", rid, pid),
        "c.png",
        b"third",
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/resource/{}", rid))
        .insert_header(bearer(FULL))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.is_null());
    assert!(!new_file.exists());

    let req = test::TestRequest::get()
        .uri(&format!("/resource/{}", rid))
        .insert_header(bearer(FULL))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"detail": "Not Found"}));
}

#[actix_web::test]
async fn test_delete_keeps_file_uploaded_twice() {
    let (state, root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("twice", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let mut ids = Vec::new();
    for resource_type in ["THUMBNAIL", "COVER_IMAGE"] {
        let req = upload(
            Method::PUT,
            &format!("/product/{}/resource?resource_type={}", pid, resource_type),
            "a.png",
            b"shared",
        )
        .to_request();
        let rid: i64 = test::read_body_json(test::call_service(&app, req).await).await;
        ids.push(rid);
    }

    let req = test::TestRequest::delete()
        .uri(&format!("/resource/{}", ids[0]))
        .insert_header(bearer(FULL))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let shared = root.path().join(format!("product/{}/a.png", pid));
    assert_eq!(std::fs::read(&shared).unwrap(), b"shared");

    let req = test::TestRequest::delete()
        .uri(&format!("/resource/{}", ids[1]))
        .insert_header(bearer(FULL))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(!shared.exists());
}

#[actix_web::test]
async fn test_product_delete_removes_datasets_and_files() {
    let (state, root) = harness();
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("doomed", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;
    let req = test::TestRequest::post()
        .uri("/dataset")
        .insert_header(bearer(FULL))
        .set_json(dataset_body(pid))
        .to_request();
    let did: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let req = upload(
        Method::PUT,
        &format!("/dataset/{}/resource?resource_type=COVER_IMAGE", did),
        "cover.png",
        b"cover",
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/dataset/{}", did))
        .insert_header(bearer(FULL))
        .to_request();
    let dataset: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(dataset["cover_image"]["reference"], format!("dataset/{}/cover.png", did));
    assert_eq!(dataset["type"], "netcdf");

    let cover = root.path().join(format!("dataset/{}/cover.png", did));
    assert!(cover.exists());

    let req = test::TestRequest::delete()
        .uri(&format!("/product/{}", pid))
        .insert_header(bearer(FULL))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(!cover.exists());

    let req = test::TestRequest::get()
        .uri(&format!("/dataset/{}", did))
        .insert_header(bearer(FULL))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/dataset/product_datasets/{}", pid))
        .insert_header(bearer(FULL))
        .to_request();
    let datasets: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(datasets.is_empty());
}

#[actix_web::test]
async fn test_invalid_input_is_unprocessable() {
    let (state, _root) = harness();
    let app = catalog_app!(state);

    let mut bad_bounds = product_body("bad", None);
    bad_bounds["north_bound"] = json!("far north");
    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(bad_bounds)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].is_string());

    let req = test::TestRequest::get()
        .uri("/product/not-a-number")
        .insert_header(bearer(FULL))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/dataset")
        .insert_header(bearer(FULL))
        .set_json(dataset_body(42))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("dangling", Some(42)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("real", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let req = upload(
        Method::PUT,
        &format!("/product/{}/resource?resource_type=THUMBNAIL", pid),
        "..",
        b"escape",
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = upload(
        Method::PUT,
        &format!("/product/{}/resource?resource_type=BANNER", pid),
        "ok.png",
        b"x",
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/product/4242/resource")
        .insert_header(bearer(FULL))
        .set_json(json!({"reference": "https://example.org", "resource_type": "THUMBNAIL"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_oversized_upload_is_rejected() {
    let (state, root) = harness_with_limit(16);
    let app = catalog_app!(state);

    let req = test::TestRequest::post()
        .uri("/product")
        .insert_header(bearer(FULL))
        .set_json(product_body("small", None))
        .to_request();
    let pid: i64 = test::read_body_json(test::call_service(&app, req).await).await;

    let req = upload(
        Method::PUT,
        &format!("/product/{}/resource?resource_type=THUMBNAIL", pid),
        "big.bin",
        &[7u8; 64],
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!root.path().join(format!("product/{}/big.bin", pid)).exists());
}
