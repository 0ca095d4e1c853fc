//! End-to-end flows through the HTTP router.
//!
//! Each test builds a fresh application over in-memory stores.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use serde_json::{Value, json};

use handover_integration_tests::{MultipartBody, SIGNATURE, TestApp};
use handover_server::storage;

fn box_delivery() -> Value {
    json!({
        "customerName": "Acme Co",
        "invoiceNumber": "INV-100",
        "orderRef": "PO-9",
        "deliveryDateTime": "2026-03-01T09:30",
        "items": [{ "name": "Box", "qty": 5 }]
    })
}

fn confirm_form(item_id: &str, qty: i64) -> MultipartBody {
    MultipartBody::new()
        .text(
            "items",
            &json!([{ "id": item_id, "deliveredQty": qty }]).to_string(),
        )
        .text("signatureDataUrl", SIGNATURE)
}

/// Admin creates a delivery and assigns it to a fresh driver.
async fn assigned_delivery(app: &TestApp) -> (String, Value, Value) {
    let admin = app.admin_cookie().await;
    let driver = app.create_driver(&admin, "Dana").await;
    let delivery = app.create_delivery(&admin, &box_delivery()).await;

    let id = delivery["id"].as_str().unwrap();
    let response = app
        .post_json(
            &format!("/api/deliveries/{id}/assign"),
            Some(&admin),
            &json!({ "driverId": driver["id"] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    (admin, driver, response.json())
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "ok");

    let response = app.get("/health/ready", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = TestApp::new();

    let bad = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": "admin@example.com", "password": "nope" }),
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.json(), json!({ "error": "Invalid credentials" }));

    let response = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": "ADMIN@example.com", "password": "correct horse battery staple" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["email"], "admin@example.com");

    let cookie = response.session_cookie().unwrap();
    let me = app.get("/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["id"], body["user"]["id"]);

    let logout = app.post_json("/auth/logout", Some(&cookie), &json!({})).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.json(), json!({ "ok": true }));
    let cleared = logout
        .headers
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_login_is_stable_across_repeats() {
    let app = TestApp::new();
    let first = app.admin_cookie().await;
    let second = app.admin_cookie().await;

    let a = app.get("/auth/me", Some(&first)).await.json();
    let b = app.get("/auth/me", Some(&second)).await.json();
    assert_eq!(a["id"], b["id"]);
}

#[tokio::test]
async fn test_unauthenticated_requests() {
    let app = TestApp::new();
    for path in ["/auth/me", "/api/deliveries", "/api/drivers", "/my-deliveries"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{path}");
    }

    let forged = app
        .get("/auth/me", Some("authToken=eyJhbGciOiJIUzI1NiJ9.e30.bad"))
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let app = TestApp::new();
    let cookie = app.admin_cookie().await;
    let token = cookie.trim_start_matches("authToken=");

    let request = axum::http::Request::builder()
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_driver_management() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;

    let created = app.create_driver(&admin, "Zed").await;
    app.create_driver(&admin, "Amy").await;
    assert_eq!(created["role"], "driver");
    let token = created["magicToken"].as_str().unwrap();
    assert_eq!(
        created["magicLink"],
        format!("http://localhost:3000/magic-login/{token}")
    );

    let listed = app.get("/api/drivers", Some(&admin)).await.json();
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Amy", "Zed"]);

    let driver = app.driver_cookie(token).await;
    let forbidden = app.get("/api/drivers", Some(&driver)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_magic_login() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;
    let created = app.create_driver(&admin, "Dana").await;
    let token = created["magicToken"].as_str().unwrap();

    let unknown = app.get("/magic-login/not-a-real-token", None).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.text(), "Invalid or expired link");
    assert!(unknown.session_cookie().is_none());

    // The same link works more than once.
    let first = app.get(&format!("/magic-login/{token}"), None).await;
    let second = app.get(&format!("/magic-login/{token}"), None).await;
    for response in [&first, &second] {
        assert!(response.status.is_redirection());
        assert_eq!(response.headers[header::LOCATION], "/driver-home");
        let cookie = response.session_cookie().unwrap();
        let me = app.get("/auth/me", Some(&cookie)).await.json();
        assert_eq!(me["id"], created["id"]);
        assert_eq!(me["role"], "driver");
    }

    let cookie = first.session_cookie().unwrap();
    let home = app.get("/driver-home", Some(&cookie)).await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.text().contains("Welcome Driver"));

    let admin_home = app.get("/driver-home", Some(&admin)).await;
    assert_eq!(admin_home.status, StatusCode::OK);
}

#[tokio::test]
async fn test_confirm_by_assigned_driver() {
    let app = TestApp::new();
    let (_, driver, delivery) = assigned_delivery(&app).await;
    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;

    let id = delivery["id"].as_str().unwrap();
    let item_id = delivery["items"][0]["id"].as_str().unwrap();
    let response = app
        .post_multipart(
            &format!("/api/deliveries/{id}/confirm"),
            Some(&driver_cookie),
            confirm_form(item_id, 5).file("photo", "door.JPG", "image/jpeg", b"jpeg bytes"),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let confirmed = response.json();
    assert_eq!(confirmed["status"], "delivered");
    assert!(confirmed["deliveredAt"].is_string());
    assert_eq!(confirmed["items"][0]["deliveredQty"], 5);
    assert!(
        confirmed["signaturePath"]
            .as_str()
            .unwrap()
            .starts_with("signatures/")
    );
    assert!(
        confirmed["photoPath"]
            .as_str()
            .unwrap()
            .ends_with(".jpg")
    );

    let detail = app
        .get(&format!("/api/deliveries/{id}"), Some(&driver_cookie))
        .await
        .json();
    assert_eq!(detail["status"], "delivered");
    assert_eq!(detail["assignedDriver"]["name"], "Dana");
}

#[tokio::test]
async fn test_confirm_by_other_driver_is_forbidden() {
    let app = TestApp::new();
    let (admin, _, delivery) = assigned_delivery(&app).await;
    let other = app.create_driver(&admin, "Eli").await;
    let other_cookie = app
        .driver_cookie(other["magicToken"].as_str().unwrap())
        .await;

    let id = delivery["id"].as_str().unwrap();
    let item_id = delivery["items"][0]["id"].as_str().unwrap();
    let response = app
        .post_multipart(
            &format!("/api/deliveries/{id}/confirm"),
            Some(&other_cookie),
            confirm_form(item_id, 5),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let detail = app
        .get(&format!("/api/deliveries/{id}"), Some(&admin))
        .await
        .json();
    assert_eq!(detail["status"], "pending");
    assert!(detail["items"][0]["deliveredQty"].is_null());

    let hidden = app
        .get(&format!("/api/deliveries/{id}"), Some(&other_cookie))
        .await;
    assert_eq!(hidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_second_confirm_is_rejected() {
    let app = TestApp::new();
    let (admin, driver, delivery) = assigned_delivery(&app).await;
    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;
    let id = delivery["id"].as_str().unwrap();
    let item_id = delivery["items"][0]["id"].as_str().unwrap();
    let path = format!("/api/deliveries/{id}/confirm");

    let first = app
        .post_multipart(&path, Some(&driver_cookie), confirm_form(item_id, 4))
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app
        .post_multipart(&path, Some(&driver_cookie), confirm_form(item_id, 1))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.json()["error"], "Delivery already delivered");

    let detail = app
        .get(&format!("/api/deliveries/{id}"), Some(&admin))
        .await
        .json();
    assert_eq!(detail["items"][0]["deliveredQty"], 4);
    assert_eq!(detail["deliveredAt"], first.json()["deliveredAt"]);

    let reassign = app
        .post_json(
            &format!("/api/deliveries/{id}/assign"),
            Some(&admin),
            &json!({ "driverId": null }),
        )
        .await;
    assert_eq!(reassign.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_confirm_requires_signature() {
    let app = TestApp::new();
    let (_, driver, delivery) = assigned_delivery(&app).await;
    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;
    let id = delivery["id"].as_str().unwrap();

    let response = app
        .post_multipart(
            &format!("/api/deliveries/{id}/confirm"),
            Some(&driver_cookie),
            MultipartBody::new().text("items", "[]"),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Signature is required");

    let garbled = app
        .post_multipart(
            &format!("/api/deliveries/{id}/confirm"),
            Some(&driver_cookie),
            MultipartBody::new()
                .text("items", "not json")
                .text("signatureDataUrl", SIGNATURE),
        )
        .await;
    assert_eq!(garbled.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_confirm_does_not_mask_denials() {
    let app = TestApp::new();
    let (admin, driver, delivery) = assigned_delivery(&app).await;
    let id = delivery["id"].as_str().unwrap();
    let item_id = delivery["items"][0]["id"].as_str().unwrap();
    let path = format!("/api/deliveries/{id}/confirm");
    let garbled = || {
        MultipartBody::new()
            .text("items", "not json")
            .text("signatureDataUrl", SIGNATURE)
    };

    let anonymous = app.post_multipart(&path, None, garbled()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let other = app.create_driver(&admin, "Eli").await;
    let other_cookie = app
        .driver_cookie(other["magicToken"].as_str().unwrap())
        .await;
    let foreign = app.post_multipart(&path, Some(&other_cookie), garbled()).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;
    let first = app
        .post_multipart(&path, Some(&driver_cookie), confirm_form(item_id, 5))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let again = app.post_multipart(&path, Some(&driver_cookie), garbled()).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_mistyped_json_bodies() {
    let app = TestApp::new();
    let (admin, driver, delivery) = assigned_delivery(&app).await;
    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;
    let mistyped = json!({ "customerName": 1, "invoiceNumber": "INV-1", "items": "x" });

    let anonymous = app.post_json("/api/invoices", None, &mistyped).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    let as_driver = app
        .post_json("/api/invoices", Some(&driver_cookie), &mistyped)
        .await;
    assert_eq!(as_driver.status, StatusCode::FORBIDDEN);
    let as_admin = app.post_json("/api/invoices", Some(&admin), &mistyped).await;
    assert_eq!(as_admin.status, StatusCode::BAD_REQUEST);
    assert!(as_admin.json()["error"].is_string());

    let bad_name = json!({ "name": 1 });
    let driver_create = app
        .post_json("/api/drivers", Some(&driver_cookie), &bad_name)
        .await;
    assert_eq!(driver_create.status, StatusCode::FORBIDDEN);
    let admin_create = app.post_json("/api/drivers", Some(&admin), &bad_name).await;
    assert_eq!(admin_create.status, StatusCode::BAD_REQUEST);

    let id = delivery["id"].as_str().unwrap();
    let assign = app
        .post_json(
            &format!("/api/deliveries/{id}/assign"),
            Some(&admin),
            &json!({ "driverId": 5 }),
        )
        .await;
    assert_eq!(assign.status, StatusCode::BAD_REQUEST);
    assert!(assign.json()["error"].is_string());

    let login = app
        .post_json("/auth/login", None, &json!({ "email": 1, "password": "x" }))
        .await;
    assert_eq!(login.status, StatusCode::BAD_REQUEST);
    assert!(login.json()["error"].is_string());
}

#[tokio::test]
async fn test_negative_quantity_is_rejected() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;

    let response = app
        .post_json(
            "/api/invoices",
            Some(&admin),
            &json!({
                "customerName": "Acme Co",
                "invoiceNumber": "INV-1",
                "items": [{ "name": "Box", "qty": -1 }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let listed = app.get("/api/deliveries", Some(&admin)).await.json();
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_create_with_unknown_driver() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;
    let mut body = box_delivery();
    body["assignedDriverId"] = json!("00000000-0000-4000-8000-000000000000");

    let response = app.post_json("/api/invoices", Some(&admin), &body).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_driver_cannot_create_or_assign() {
    let app = TestApp::new();
    let (_, driver, delivery) = assigned_delivery(&app).await;
    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;

    let create = app
        .post_json("/api/invoices", Some(&driver_cookie), &box_delivery())
        .await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);

    let id = delivery["id"].as_str().unwrap();
    let assign = app
        .post_json(
            &format!("/api/deliveries/{id}/assign"),
            Some(&driver_cookie),
            &json!({ "driverId": null }),
        )
        .await;
    assert_eq!(assign.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delivery_lists_are_scoped() {
    let app = TestApp::new();
    let (admin, driver, mine) = assigned_delivery(&app).await;
    let other = app.create_driver(&admin, "Eli").await;

    let mut theirs = box_delivery();
    theirs["assignedDriverId"] = other["id"].clone();
    theirs["invoiceNumber"] = json!("INV-200");
    app.create_delivery(&admin, &theirs).await;

    let mut unassigned = box_delivery();
    unassigned["invoiceNumber"] = json!("INV-300");
    app.create_delivery(&admin, &unassigned).await;

    let all = app.get("/api/deliveries", Some(&admin)).await.json();
    let invoices: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["invoiceNumber"].as_str().unwrap())
        .collect();
    assert_eq!(invoices, ["INV-300", "INV-200", "INV-100"]);

    let driver_cookie = app
        .driver_cookie(driver["magicToken"].as_str().unwrap())
        .await;
    for path in ["/api/deliveries", "/my-deliveries"] {
        let listed = app.get(path, Some(&driver_cookie)).await.json();
        let ids: Vec<&Value> = listed.as_array().unwrap().iter().map(|d| &d["id"]).collect();
        assert_eq!(ids, [&mine["id"]], "{path}");
    }

    let other_id = other["id"].as_str().unwrap();
    let snooping = app
        .get(
            &format!("/api/deliveries?driverId={other_id}"),
            Some(&driver_cookie),
        )
        .await;
    assert_eq!(snooping.json(), json!([]));

    let filtered = app
        .get(
            &format!("/api/deliveries?driverId={other_id}&status=pending"),
            Some(&admin),
        )
        .await
        .json();
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let bad = app.get("/api/deliveries?status=lost", Some(&admin)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let admin_mine = app.get("/my-deliveries", Some(&admin)).await;
    assert_eq!(admin_mine.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_delivery() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;

    for path in [
        "/api/deliveries/not-a-uuid",
        "/api/deliveries/00000000-0000-4000-8000-000000000000",
    ] {
        let response = app.get(path, Some(&admin)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(response.json()["error"], "Delivery not found");
    }
}

#[tokio::test]
async fn test_invoice_upload() {
    let app = TestApp::new();
    let admin = app.admin_cookie().await;
    let driver = app.create_driver(&admin, "Dana").await;

    let form = MultipartBody::new()
        .text("customerName", "Acme Co")
        .text("invoiceNumber", "INV-55")
        .text("assignedDriverId", driver["id"].as_str().unwrap())
        .text(
            "items",
            &json!([{ "name": "Crate", "qty": "3" }, { "name": "Pallet", "qty": 1 }]).to_string(),
        )
        .file("invoiceFile", "invoice.pdf", "application/pdf", b"%PDF-1.4");
    let response = app
        .post_multipart("/api/invoices/upload", Some(&admin), form)
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

    let delivery = response.json();
    assert_eq!(delivery["status"], "pending");
    assert_eq!(delivery["assignedDriverId"], driver["id"]);
    assert_eq!(delivery["items"][0]["name"], "Crate");
    assert_eq!(delivery["items"][0]["qty"], 3);
    let path = delivery["invoiceFilePath"].as_str().unwrap();
    assert!(path.starts_with("invoices/") && path.ends_with(".pdf"));

    assert_eq!(
        path,
        storage::blob_key(storage::INVOICES, "pdf", b"%PDF-1.4").unwrap()
    );
}

#[tokio::test]
async fn test_invoice_upload_requires_admin() {
    let app = TestApp::new();
    let response = app
        .post_multipart(
            "/api/invoices/upload",
            None,
            MultipartBody::new().text("customerName", "Acme Co"),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
