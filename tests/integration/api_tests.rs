//! API integration tests

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use registration_server::{
    models::{CreateService, NewVisitor, PersonalData, Service},
    AppResult,
};

use super::*;

#[tokio::test]
async fn test_health_check() {
    let (app, _) = test_app();

    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/api/v1/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_operator_endpoints_require_token() {
    let (app, _) = test_app();

    let (status, body) = send(&app, get("/api/v1/services")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/retention/run", &json!({}), false),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, admin_get("/api/v1/services")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_visitor_updates_free_places() {
    let (app, services) = test_app();
    let service = services.catalog.create(&open_service(local_at(3, 10), 5)).await.unwrap();

    let (status, current) = send(&app, get("/api/v1/services/current")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current[0]["id"], service.id);
    assert_eq!(current[0]["freePlaces"], 5);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Erika", &[service.id]), false),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let visitors = body["visitors"].as_array().unwrap();
    assert_eq!(visitors.len(), 1);
    assert_eq!(visitors[0]["serviceId"], service.id);
    assert_eq!(visitors[0]["name"], "Erika");
    assert_eq!(visitors[0]["isAnonymized"], false);

    let id = visitors[0]["id"].as_str().unwrap();
    let (status, visitor) = send(&app, admin_get(&format!("/api/v1/visitors/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visitor["surname"], "Muster");

    let (_, service) = send(&app, get(&format!("/api/v1/services/{}", service.id))).await;
    assert_eq!(service["numberOfVisitors"], 1);
    assert_eq!(service["freePlaces"], 4);
}

#[tokio::test]
async fn test_full_service_rejects_with_service_id() {
    let (app, services) = test_app();
    let service = services.catalog.create(&open_service(local_at(3, 10), 1)).await.unwrap();

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Erika", &[service.id]), false),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Max", &[service.id]), false),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NoSeatsLeft");
    assert_eq!(body["service_id"], service.id);
}

#[tokio::test]
async fn test_same_day_batch_is_rejected_atomically() {
    let (app, services) = test_app();
    let morning = services.catalog.create(&open_service(local_at(4, 9), 10)).await.unwrap();
    let evening = services.catalog.create(&open_service(local_at(4, 18), 10)).await.unwrap();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/registrations",
            &personal_data("Erika", &[morning.id, evening.id]),
            false,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DateConflict");
    assert_eq!(body["service_id"], evening.id);

    let (_, visitors) = send(&app, admin_get("/api/v1/visitors")).await;
    assert!(visitors.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let (app, services) = test_app();
    let service = services.catalog.create(&open_service(local_at(3, 10), 5)).await.unwrap();

    let blank = personal_data("  ", &[service.id]);
    let (status, body) = send(&app, json_request("POST", "/api/v1/registrations", &blank, false)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Erika", &[9999]), false),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchService");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Erika", &[]), false),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_closed_window_is_rejected() {
    let (app, services) = test_app();
    let mut data = open_service(local_at(5, 10), 5);
    data.registration_starts_at = Utc::now() + Duration::days(1);
    let service = services.catalog.create(&data).await.unwrap();

    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations", &personal_data("Erika", &[service.id]), false),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "RegistrationClosed");

    let (_, current) = send(&app, get("/api/v1/services/current")).await;
    assert!(current.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_operator_service_maintenance() {
    let (app, _) = test_app();

    let create = json!({
        "serviceStartsAt": local_at(6, 10),
        "registrationStartsAt": Utc::now() - Duration::hours(1),
        "registrationEndsAt": local_at(6, 9),
        "numberOfAllowedVisitors": 3,
    });
    let (status, created) = send(&app, json_request("POST", "/api/v1/services", &create, true)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, anonymous) = send(
        &app,
        json_request("POST", &format!("/api/v1/services/{}/anonymous-visitors", id), &json!({}), true),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(anonymous["name"], "anonymous");

    let (status, adjustment) = send(
        &app,
        json_request("PUT", "/api/v1/services/capacity", &json!({ "numberOfAllowedVisitors": 8 }), true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjustment["updated"], json!([id]));

    let (status, ends) = send(
        &app,
        json_request("PUT", "/api/v1/services/registration-ends", &json!({}), true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ends["updated"], json!([id]));

    let (_, service) = send(&app, get(&format!("/api/v1/services/{}", id))).await;
    assert_eq!(service["freePlaces"], 7);

    let delete = axum::http::Request::delete(format!("/api/v1/services/{}", id))
        .header("Token", ADMIN_TOKEN)
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/api/v1/services/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, visitors) = send(&app, admin_get("/api/v1/visitors")).await;
    assert!(visitors.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_weekly_plan_endpoint() {
    let (app, _) = test_app();
    let plan = json!({
        "numberOfAllowedVisitors": 85,
        "serviceStart": "10:30:00",
        "registrationStart": "12:00:00",
        "registrationEnd": "09:30:00",
        "weeks": 4,
    });

    let (status, created) = send(&app, json_request("POST", "/api/v1/services/weekly", &plan, true)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.as_array().unwrap().len(), 4);

    let (_, again) = send(&app, json_request("POST", "/api/v1/services/weekly", &plan, true)).await;
    assert!(again.as_array().unwrap().is_empty());

    let (_, all) = send(&app, admin_get("/api/v1/services?upcoming=true")).await;
    assert_eq!(all.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_texts_merge_keeps_edits() {
    let (app, _) = test_app();

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/v1/texts/appName", &json!({ "value": "Edited" }), true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let defaults = json!({ "appName": "Registrierung", "finish.title": "Vielen Dank" });
    let (status, merged) = send(&app, json_request("POST", "/api/v1/texts/merge", &defaults, true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["appName"], "Edited");
    assert_eq!(merged["finish.title"], "Vielen Dank");

    let (_, seeded) = send(
        &app,
        json_request("POST", "/api/v1/texts/seed", &json!({ "appName": "Registrierung" }), true),
    )
    .await;
    assert_eq!(seeded["appName"], "Registrierung");

    let (status, texts) = send(&app, get("/api/v1/texts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(texts, json!({ "appName": "Registrierung", "finish.title": "Vielen Dank" }));
}

#[tokio::test]
async fn test_retention_run_scrubs_old_services() {
    let (app, services) = test_app();
    let started = Utc::now() - Duration::weeks(5);
    let old = services
        .catalog
        .create(&CreateService {
            service_starts_at: started,
            registration_starts_at: started - Duration::days(7),
            registration_ends_at: started - Duration::hours(1),
            number_of_allowed_visitors: 5,
            no_date_conflict: false,
            additional_info: None,
        })
        .await
        .unwrap();
    let recent = services.catalog.create(&open_service(local_at(3, 10), 5)).await.unwrap();

    let personal = PersonalData {
        name: "Erika".to_string(),
        surname: "Muster".to_string(),
        street: "Hauptstraße 1".to_string(),
        zip: "51643".to_string(),
        city: "Gummersbach".to_string(),
        phone: "02261 123456".to_string(),
        email: None,
        additional_data: json!({ "seat": "A1" }),
    };
    for id in [old.id, recent.id] {
        let personal = personal.clone();
        services
            .repository
            .visitors
            .admit(&[id], &move |_: &[Service]| -> AppResult<Vec<NewVisitor>> {
                Ok(vec![NewVisitor::new(id, personal.clone())])
            })
            .await
            .unwrap();
    }

    let (status, report) = send(
        &app,
        json_request("POST", "/api/v1/retention/run", &json!({}), true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["anonymizedServices"], json!([old.id]));
    assert_eq!(report["anonymizedVisitors"], 1);
    assert_eq!(report["failures"], json!([]));

    let (_, scrubbed) = send(&app, admin_get(&format!("/api/v1/visitors?service_id={}", old.id))).await;
    assert_eq!(scrubbed[0]["name"], "");
    assert_eq!(scrubbed[0]["street"], "");
    assert_eq!(scrubbed[0]["additionalData"], json!({}));
    assert_eq!(scrubbed[0]["isAnonymized"], true);

    let (_, kept) = send(&app, admin_get(&format!("/api/v1/visitors?service_id={}", recent.id))).await;
    assert_eq!(kept[0]["name"], "Erika");
}
