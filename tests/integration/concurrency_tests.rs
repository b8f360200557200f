//! Concurrent registrations never overbook a service

use axum::http::StatusCode;
use tokio::task::JoinHandle;

use super::*;

async fn join_all(handles: Vec<JoinHandle<StatusCode>>) -> Vec<StatusCode> {
    let mut statuses = Vec::with_capacity(handles.len());
    for handle in handles {
        statuses.push(handle.await.expect("task panicked"));
    }
    statuses
}

const CAPACITY: i32 = 7;
const CONTENDERS: usize = 40;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_registrations_respect_capacity() {
    let (app, services) = test_app();
    let service = services
        .catalog
        .create(&open_service(local_at(3, 10), CAPACITY))
        .await
        .unwrap();

    let handles = (0..CONTENDERS)
        .map(|n| {
            let app = app.clone();
            let body = personal_data(&format!("Visitor {}", n), &[service.id]);
            tokio::spawn(async move {
                send(&app, json_request("POST", "/api/v1/registrations", &body, false))
                    .await
                    .0
            })
        })
        .collect();
    let statuses = join_all(handles).await;

    let admitted = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let rejected = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(admitted, CAPACITY as usize);
    assert_eq!(rejected, CONTENDERS - CAPACITY as usize);

    let service = services.catalog.get_by_id(service.id).await.unwrap();
    assert_eq!(service.number_of_visitors, i64::from(CAPACITY));
    assert_eq!(service.free_places(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_batches_respect_capacity() {
    let (app, services) = test_app();
    let first = services
        .catalog
        .create(&open_service(local_at(3, 10), 3))
        .await
        .unwrap();
    let second = services
        .catalog
        .create(&open_service(local_at(4, 10), 3))
        .await
        .unwrap();

    let handles = (0..12)
        .map(|n| {
            let app = app.clone();
            // Alternate request order so batches lock overlapping sets
            let ids = if n % 2 == 0 {
                vec![first.id, second.id]
            } else {
                vec![second.id, first.id]
            };
            let body = personal_data(&format!("Visitor {}", n), &ids);
            tokio::spawn(async move {
                send(&app, json_request("POST", "/api/v1/registrations", &body, false))
                    .await
                    .0
            })
        })
        .collect();
    let statuses = join_all(handles).await;
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 3);

    for id in [first.id, second.id] {
        let service = services.catalog.get_by_id(id).await.unwrap();
        assert_eq!(service.number_of_visitors, 3);
    }
}
