//! End-to-end API tests over an in-memory database, with the vendor meter
//! API stubbed by wiremock.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{send, test_app};

#[tokio::test]
async fn healthz_responds_ok() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;
    let (status, _) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn device_crud_round_trip() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;

    // Empty to start.
    let (status, body) = send(&app, Method::GET, "/api/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    // Create.
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({
            "name": "Fridge",
            "meter_number": "MM-0042",
            "rated_power": "150 W",
            "relay_status": "ON"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["name"], "Fridge");

    // Read back.
    let (status, fetched) = send(&app, Method::GET, &format!("/api/devices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["meter_number"], "MM-0042");

    // Partial update: only the relay changes.
    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/devices/{id}"),
        Some(json!({ "relay_status": "OFF" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["relay_status"], "OFF");
    assert_eq!(updated["name"], "Fridge");
    assert_eq!(updated["rated_power"], "150 W");

    // Delete, then 404.
    let (status, _) = send(&app, Method::DELETE, &format!("/api/devices/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/api/devices/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_device_rejects_empty_name() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "name": "", "rated_power": "100 W" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn unknown_device_paths_return_not_found() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;

    let (status, _) = send(&app, Method::GET, "/api/devices/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/devices/99",
        Some(json!({ "name": "Ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/devices/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/consumption/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn consumption_records_and_range_filters() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;

    let (_, device) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "name": "Geyser", "rated_power": "2 kW" })),
    )
    .await;
    let id = device["id"].as_i64().unwrap();

    for (hour, energy) in [(8, 0.5), (9, 0.7), (10, 0.2)] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/consumption",
            Some(json!({
                "device_id": id,
                "voltage": 220.0,
                "current": 8.5,
                "time_on": 30.0,
                "active_energy": energy,
                "reading_timestamp": format!("2026-03-02T{hour:02}:00:00Z")
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Unbounded fetch returns everything, oldest first.
    let (status, all) = send(&app, Method::GET, &format!("/api/consumption/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let all = all.as_array().unwrap().clone();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["active_energy"], 0.5);

    // Range bound cuts off the first reading.
    let uri = format!(
        "/api/consumption/{id}?start_date=2026-03-02T08:30:00Z&end_date=2026-03-02T09:30:00Z"
    );
    let (status, windowed) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let windowed = windowed.as_array().unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0]["active_energy"], 0.7);

    // Bare-date bounds read as midnight, so a one-day window covers all
    // three readings.
    let uri = format!("/api/consumption/{id}?start_date=2026-03-02&end_date=2026-03-03");
    let (status, day) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(day.as_array().unwrap().len(), 3);

    // Totals aggregate per device.
    let (status, totals) = send(&app, Method::GET, "/api/consumption/total", None).await;
    assert_eq!(status, StatusCode::OK);
    let totals = totals.as_array().unwrap();
    assert_eq!(totals.len(), 1);
    assert!((totals[0]["total_energy"].as_f64().unwrap() - 1.4).abs() < 1e-9);

    // Filtering on a device without readings yields nothing.
    let (status, totals) = send(
        &app,
        Method::GET,
        "/api/consumption/total?device_ids=999",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(totals.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn add_record_rejects_bad_input() {
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;

    let (_, device) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "name": "Kettle", "rated_power": "1.5 kW" })),
    )
    .await;
    let id = device["id"].as_i64().unwrap();

    // Unknown device.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/consumption",
        Some(json!({
            "device_id": 999,
            "voltage": 220.0, "current": 1.0, "time_on": 10.0,
            "active_energy": 0.1,
            "reading_timestamp": "2026-03-02T08:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Garbage timestamp.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/consumption",
        Some(json!({
            "device_id": id,
            "voltage": 220.0, "current": 1.0, "time_on": 10.0,
            "active_energy": 0.1,
            "reading_timestamp": "yesterday"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadRequest");

    // Negative reading.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/consumption",
        Some(json!({
            "device_id": id,
            "voltage": -5.0, "current": 1.0, "time_on": 10.0,
            "active_energy": 0.1,
            "reading_timestamp": "2026-03-02T08:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_sync_pulls_vendor_list() {
    let vendor = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all-devices-registered/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "Device": "Fridge",
                "MeterNumber": "MM-0001",
                "Rated_Power": "150 W",
                "Relay_Status": "ON",
                "DateAdded": "2025-11-02T08:00:00Z"
            },
            {
                "id": 2,
                "Device": "Geyser",
                "Rated_Power": "2 kW"
            }
        ])))
        .mount(&vendor)
        .await;

    let (_state, app, _models) = test_app(&vendor.uri()).await;

    let (status, body) = send(&app, Method::POST, "/api/devices/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_synced"], 2);

    let (_, devices) = send(&app, Method::GET, "/api/devices", None).await;
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["name"], "Fridge");
    assert_eq!(devices[1]["meter_number"], serde_json::Value::Null);

    // Re-sync is idempotent on the device count.
    let (status, body) = send(&app, Method::POST, "/api/devices/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_synced"], 2);
    let (_, devices) = send(&app, Method::GET, "/api/devices", None).await;
    assert_eq!(devices.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn device_sync_honours_url_override() {
    let vendor = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all-devices-registered/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "Device": "Heater", "Rated_Power": "1 kW" }
        ])))
        .mount(&vendor)
        .await;

    // Configured vendor is unreachable; the request body points at the mock.
    let (_state, app, _models) = test_app("http://127.0.0.1:1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/devices/sync",
        Some(json!({ "api_url": vendor.uri() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_synced"], 1);
}

#[tokio::test]
async fn consumption_sync_honours_url_override() {
    let vendor = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all-records-per-device/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 21,
                "Voltage": 220.0, "Current": 0.5, "TimeOn": 60.0,
                "ActiveEnergy": 0.11,
                "Reading_Time_Stamp": "2026-01-15T10:00:00Z"
            }
        ])))
        .mount(&vendor)
        .await;

    // Configured vendor is unreachable; the request body points at the mock.
    let (state, app, _models) = test_app("http://127.0.0.1:1").await;
    state
        .repos
        .devices
        .upsert_from_vendor(1, "Fridge", None, "150 W", None, None)
        .await
        .expect("seed device");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/consumption/sync/1",
        Some(json!({ "api_url": vendor.uri() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["records_added"], 1);

    // Without the override the configured vendor is used, and it is down.
    let (status, body) = send(&app, Method::POST, "/api/consumption/sync/1", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "UpstreamError");
}

#[tokio::test]
async fn device_sync_maps_vendor_failure_to_bad_gateway() {
    let vendor = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all-devices-registered/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&vendor)
        .await;

    let (_state, app, _models) = test_app(&vendor.uri()).await;
    let (status, body) = send(&app, Method::POST, "/api/devices/sync", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "UpstreamError");
}

#[tokio::test]
async fn consumption_sync_skips_known_and_malformed_rows() {
    let vendor = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all-devices-registered/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "Device": "Fridge", "Rated_Power": "150 W" }
        ])))
        .mount(&vendor)
        .await;
    Mock::given(method("GET"))
        .and(path("/all-records-per-device/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 10,
                "Voltage": "220.1", "Current": "0.52", "TimeOn": "45.0",
                "ActiveEnergy": "0.0831",
                "Reading_Time_Stamp": "2026-01-15T09:00:00Z"
            },
            {
                "id": 11,
                "Voltage": 219.8, "Current": 0.5, "TimeOn": 60.0,
                "ActiveEnergy": 0.11,
                "Reading_Time_Stamp": "2026-01-15T10:00:00Z"
            },
            {
                "id": 12,
                "Voltage": 220.0, "Current": 0.5, "TimeOn": 60.0,
                "ActiveEnergy": 0.1,
                "Reading_Time_Stamp": "not-a-timestamp"
            }
        ])))
        .mount(&vendor)
        .await;

    let (_state, app, _models) = test_app(&vendor.uri()).await;
    send(&app, Method::POST, "/api/devices/sync", None).await;

    let (status, body) = send(&app, Method::POST, "/api/consumption/sync/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["records_added"], 2);
    assert_eq!(body["report"]["records_skipped"], 1);

    // Second pass: every well-formed row is already known.
    let (_, body) = send(&app, Method::POST, "/api/consumption/sync/1", None).await;
    assert_eq!(body["report"]["records_added"], 0);
    assert_eq!(body["report"]["records_skipped"], 3);

    let (_, records) = send(&app, Method::GET, "/api/consumption/1", None).await;
    assert_eq!(records.as_array().unwrap().len(), 2);
}
