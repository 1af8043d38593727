use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let store = BookingStore::open(&dir.path().join("bookings.db")).unwrap();
    (dir, AppState::new(store))
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, String) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

const EXPORT: &str = "\
Name,Family Name,Arrival,Tour Operator,Booked Activity,Hotel,Country
Late,Guest,2023-02-10,1,5DD,,
Early,Guest,2023-02-03,2,OWC,,
Edge,Guest,2023-02-27,1,x2 5DD,,
Insured,Guest,2023-02-05,1,INS,,
Broken,Guest,someday,1,DSD,,
March,Guest,2023-03-01,2,DSD,,
";

#[tokio::test]
async fn test_health_check() {
    let (_dir, state) = test_state();
    let (status, body) = send(&state, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_parse_endpoint() {
    let (_dir, state) = test_state();
    let (status, body) = send(
        &state,
        post("/activity/parse", "application/json", r#"{"code":"OWC/AI3DD"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let parsed: ParsedActivity = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed.divers, 2);
    assert_eq!(parsed.diving_days, 6);
    assert_eq!(parsed.classification, "OWC (+AI)");

    let (_, body) = send(&state, post("/activity/parse", "application/json", "{}")).await;
    let parsed: ParsedActivity = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed.classification, "Unknown");
}

#[tokio::test]
async fn test_create_and_list_bookings() {
    let (_dir, state) = test_state();
    let (status, body) = send(
        &state,
        post(
            "/bookings",
            "application/json",
            r#"{"name":"Ana","family_name":"Diaz","arrival":"2023-02-01","tour_operator":"Sun Travel","booked_activity":"DSD"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["booking"]["activity_type"], "DSD");
    assert_eq!(json["data"]["booking"]["tour_operator"], "Sun Travel");
    assert!(json["data"]["imported_at"].is_string());

    let (status, body) = send(&state, get("/bookings")).await;
    assert_eq!(status, StatusCode::OK);
    let list: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["arrival"], "2023-02-01");
}

#[tokio::test]
async fn test_import_and_build_schedule() {
    let (_dir, state) = test_state();

    let (status, _) = send(&state, post("/import/bookings", "text/csv", EXPORT)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &state,
        post(
            "/import/lookups/tour-operators",
            "text/csv",
            "ID Tour,Tour Operators\n1,Sun Travel\n2,Reef Tours\n",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&state, get("/schedule/2023/2")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();

    let guests: Vec<&str> = json["guests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["guest"].as_str().unwrap())
        .collect();
    assert_eq!(guests, vec!["Early Guest", "Insured Guest", "Late Guest", "Edge Guest"]);
    assert_eq!(json["day_labels"].as_array().map(Vec::len), Some(28));
    assert_eq!(json["guests"][0]["tour_operator"], "Reef Tours");
    assert_eq!(json["guests"][0]["course"], "OWC");
    assert_eq!(json["guests"][1]["activity"], "Ignored");

    // Edge Guest arrives 02-27 with 5 diving days: clipped to two days
    let edge_days = json["guests"][3]["days"].as_array().unwrap();
    assert_eq!(edge_days[26], 1);
    assert_eq!(edge_days[27], 1);
    assert_eq!(edge_days.iter().filter(|d| **d == 1).count(), 2);

    assert_eq!(json["operators"][0]["name"], "Reef Tours");
    assert_eq!(json["operators"][0]["guests"], 1);
    assert_eq!(json["operators"][1]["name"], "Sun Travel");
    assert_eq!(json["operators"][1]["guests"], 3);
    assert_eq!(json["courses"][0]["name"], "OWC");
}

#[tokio::test]
async fn test_schedule_csv_export() {
    let (_dir, state) = test_state();
    send(&state, post("/import/bookings", "text/csv", EXPORT)).await;

    let response = app(state.clone()).oneshot(get("/schedule/2023/2/csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert!(lines[0].starts_with(",Tour Operator,Activity,Course,Diving Days,02-01,"));
    assert!(lines[1].starts_with("Early Guest,"));
    assert!(lines.iter().any(|l| l.starts_with("Total Guests (Diving/Courses),,,,,")));
    assert!(lines.iter().any(|l| l.starts_with("Tour Operators,")));
    assert!(lines.iter().any(|l| l.starts_with("Total Cash,0,0,0,0,0,")));
}

#[tokio::test]
async fn test_schedule_table_for_empty_month() {
    let (_dir, state) = test_state();
    let (status, body) = send(&state, get("/schedule/2024/2/table")).await;

    assert_eq!(status, StatusCode::OK);
    let table: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(table["columns"].as_array().map(Vec::len), Some(4 + 29));
    assert_eq!(table["rows"].as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn test_invalid_month_is_rejected() {
    let (_dir, state) = test_state();
    let (status, body) = send(&state, get("/schedule/2023/13")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], "INVALID_PERIOD");
}

#[tokio::test]
async fn test_malformed_period_uses_json_error() {
    let (_dir, state) = test_state();
    for uri in ["/schedule/2023/feb", "/schedule/2023/-1", "/schedule/year/2/csv"] {
        let (status, body) = send(&state, get(uri)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], "INVALID_PERIOD", "{uri}");
    }
}

#[tokio::test]
async fn test_import_desktop_export_dates() {
    let (_dir, state) = test_state();
    let export = "\
Name,Family Name,Arrival,Tour Operator,Booked Activity
Ana,Diaz,02/27/23 00:00:00,Sun,5DD
Ben,Ng,02/03/2023 00:00:00,Sun,DSD
";
    let (status, _) = send(&state, post("/import/bookings", "text/csv", export)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, get("/schedule/2023/2")).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["guests"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["guests"][0]["guest"], "Ben Ng");
    assert_eq!(json["guests"][1]["first_arrival"], "2023-02-27");
}

#[tokio::test]
async fn test_schedule_xlsx_export() {
    let (_dir, state) = test_state();
    send(&state, post("/import/bookings", "text/csv", EXPORT)).await;

    let response = app(state.clone()).oneshot(get("/schedule/2023/2/xlsx")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], XLSX_CONTENT_TYPE);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"diving-schedule-2023-02.xlsx\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut workbook: calamine::Xlsx<_> =
        calamine::open_workbook_from_rs(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let range = calamine::Reader::worksheet_range(&mut workbook, export::SHEET_NAME).unwrap();

    // header + 4 dated February guests + 6 summary rows
    assert_eq!(range.height(), 11);
    assert_eq!(
        range.get_value((0, 1)),
        Some(&calamine::Data::String("Tour Operator".to_string()))
    );
    assert_eq!(
        range.get_value((1, 0)),
        Some(&calamine::Data::String("Early Guest".to_string()))
    );
}

#[tokio::test]
async fn test_unknown_lookup_table() {
    let (_dir, state) = test_state();
    let (status, body) = send(
        &state,
        post("/import/lookups/rooms", "text/csv", "id,name\n1,A\n"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("rooms"));
}
