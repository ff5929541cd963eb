mod common;

use axum::http::{Method, StatusCode};
use chrono::{TimeZone, Utc};
use common::test_app;
use serde_json::{json, Value};
use uuid::Uuid;

fn card() -> Value {
    json!({
        "cardNumber": "4111-1111-1111-1111",
        "expirationDate": "12/99",
        "cvv": "123",
        "firstName": "Jane",
        "lastName": "Doe",
        "address": "1 Main St",
        "cityStateZip": "Springfield, IL 62701"
    })
}

#[tokio::test]
async fn reserving_and_cancelling_restores_seats_exactly_once() {
    let app = test_app();
    let token = app.register("jane").await;
    let flight = app
        .store
        .add_flight("JFK", "LAX", Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(), 29_999, 150);

    let (status, body) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": flight.id, "passengers": 2 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Reservation created successfully");
    let reservation = &body["reservation"];
    assert_eq!(reservation["totalPriceCents"], 59_998);
    assert_eq!(reservation["status"], "pending");
    assert_eq!(reservation["paymentStatus"], "unpaid");
    assert_eq!(reservation["confirmationNumber"].as_str().unwrap().len(), 6);
    assert_eq!(reservation["flight"]["flightNumber"], flight.flight_number);
    assert_eq!(app.store.seats_left(flight.id), 148);

    let uri = format!("/api/reservations/{}", reservation["id"].as_str().unwrap());
    let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Reservation cancelled successfully");
    assert_eq!(body["reservation"]["status"], "cancelled");
    assert_eq!(app.store.seats_left(flight.id), 150);

    let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Reservation already cancelled");
    assert_eq!(app.store.seats_left(flight.id), 150);
}

#[tokio::test]
async fn overbooking_is_refused_without_touching_inventory() {
    let app = test_app();
    let token = app.register("jane").await;
    let flight = app
        .store
        .add_flight("JFK", "LAX", Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(), 10_000, 3);

    let (status, body) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": flight.id, "passengers": 4 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Not enough seats"));
    assert_eq!(app.store.seats_left(flight.id), 3);

    let (status, _) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": Uuid::new_v4(), "passengers": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/reservations", Some(&token), json!({ "passengers": 10 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["flightId", "passengers"]);
}

#[tokio::test]
async fn reservations_are_private_and_listed_newest_first() {
    let app = test_app();
    let jane = app.register("jane").await;
    let mallory = app.register("mallory").await;
    let first = app
        .store
        .add_flight("JFK", "LAX", Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(), 10_000, 10);
    let second = app
        .store
        .add_flight("LAX", "SFO", Utc.with_ymd_and_hms(2030, 6, 3, 8, 0, 0).unwrap(), 8_000, 10);

    let (_, a) = app
        .post("/api/reservations", Some(&jane), json!({ "flightId": first.id, "passengers": 1 }))
        .await;
    let (_, b) = app
        .post("/api/reservations", Some(&jane), json!({ "flightId": second.id, "passengers": 1 }))
        .await;

    let (status, list) = app.get("/api/reservations", Some(&jane)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&Value> = list.as_array().unwrap().iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&b["reservation"]["id"], &a["reservation"]["id"]]);

    let uri = format!("/api/reservations/{}", a["reservation"]["id"].as_str().unwrap());
    let (status, body) = app.get(&uri, Some(&mallory)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Reservation not found");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&mallory), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.seats_left(first.id), 9);

    let (status, list) = app.get("/api/reservations", Some(&mallory)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn payment_confirms_once_and_is_refunded_on_cancel() {
    let app = test_app();
    let token = app.register("jane").await;
    let flight = app
        .store
        .add_flight("JFK", "LAX", Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(), 12_500, 10);
    let (_, created) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": flight.id, "passengers": 1 }))
        .await;
    let id = created["reservation"]["id"].as_str().unwrap().to_string();
    let pay_uri = format!("/api/reservations/{}/payment", id);

    let (status, body) = app.post(&pay_uri, Some(&token), card()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Payment processed successfully");
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["reservationId"], id);
    let transaction_id = body["transactionId"].as_str().unwrap().to_string();
    assert!(transaction_id.starts_with("TR"));
    assert_eq!(body["payment"]["cardLastFour"], "1111");
    assert_eq!(body["payment"]["amountCents"], 12_500);

    let (_, view) = app.get(&format!("/api/reservations/{}", id), Some(&token)).await;
    assert_eq!(view["status"], "confirmed");
    assert_eq!(view["paymentStatus"], "paid");
    assert_eq!(view["payment"]["transactionId"], transaction_id);

    let (status, body) = app.post(&pay_uri, Some(&token), card()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Payment already processed");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/reservations/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["paymentStatus"], "refunded");

    let (_, view) = app.get(&format!("/api/reservations/{}", id), Some(&token)).await;
    assert_eq!(view["payment"]["status"], "refunded");
}

#[tokio::test]
async fn payment_details_are_validated() {
    let app = test_app();
    let token = app.register("jane").await;
    let flight = app
        .store
        .add_flight("JFK", "LAX", Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(), 12_500, 10);
    let (_, created) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": flight.id, "passengers": 1 }))
        .await;
    let pay_uri = format!("/api/reservations/{}/payment", created["reservation"]["id"].as_str().unwrap());

    let mut bad = card();
    bad["cardNumber"] = json!("4111111111111112");
    bad["expirationDate"] = json!("01/20");
    let (status, body) = app.post(&pay_uri, Some(&token), bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let messages: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["message"].as_str().unwrap())
        .collect();
    assert!(messages.contains(&"Invalid credit card number"));
    assert!(messages.contains(&"Invalid or expired card"));

    let (status, _) = app
        .post(&format!("/api/reservations/{}/payment", Uuid::new_v4()), Some(&token), card())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn itinerary_booking_is_all_or_nothing() {
    let app = test_app();
    let token = app.register("jane").await;
    let store = &app.store;
    let roomy = store.add_flight("JFK", "LHR", Utc.with_ymd_and_hms(2030, 6, 1, 20, 0, 0).unwrap(), 10_000, 100);
    let tight = store.add_flight("LHR", "CDG", Utc.with_ymd_and_hms(2030, 6, 5, 9, 0, 0).unwrap(), 10_000, 1);
    let other = store.add_flight("LHR", "MAD", Utc.with_ymd_and_hms(2030, 6, 5, 9, 0, 0).unwrap(), 20_000, 50);

    let (status, _) = app
        .post("/api/itineraries", Some(&token), json!({ "flights": [roomy.id, tight.id], "passengers": 2 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(store.seats_left(roomy.id), 100);
    assert_eq!(store.seats_left(tight.id), 1);

    let (status, body) = app
        .post("/api/itineraries", Some(&token), json!({ "flights": [roomy.id, other.id], "passengers": 2 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Itinerary created successfully");
    let itinerary = &body["itinerary"];
    assert_eq!(itinerary["totalPriceCents"], 2 * (10_000 + 20_000));
    assert_eq!(itinerary["legs"][0]["sequenceNumber"], 1);
    assert_eq!(itinerary["legs"][0]["flight"]["id"], roomy.id.to_string());
    assert_eq!(itinerary["legs"][1]["flight"]["id"], other.id.to_string());
    assert_eq!(store.seats_left(roomy.id), 98);
    assert_eq!(store.seats_left(other.id), 48);

    let uri = format!("/api/itineraries/{}", itinerary["id"].as_str().unwrap());
    let (status, fetched) = app.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["legs"].as_array().unwrap().len(), 2);

    let (status, body) = app.post(&format!("{}/cancel", uri), Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["itinerary"]["status"], "cancelled");
    assert_eq!(store.seats_left(roomy.id), 100);
    assert_eq!(store.seats_left(other.id), 50);

    let (status, body) = app.post(&format!("{}/cancel", uri), Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Itinerary already cancelled");
    assert_eq!(store.seats_left(roomy.id), 100);
}

#[tokio::test]
async fn itineraries_need_two_distinct_flights() {
    let app = test_app();
    let token = app.register("jane").await;
    let flight = app
        .store
        .add_flight("JFK", "LHR", Utc.with_ymd_and_hms(2030, 6, 1, 20, 0, 0).unwrap(), 10_000, 100);

    let (status, body) = app
        .post("/api/itineraries", Some(&token), json!({ "flights": [flight.id], "passengers": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "At least 2 flights required");

    let (status, _) = app
        .post("/api/itineraries", Some(&token), json!({ "flights": [flight.id, flight.id], "passengers": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.seats_left(flight.id), 100);

    let (status, _) = app
        .get(&format!("/api/itineraries/{}", Uuid::new_v4()), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_are_json_validation_errors() {
    let app = test_app();
    let token = app.register("jane").await;

    let (status, body) = app
        .post("/api/reservations", Some(&token), json!({ "flightId": "not-a-uuid", "passengers": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["errors"][0]["field"], "flightId");
    assert_eq!(body["errors"][0]["message"], "Valid flight ID is required");

    let (status, body) = app.get("/api/reservations/xyz", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/itineraries/xyz", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
