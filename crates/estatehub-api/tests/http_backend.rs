use chrono::Utc;
use estatehub_api::schema::{
    Intent, LeadRequest, MatchOrigin, PropertyType, RatingUpdate, RoomCount, SaveMatchRequest,
    Source,
};
use estatehub_api::{ApiError, BackendApi, BackendConfig, HttpBackend};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn submit_lead_posts_json_with_csrf_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat-request/"))
        .and(header("content-type", "application/json"))
        .and(header("x-csrftoken", "tok123"))
        .and(body_json(serde_json::json!({
            "type": "sell",
            "propertyType": "apartment",
            "rooms": "2",
            "phone": "+79991234567"
        })))
        .respond_with(ok_json(serde_json::json!({
            "success": true,
            "message": "Спасибо за вашу заявку!",
            "request_id": "65f0"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = BackendConfig::new(server.uri()).with_csrf_token("tok123");
    let backend = HttpBackend::from_config(&cfg).unwrap();
    let resp = backend
        .submit_lead(&LeadRequest {
            intent: Intent::Sell,
            property_type: Some(PropertyType::Apartment),
            rooms: Some(RoomCount::Two),
            question: None,
            phone: "+79991234567".into(),
        })
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.request_id.as_deref(), Some("65f0"));
}

#[tokio::test]
async fn submit_lead_maps_400_envelope_to_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat-request/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "success": false,
            "error": "Некорректный формат телефона"
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let err = backend
        .submit_lead(&LeadRequest {
            intent: Intent::Buy,
            property_type: Some(PropertyType::House),
            rooms: None,
            question: None,
            phone: "+7999".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
    assert_eq!(err.backend_message(), Some("Некорректный формат телефона"));
}

#[tokio::test]
async fn fetch_unmatched_sends_search_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/manual-matching/unmatched/"))
        .and(query_param("search", "Гринвич"))
        .respond_with(ok_json(serde_json::json!({
            "success": true,
            "data": {
                "domrf": [{"_id": "r1", "name": "ЖК Гринвич", "address": "Уфа", "url": ""}],
                "avito": [{"_id": "a1", "name": "Гринвич"}],
                "domclick": []
            },
            "totals": {"domrf": 1, "avito": 1, "domclick": 0,
                       "total_domrf": 40, "total_avito": 25, "total_domclick": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let resp = backend.fetch_unmatched("Гринвич").await.unwrap();

    assert_eq!(resp.data.records(Source::Domrf)[0].address.as_deref(), Some("Уфа"));
    assert!(resp.data.records(Source::Domrf)[0].url.is_none());
    assert_eq!(resp.totals.total(Source::Avito), 25);
}

#[tokio::test]
async fn save_match_success_false_becomes_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/manual-matching/save/"))
        .and(body_partial_json(serde_json::json!({"domrf_id": "r1", "avito_id": null})))
        .respond_with(ok_json(serde_json::json!({
            "success": false,
            "error": "Запись DomRF не найдена"
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let err = backend
        .save_match(&SaveMatchRequest {
            domrf_id: Some("r1".into()),
            avito_id: None,
            domclick_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.backend_message(), Some("Запись DomRF не найдена"));
}

#[tokio::test]
async fn fetch_unified_reads_pagination_total() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/manual-matching/unified/"))
        .respond_with(ok_json(serde_json::json!({
            "success": true,
            "data": [
                {"_id": "u1", "domrf_name": "A", "avito_name": "B", "domclick_name": "N/A", "source": "manual"},
                {"_id": "u2", "domrf_name": "C", "avito_name": "N/A", "domclick_name": "D", "source": "auto"}
            ],
            "pagination": {"page": 1, "per_page": 20, "total": 57, "pages": 3}
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let resp = backend.fetch_unified().await.unwrap();

    assert_eq!(resp.pagination.total, 57);
    assert_eq!(resp.data[0].source, MatchOrigin::Manual);
    assert_eq!(resp.data[1].source, MatchOrigin::Auto);
}

#[tokio::test]
async fn update_rating_targets_encoded_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/manual-matching/unified/65f0abc/update/"))
        .and(body_json(serde_json::json!({
            "rating": 2,
            "rating_description": "далеко от метро"
        })))
        .respond_with(ok_json(serde_json::json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    backend
        .update_rating(
            "65f0abc",
            &RatingUpdate {
                rating: 2,
                rating_description: "далеко от метро".into(),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn non_json_error_page_becomes_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/manual-matching/unified/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let err = backend.fetch_unified().await.unwrap_err();

    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("Bad Gateway"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    // Nothing listens on port 9 locally
    let backend = HttpBackend::new("http://127.0.0.1:9");
    let err = backend.fetch_unified().await.unwrap_err();
    assert!(err.is_transport());
}
