//! HTTP contract tests for HistorialClient
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET | `/historial/reguladores/` | `historial_*` |
//! | GET | `/submissions/{id}/` | `submission_detail_*` |
//! | GET | `/catalogos/actores/` | `actores_*` |

use chrono::NaiveDate;
use insp_historial::{
    ActorTipo, ClientConfig, FetchOptions, HistorialClient, HistorialError, HistorialParams,
};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> HistorialClient {
    let mut config = ClientConfig::new(server.uri());
    config.token = Some("test-token".into());
    config.timeout = Duration::from_secs(5);
    HistorialClient::new(config).unwrap()
}

// ── GET /historial/reguladores/ ──────────────────────────────────────

#[tokio::test]
async fn historial_sends_bearer_and_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("fecha_desde", "2024-09-01"))
        .and(query_param("solo_completados", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"regulador_id": 10, "placa_vehiculo": "gbo-0921",
             "fase1": {"id": 1, "fecha_cierre": "2024-09-02T10:00:00Z"},
             "fase2": {"id": 2, "fecha_cierre": "2024-09-02T12:00:00Z"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let params = HistorialParams {
        fecha_desde: NaiveDate::from_ymd_opt(2024, 9, 1),
        fecha_hasta: None,
        solo_completados: true,
    };
    let items = test_client(&server)
        .fetch_historial(&params, &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].regulador_id, "10");
    assert_eq!(items[0].fase2_id(), Some("2"));
}

#[tokio::test]
async fn historial_follows_envelope_next_links() {
    let server = MockServer::start().await;
    let next = format!("{}/historial/reguladores/?page=2", server.uri());

    // Mounted first so it wins over the unfiltered path match
    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "results": [{"regulador_id": "R3", "fase1": {"id": "E"}, "fase2": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": next,
            "results": [
                {"regulador_id": "R1", "fase1": {"id": "A"}, "fase2": null},
                {"regulador_id": "R2", "fase1": {"id": "C"}, "fase2": {"id": "D"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.regulador_id.as_str()).collect();
    assert_eq!(ids, vec!["R1", "R2", "R3"]);
}

#[tokio::test]
async fn historial_stops_on_repeated_next_link() {
    let server = MockServer::start().await;
    let self_link = format!("{}/historial/reguladores/?page=1", server.uri());

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": self_link,
            "results": [{"regulador_id": "R1", "fase1": {"id": "A"}, "fase2": null}]
        })))
        .mount(&server)
        .await;

    let items = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap();

    // First page, then the self link once; the repeat stops the loop
    assert_eq!(items.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn historial_next_back_to_first_page_is_not_refetched() {
    let server = MockServer::start().await;
    let first_page = format!("{}/historial/reguladores/?fecha_desde=2024-09-01", server.uri());

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": first_page,
            "results": [{"regulador_id": "R1", "fase1": {"id": "A"}, "fase2": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = HistorialParams {
        fecha_desde: NaiveDate::from_ymd_opt(2024, 9, 1),
        ..Default::default()
    };
    let items = test_client(&server)
        .fetch_historial(&params, &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn historial_does_not_follow_foreign_next_link() {
    let server = MockServer::start().await;
    let foreign = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}/historial/reguladores/?page=2", foreign.uri()),
            "results": [{"regulador_id": "R1", "fase1": {"id": "A"}, "fase2": null}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"regulador_id": "R9", "fase1": {"id": "Z"}, "fase2": null}
        ])))
        .expect(0)
        .mount(&foreign)
        .await;

    let items = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].regulador_id, "R1");
    assert!(foreign.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn token_is_not_sent_to_foreign_origin() {
    let server = MockServer::start().await;
    let foreign = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/elsewhere/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&foreign)
        .await;

    test_client(&server)
        .get_json(
            &format!("{}/elsewhere/", foreign.uri()),
            &[],
            &FetchOptions::default(),
        )
        .await
        .unwrap();

    let requests = foreign.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn historial_error_message_from_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Rango de fechas inválido"})),
        )
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap_err();

    match &err {
        HistorialError::Http { status, message, .. } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Rango de fechas inválido");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn historial_error_falls_back_to_status_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap_err();

    match &err {
        HistorialError::Http { status, message, .. } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn historial_times_out_within_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let opts = FetchOptions::with_timeout(Duration::from_millis(50));
    let err = test_client(&server)
        .fetch_historial(&HistorialParams::default(), &opts)
        .await
        .unwrap_err();

    assert!(matches!(err, HistorialError::Timeout { .. }), "got {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn historial_cancelled_by_caller() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let opts = FetchOptions {
        timeout: None,
        cancel: Some(cancel.clone()),
    };

    let client = test_client(&server);
    let params = HistorialParams::default();
    let call = client.fetch_historial(&params, &opts);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(call, canceller);

    let err = result.unwrap_err();
    assert!(matches!(err, HistorialError::Cancelled { .. }), "got {err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn historial_without_token_sends_no_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/historial/reguladores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    client.set_token(None).await;
    client
        .fetch_historial(&HistorialParams::default(), &FetchOptions::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

// ── GET /submissions/{id}/ ───────────────────────────────────────────

#[tokio::test]
async fn submission_detail_decodes_actors_and_answers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/submissions/S2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "S2",
            "tipo_fase": "fase1",
            "placa_vehiculo": "GBO-0921",
            "finalizado": true,
            "fecha_cierre": "2024-09-02T10:00:00Z",
            "proveedor": {"id": 7, "nombre": "Frutas del Sur", "documento": "0991"},
            "transportista": {"id": 9, "name": "Trans Andes"},
            "cuestionario": {"id": 1, "titulo": "Ingreso"},
            "respuestas": [{"pregunta_id": 3, "pregunta": "Sello", "valor": "OK"}]
        })))
        .mount(&server)
        .await;

    let detail = test_client(&server)
        .fetch_submission_detail("S2", &FetchOptions::default())
        .await
        .unwrap();

    let proveedor = detail.submission.proveedor.unwrap();
    assert_eq!(proveedor.id, "7");
    assert_eq!(proveedor.documento.as_deref(), Some("0991"));
    assert_eq!(detail.submission.transportista.unwrap().nombre, "Trans Andes");
    assert_eq!(detail.answers.len(), 1);
}

#[tokio::test]
async fn submission_detail_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/submissions/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "No encontrado."})))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_submission_detail("missing", &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(
        matches!(&err, HistorialError::Http { status: 404, message, .. } if message == "No encontrado.")
    );
}

// ── GET /catalogos/actores/ ──────────────────────────────────────────

#[tokio::test]
async fn actores_search_passes_tipo_and_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/catalogos/actores/"))
        .and(query_param("tipo", "proveedor"))
        .and(query_param("search", "frutas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [{"id": 7, "nombre": "Frutas del Sur", "ruc": "0991"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let actores = test_client(&server)
        .search_actores(Some(ActorTipo::Proveedor), "  frutas ", &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(actores.len(), 1);
    assert_eq!(actores[0].nombre, "Frutas del Sur");
    assert_eq!(actores[0].documento.as_deref(), Some("0991"));
}
