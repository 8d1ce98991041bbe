// crates/client/tests/manifesto_api.rs
//! High-level manifest API tests: endpoint shapes, message extraction and
//! active-manifest persistence.

use std::sync::Arc;

use manifesto_client::{ApiError, AuthSession, BaixaOutcome, ClientConfig, CredentialStore, ManifestoClient};
use manifesto_types::{BaixaRegistro, EnrichmentStatus, FotoComprovante, TokenPair};
use pretty_assertions::assert_eq;

struct Fixture {
    _dir: tempfile::TempDir,
    client: ManifestoClient,
}

impl Fixture {
    async fn new(api_base: String) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::open(dir.path().join("credentials.json")).unwrap());
        store
            .set_tokens(TokenPair::new("acc", "ref"))
            .await
            .unwrap();
        let session = AuthSession::new(ClientConfig::new(api_base), store).unwrap();
        Self {
            _dir: dir,
            client: ManifestoClient::new(Arc::new(session)),
        }
    }
}

#[tokio::test]
async fn test_buscar_manifesto_persists_active_number() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    let mock = server
        .mock("POST", "/api/manifesto/busca/")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::Json(
            serde_json::json!({"numero_manifesto": "55041"}),
        ))
        .with_status(200)
        .with_body(r#"{"mensagem":"Manifesto em processamento"}"#)
        .expect(1)
        .create_async()
        .await;

    let resp = fixture.client.buscar_manifesto("55041").await.unwrap();
    assert_eq!(resp.mensagem, "Manifesto em processamento");
    mock.assert_async().await;

    let store = fixture.client.session().store();
    assert_eq!(store.manifesto_ativo().await.as_deref(), Some("55041"));
}

#[tokio::test]
async fn test_buscar_manifesto_surfaces_backend_message() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    server
        .mock("POST", "/api/manifesto/busca/")
        .with_status(400)
        .with_body(r#"{"mensagem":"Você já possui um manifesto ativo."}"#)
        .create_async()
        .await;

    let err = fixture.client.buscar_manifesto("55041").await.unwrap_err();
    match err {
        ApiError::Status { status, mensagem } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(mensagem, "Você já possui um manifesto ativo.");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    // Rejected search must not leave a stale active manifest behind.
    let store = fixture.client.session().store();
    assert_eq!(store.manifesto_ativo().await, None);
}

#[tokio::test]
async fn test_status_busca_decodes_enrichment_status() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    server
        .mock("GET", "/api/manifesto/status/")
        .match_query(mockito::Matcher::UrlEncoded(
            "numero_manifesto".into(),
            "55041".into(),
        ))
        .with_status(200)
        .with_body(r#"{"status":"ENRIQUECENDO"}"#)
        .create_async()
        .await;

    let status = fixture.client.status_busca("55041").await.unwrap();
    assert_eq!(status.status, EnrichmentStatus::Enriquecendo);
    assert!(status.status.is_in_flight());
}

#[tokio::test]
async fn test_listar_notas_returns_invoices() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    server
        .mock("GET", "/api/manifesto/notas/")
        .match_query(mockito::Matcher::UrlEncoded(
            "numero_manifesto".into(),
            "55041".into(),
        ))
        .with_status(200)
        .with_body(
            r#"[
                {"numero_nota":"111","chave_acesso":"k1","destinatario":"Mercado A","endereco_entrega":"Rua 1","ja_baixada":true},
                {"numero_nota":"222","chave_acesso":"k2","destinatario":"Mercado B","endereco_entrega":"Rua 2"}
            ]"#,
        )
        .create_async()
        .await;

    let notas = fixture.client.listar_notas("55041").await.unwrap();
    assert_eq!(notas.len(), 2);
    assert!(notas[0].ja_baixada);
    assert!(!notas[1].ja_baixada);
    assert_eq!(notas[1].destinatario, "Mercado B");
}

#[tokio::test]
async fn test_verificar_ativo_restores_manifest() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    server
        .mock("GET", "/api/manifesto/verificar-ativo/")
        .with_status(200)
        .with_body(r#"{"tem_manifesto":true,"numero_manifesto":"77002"}"#)
        .create_async()
        .await;

    let ativo = fixture.client.verificar_ativo().await.unwrap();
    assert!(ativo.tem_manifesto);

    let store = fixture.client.session().store();
    assert_eq!(store.manifesto_ativo().await.as_deref(), Some("77002"));
}

#[tokio::test]
async fn test_registrar_baixa_sends_multipart_with_photo() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    let mock = server
        .mock("POST", "/api/manifesto/registrar-baixa/")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("multipart/form-data".to_string()),
        )
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex("ocorrencia_codigo".to_string()),
            mockito::Matcher::Regex("mft_55041_k1.jpg".to_string()),
            mockito::Matcher::Regex("latitude".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"mensagem":"Baixa registrada."}"#)
        .expect(1)
        .create_async()
        .await;

    let registro = BaixaRegistro {
        ocorrencia_codigo: "1".into(),
        chave_acesso: "k1".into(),
        manifesto_id: "55041".into(),
        recebedor: "Maria".into(),
        latitude: Some(-23.55),
        longitude: Some(-46.63),
        foto: Some(FotoComprovante::jpeg("55041", "k1", vec![0xff, 0xd8, 0xff])),
    };
    let outcome = fixture.client.registrar_baixa(&registro).await.unwrap();
    assert!(matches!(outcome, BaixaOutcome::Registrada(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_registrar_baixa_requires_photo_for_delivery_codes() {
    let server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    let registro = BaixaRegistro {
        ocorrencia_codigo: "1".into(),
        chave_acesso: "k1".into(),
        manifesto_id: "55041".into(),
        recebedor: String::new(),
        latitude: None,
        longitude: None,
        foto: None,
    };
    let err = fixture.client.registrar_baixa(&registro).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
}

#[tokio::test]
async fn test_registrar_baixa_tms_failure_is_a_warning() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    server
        .mock("POST", "/api/manifesto/registrar-baixa/")
        .with_status(502)
        .with_body(r#"{"status_integracao":"erro_tms","erro":"ESL indisponível"}"#)
        .create_async()
        .await;

    let registro = BaixaRegistro {
        ocorrencia_codigo: "7".into(),
        chave_acesso: "k1".into(),
        manifesto_id: "55041".into(),
        recebedor: String::new(),
        latitude: None,
        longitude: None,
        foto: None,
    };
    let outcome = fixture.client.registrar_baixa(&registro).await.unwrap();
    match outcome {
        BaixaOutcome::SalvaComAlertaTms { erro } => assert_eq!(erro, "ESL indisponível"),
        other => panic!("expected TMS warning, got {other:?}"),
    }
}

#[tokio::test]
async fn test_registrar_baixa_html_error_page_is_a_status_error() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;

    // A proxy in front of the backend answers with an HTML page, not JSON.
    server
        .mock("POST", "/api/manifesto/registrar-baixa/")
        .with_status(500)
        .with_header("content-type", "text/html")
        .with_body("<html><body><h1>Internal Server Error</h1></body></html>")
        .create_async()
        .await;

    let registro = BaixaRegistro {
        ocorrencia_codigo: "7".into(),
        chave_acesso: "k1".into(),
        manifesto_id: "55041".into(),
        recebedor: String::new(),
        latitude: None,
        longitude: None,
        foto: None,
    };
    let err = fixture.client.registrar_baixa(&registro).await.unwrap_err();
    match err {
        ApiError::Status { status, mensagem } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(mensagem, "erro no servidor");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_finalizar_clears_active_manifest() {
    let mut server = mockito::Server::new_async().await;
    let fixture = Fixture::new(format!("{}/api/", server.url())).await;
    let store = fixture.client.session().store();
    store.set_manifesto_ativo("55041").await.unwrap();

    server
        .mock("POST", "/api/manifesto/finalizar/")
        .match_body(mockito::Matcher::Json(serde_json::json!({"km_final": 152300})))
        .with_status(200)
        .with_body(r#"{"mensagem":"Manifesto finalizado com sucesso!"}"#)
        .create_async()
        .await;

    let resp = fixture.client.finalizar_manifesto(152300).await.unwrap();
    assert_eq!(resp.mensagem, "Manifesto finalizado com sucesso!");
    assert_eq!(store.manifesto_ativo().await, None);
}
