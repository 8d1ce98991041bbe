// crates/client/src/api.rs
//! High-level manifest API over the authenticated session.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use manifesto_types::{
    BaixaRegistro, BaixaResponse, BuscaRequest, FinalizarRequest, ManifestoAtivo,
    MensagemResponse, Nota, StatusResponse,
};

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::poller::{PollEvent, StatusPoller};
use crate::request::{ApiRequest, MultipartField};

/// Outcome of registering a delivery occurrence. The backend stores the
/// record locally before pushing it to the TMS, so a TMS failure is a
/// warning, not a loss.
#[derive(Debug)]
pub enum BaixaOutcome {
    Registrada(BaixaResponse),
    /// Stored in the app, but the TMS integration reported an error.
    SalvaComAlertaTms { erro: String },
}

/// Client for the manifest endpoints. Cheap to clone by sharing the session.
pub struct ManifestoClient {
    session: Arc<AuthSession>,
    config: ClientConfig,
}

impl ManifestoClient {
    pub fn new(session: Arc<AuthSession>) -> Self {
        let config = session.config().clone();
        Self { session, config }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// A poller bound to this client's session and config.
    pub fn poller(&self) -> StatusPoller {
        StatusPoller::new(Arc::clone(&self.session), self.config.clone())
    }

    /// Follow the enrichment job for `numero`: a poller already polling it
    /// plus its event channel. Keep the poller alive while consuming events;
    /// dropping it cancels the poll.
    pub fn acompanhar(
        &self,
        numero: impl Into<String>,
    ) -> (StatusPoller, mpsc::Receiver<PollEvent>) {
        let mut poller = self.poller();
        let events = poller.start(numero);
        (poller, events)
    }

    /// Start the server-side enrichment job for a manifest number. On
    /// acceptance the number is persisted as the active manifest so a page
    /// reload (or CLI restart) can resume polling.
    pub async fn buscar_manifesto(&self, numero: &str) -> Result<MensagemResponse, ApiError> {
        let url = format!("{}manifesto/busca/", self.config.api_base);
        let req = ApiRequest::post_json(
            &url,
            &BuscaRequest {
                numero_manifesto: numero.to_string(),
            },
        );
        let resp = self.session.authorized_request(&req).await?;
        let mensagem: MensagemResponse = expect_json(resp, &url).await?;

        if let Err(e) = self.session.store().set_manifesto_ativo(numero).await {
            tracing::warn!(error = %e, "falha ao persistir manifesto ativo");
        }
        Ok(mensagem)
    }

    /// One-shot status check of the enrichment job (the poller drives this
    /// endpoint on a cadence; this is for ad-hoc queries).
    pub async fn status_busca(&self, numero: &str) -> Result<StatusResponse, ApiError> {
        let url = format!(
            "{}manifesto/status/?numero_manifesto={}",
            self.config.api_base,
            urlencoding::encode(numero)
        );
        let resp = self.session.authorized_request(&ApiRequest::get(&url)).await?;
        expect_json(resp, &url).await
    }

    /// Invoice list of the manifest, growing while enrichment is in flight.
    pub async fn listar_notas(&self, numero: &str) -> Result<Vec<Nota>, ApiError> {
        let url = format!(
            "{}manifesto/notas/?numero_manifesto={}",
            self.config.api_base,
            urlencoding::encode(numero)
        );
        let resp = self.session.authorized_request(&ApiRequest::get(&url)).await?;
        expect_json(resp, &url).await
    }

    /// Ask the backend whether the driver already has a manifest in flight,
    /// persisting the number locally when there is one.
    pub async fn verificar_ativo(&self) -> Result<ManifestoAtivo, ApiError> {
        let url = format!("{}manifesto/verificar-ativo/", self.config.api_base);
        let resp = self.session.authorized_request(&ApiRequest::get(&url)).await?;
        let ativo: ManifestoAtivo = expect_json(resp, &url).await?;

        if ativo.tem_manifesto {
            if let Some(numero) = &ativo.numero_manifesto {
                if let Err(e) = self.session.store().set_manifesto_ativo(numero).await {
                    tracing::warn!(error = %e, "falha ao persistir manifesto ativo");
                }
            }
        }
        Ok(ativo)
    }

    /// Record a delivery occurrence (multipart: occurrence code, invoice key,
    /// recipient, optional GPS, optional photo).
    pub async fn registrar_baixa(&self, registro: &BaixaRegistro) -> Result<BaixaOutcome, ApiError> {
        if registro.exige_foto() && registro.foto.is_none() {
            return Err(ApiError::Status {
                status: reqwest::StatusCode::BAD_REQUEST,
                mensagem: "foto obrigatória para este código de ocorrência".to_string(),
            });
        }

        let mut fields = vec![
            MultipartField::text("ocorrencia_codigo", &registro.ocorrencia_codigo),
            MultipartField::text("chave_acesso", &registro.chave_acesso),
            MultipartField::text("manifesto_id", &registro.manifesto_id),
            MultipartField::text("recebedor", &registro.recebedor),
        ];
        if let Some(lat) = registro.latitude {
            fields.push(MultipartField::text("latitude", lat.to_string()));
        }
        if let Some(lon) = registro.longitude {
            fields.push(MultipartField::text("longitude", lon.to_string()));
        }
        if let Some(foto) = &registro.foto {
            fields.push(MultipartField::file(
                "foto",
                &foto.file_name,
                "image/jpeg",
                foto.bytes.clone(),
            ));
        }

        let url = format!("{}manifesto/registrar-baixa/", self.config.api_base);
        let req = ApiRequest::post_multipart(&url, fields);
        let resp = self.session.authorized_request(&req).await?;

        let status = resp.status();
        if status.is_success() {
            let body: BaixaResponse = resp.json().await.map_err(|e| ApiError::Malformed {
                url: url.clone(),
                source: e,
            })?;
            return Ok(BaixaOutcome::Registrada(body));
        }

        // A non-2xx body is not always the app's JSON — proxies answer with
        // HTML error pages. Those become a plain status error.
        match resp.json::<BaixaResponse>().await {
            Ok(body) if body.tms_failed() => Ok(BaixaOutcome::SalvaComAlertaTms {
                erro: body
                    .erro
                    .unwrap_or_else(|| "erro de integração com o TMS".to_string()),
            }),
            Ok(body) => Err(ApiError::Status {
                status,
                mensagem: body
                    .erro
                    .or(body.mensagem)
                    .unwrap_or_else(|| "erro no servidor".to_string()),
            }),
            Err(_) => Err(ApiError::Status {
                status,
                mensagem: "erro no servidor".to_string(),
            }),
        }
    }

    /// Finish the active manifest with the final odometer reading. Clears the
    /// persisted active-manifest key on success.
    pub async fn finalizar_manifesto(&self, km_final: u64) -> Result<MensagemResponse, ApiError> {
        let url = format!("{}manifesto/finalizar/", self.config.api_base);
        let req = ApiRequest::post_json(&url, &FinalizarRequest { km_final });
        let resp = self.session.authorized_request(&req).await?;
        let mensagem: MensagemResponse = expect_json(resp, &url).await?;

        if let Err(e) = self.session.store().clear_manifesto_ativo().await {
            tracing::warn!(error = %e, "falha ao limpar manifesto ativo");
        }
        Ok(mensagem)
    }
}

/// Decode a 2xx body, or surface the backend's `mensagem`/`erro` on non-2xx.
async fn expect_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    url: &str,
) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let mensagem = extract_mensagem(resp).await;
        return Err(ApiError::Status { status, mensagem });
    }
    resp.json().await.map_err(|e| ApiError::Malformed {
        url: url.to_string(),
        source: e,
    })
}

async fn extract_mensagem(resp: reqwest::Response) -> String {
    match resp.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("mensagem")
            .or_else(|| body.get("erro"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "erro no servidor".to_string()),
        Err(_) => "erro no servidor".to_string(),
    }
}
