// crates/client/src/poller.rs
//! Status poller for the server-side enrichment job.
//!
//! Polling, not push: the enrichment job's completion time is unbounded and
//! owned by the external TMS, so the client asks on a fixed cadence until a
//! terminal answer arrives. Each tick classifies the reported status into at
//! most one [`PollEvent`]; the one-time `SwitchedToLive` keeps consumers from
//! tearing down and rebuilding their live view on every tick — only content
//! refreshes after the first in-flight status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use manifesto_types::{EnrichmentStatus, StatusResponse};

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::request::ApiRequest;

/// Events emitted over the poll channel, at most one per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// First in-flight status seen — consumers switch to the live view once.
    SwitchedToLive { numero: String },
    /// Subsequent in-flight tick — refresh content, keep the view.
    Refresh { numero: String },
    /// Terminal success. No further ticks.
    Ready { numero: String },
    /// Terminal server-reported failure, with the backend's message.
    Failed { numero: String, mensagem: String },
    /// The refresh token itself was rejected mid-poll; credentials were
    /// cleared and the driver must log in again. Terminal.
    SessionExpired,
}

/// What a tick decided, given the reported status and whether the live view
/// is already showing. Pure so the state machine is testable without I/O.
#[derive(Debug, PartialEq, Eq)]
enum Transition {
    SwitchToLive,
    Refresh,
    Finish,
    Fail(String),
}

fn classify(resp: &StatusResponse, switched: bool) -> Transition {
    match resp.status {
        EnrichmentStatus::Enriquecendo
        | EnrichmentStatus::Aguardando
        | EnrichmentStatus::Processando => {
            if switched {
                Transition::Refresh
            } else {
                Transition::SwitchToLive
            }
        }
        EnrichmentStatus::Processado => Transition::Finish,
        EnrichmentStatus::Erro => Transition::Fail(
            resp.mensagem_erro
                .clone()
                .unwrap_or_else(|| "Erro no processamento".to_string()),
        ),
    }
}

/// Owns at most one polling task at a time. Starting a new poll cancels the
/// previous one; dropping the poller cancels whatever is running.
pub struct StatusPoller {
    session: Arc<AuthSession>,
    config: ClientConfig,
    current: Option<PollTask>,
}

struct PollTask {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StatusPoller {
    pub fn new(session: Arc<AuthSession>, config: ClientConfig) -> Self {
        Self {
            session,
            config,
            current: None,
        }
    }

    /// Begin polling the status endpoint for `numero`. Any poll already owned
    /// by this poller is stopped first, and the switched-to-live flag starts
    /// fresh. Events arrive on the returned channel; dropping the receiver
    /// also ends the poll.
    pub fn start(&mut self, numero: impl Into<String>) -> mpsc::Receiver<PollEvent> {
        self.stop();
        let numero = numero.into();
        let (event_tx, event_rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.session),
            self.config.clone(),
            numero,
            event_tx,
            cancel_rx,
        ));
        self.current = Some(PollTask {
            cancel_tx: Some(cancel_tx),
            task,
        });
        event_rx
    }

    /// Cancel the running poll, if any. After this returns no further tick
    /// executes. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut poll) = self.current.take() {
            if let Some(tx) = poll.cancel_tx.take() {
                let _ = tx.send(());
            }
            poll.task.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|poll| !poll.task.is_finished())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

enum TickOutcome {
    /// Transient trouble (network, 401 with renewal in flight, parse error,
    /// 5xx). State unchanged, the next tick re-checks.
    Skip,
    Status(StatusResponse),
    SessionExpired,
}

async fn poll_loop(
    session: Arc<AuthSession>,
    config: ClientConfig,
    numero: String,
    events: mpsc::Sender<PollEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let url = format!(
        "{}manifesto/status/?numero_manifesto={}",
        config.api_base,
        urlencoding::encode(&numero)
    );
    // `ClientConfig` normalizes a zero interval away, but the field is public
    // and `tokio::time::interval` panics on zero.
    let cadence = config.poll_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick resolves immediately; consume it so the first
    // real tick happens one full interval after start.
    ticker.tick().await;

    let mut switched = false;
    loop {
        tokio::select! {
            biased;
            _ = &mut cancel_rx => return,
            _ = ticker.tick() => {}
        }

        let resp = match tick(&session, &url).await {
            TickOutcome::Skip => continue,
            TickOutcome::SessionExpired => {
                let _ = events.send(PollEvent::SessionExpired).await;
                return;
            }
            TickOutcome::Status(resp) => resp,
        };

        let event = match classify(&resp, switched) {
            Transition::SwitchToLive => {
                switched = true;
                PollEvent::SwitchedToLive {
                    numero: numero.clone(),
                }
            }
            Transition::Refresh => PollEvent::Refresh {
                numero: numero.clone(),
            },
            Transition::Finish => PollEvent::Ready {
                numero: numero.clone(),
            },
            Transition::Fail(mensagem) => PollEvent::Failed {
                numero: numero.clone(),
                mensagem,
            },
        };

        let terminal = matches!(event, PollEvent::Ready { .. } | PollEvent::Failed { .. });
        if events.send(event).await.is_err() {
            // Receiver gone — nobody is watching, stop polling.
            return;
        }
        if terminal {
            return;
        }
    }
}

async fn tick(session: &AuthSession, url: &str) -> TickOutcome {
    let req = ApiRequest::get(url);
    let resp = match session.authorized_request(&req).await {
        Ok(resp) => resp,
        Err(AuthError::SessionExpired) => return TickOutcome::SessionExpired,
        Err(e) => {
            tracing::warn!(url, error = %e, "falha no ciclo de polling");
            return TickOutcome::Skip;
        }
    };

    // 401 surviving the auth layer means a renewal (triggered by a concurrent
    // request) is in flight; the next tick re-checks naturally.
    if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
        tracing::debug!(url, "401 durante renovação concorrente, ciclo ignorado");
        return TickOutcome::Skip;
    }
    if !resp.status().is_success() {
        tracing::warn!(url, status = %resp.status(), "status endpoint respondeu erro, ciclo ignorado");
        return TickOutcome::Skip;
    }

    match resp.json::<StatusResponse>().await {
        Ok(status) => TickOutcome::Status(status),
        Err(e) => {
            tracing::warn!(url, error = %e, "resposta de status malformada, ciclo ignorado");
            TickOutcome::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: EnrichmentStatus, mensagem_erro: Option<&str>) -> StatusResponse {
        StatusResponse {
            status,
            mensagem_erro: mensagem_erro.map(str::to_string),
            payload: None,
        }
    }

    #[test]
    fn test_first_in_flight_status_switches_to_live() {
        let resp = status(EnrichmentStatus::Aguardando, None);
        assert_eq!(classify(&resp, false), Transition::SwitchToLive);
    }

    #[test]
    fn test_repeated_in_flight_status_only_refreshes() {
        for s in [
            EnrichmentStatus::Enriquecendo,
            EnrichmentStatus::Aguardando,
            EnrichmentStatus::Processando,
        ] {
            assert_eq!(classify(&status(s, None), true), Transition::Refresh);
        }
    }

    #[test]
    fn test_processado_is_terminal() {
        let resp = status(EnrichmentStatus::Processado, None);
        assert_eq!(classify(&resp, true), Transition::Finish);
        assert_eq!(classify(&resp, false), Transition::Finish);
    }

    #[test]
    fn test_erro_carries_server_message() {
        let resp = status(EnrichmentStatus::Erro, Some("Documento não confere"));
        assert_eq!(
            classify(&resp, true),
            Transition::Fail("Documento não confere".to_string())
        );
    }

    #[test]
    fn test_erro_without_message_gets_default() {
        let resp = status(EnrichmentStatus::Erro, None);
        assert_eq!(
            classify(&resp, false),
            Transition::Fail("Erro no processamento".to_string())
        );
    }
}
