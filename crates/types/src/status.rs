// crates/types/src/status.rs
//! Enrichment job status as reported by `GET manifesto/status/`.

use serde::{Deserialize, Serialize};

/// Raw status string of the server-side enrichment job.
///
/// `Enriquecendo`, `Aguardando` and `Processando` are all in-flight states —
/// the TMS export pipeline reports whichever phase it is in, and the client
/// treats them identically (keep polling, refresh the invoice list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrichmentStatus {
    #[serde(rename = "ENRIQUECENDO")]
    Enriquecendo,
    #[serde(rename = "AGUARDANDO")]
    Aguardando,
    #[serde(rename = "PROCESSANDO")]
    Processando,
    #[serde(rename = "PROCESSADO")]
    Processado,
    #[serde(rename = "ERRO")]
    Erro,
}

impl EnrichmentStatus {
    /// True while the enrichment pipeline is still producing invoices.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Enriquecendo | Self::Aguardando | Self::Processando
        )
    }

    /// True once the job reached an outcome (success or failure).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processado | Self::Erro)
    }
}

/// Response of `GET manifesto/status/?numero_manifesto=<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: EnrichmentStatus,
    /// Human-readable failure description, present when status is `ERRO`.
    #[serde(default)]
    pub mensagem_erro: Option<String>,
    /// Optional job metadata forwarded from the enrichment pipeline.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}
