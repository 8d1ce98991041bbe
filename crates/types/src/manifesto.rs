// crates/types/src/manifesto.rs
//! Manifest and invoice records returned by the manifest API.

use serde::{Deserialize, Serialize};

/// Body for `POST manifesto/busca/` — starts the server-side enrichment job.
#[derive(Debug, Serialize)]
pub struct BuscaRequest {
    pub numero_manifesto: String,
}

/// One invoice (NF-e) of the manifest, from `GET manifesto/notas/`.
///
/// The list grows while enrichment is in flight; `ja_baixada` flips once the
/// driver records an occurrence for the invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct Nota {
    pub numero_nota: String,
    /// 44-digit NF-e access key.
    pub chave_acesso: String,
    pub destinatario: String,
    pub endereco_entrega: String,
    #[serde(default)]
    pub ja_baixada: bool,
    /// Occurrence details, present once the invoice was settled.
    #[serde(default)]
    pub dados_baixa: Option<serde_json::Value>,
}

/// Response of `GET manifesto/verificar-ativo/` — lets the client restore an
/// in-flight manifest after a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestoAtivo {
    pub tem_manifesto: bool,
    #[serde(default)]
    pub numero_manifesto: Option<String>,
}

/// Generic `{"mensagem": ...}` envelope the backend uses for acks and errors.
#[derive(Debug, Deserialize)]
pub struct MensagemResponse {
    pub mensagem: String,
}

/// Body for `POST manifesto/finalizar/`.
#[derive(Debug, Serialize)]
pub struct FinalizarRequest {
    pub km_final: u64,
}
