// crates/types/src/baixa.rs
//! Delivery occurrence (baixa) payload for `POST manifesto/registrar-baixa/`.

use serde::Deserialize;

/// Photo proof attached to an occurrence. Owned bytes so the multipart form
/// can be rebuilt if the request has to be retried after a token renewal.
#[derive(Debug, Clone)]
pub struct FotoComprovante {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FotoComprovante {
    /// Conventional file name: `mft_<manifesto>_<chave>.jpg`, so a re-sent
    /// photo overwrites the previous upload instead of piling up on the FTP.
    pub fn jpeg(manifesto_id: &str, chave_acesso: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("mft_{manifesto_id}_{chave_acesso}.jpg"),
            bytes,
        }
    }
}

/// One recorded delivery outcome for an invoice. Sent as multipart form data;
/// GPS and photo are optional so a dead GPS or camera never blocks a delivery.
#[derive(Debug, Clone)]
pub struct BaixaRegistro {
    /// TMS occurrence code (e.g. "1" = delivered).
    pub ocorrencia_codigo: String,
    /// NF-e access key of the settled invoice.
    pub chave_acesso: String,
    pub manifesto_id: String,
    pub recebedor: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub foto: Option<FotoComprovante>,
}

impl BaixaRegistro {
    /// Occurrence codes whose proof photo is mandatory (delivered variants).
    pub fn exige_foto(&self) -> bool {
        matches!(self.ocorrencia_codigo.as_str(), "1" | "2")
    }
}

/// Response of the registrar-baixa endpoint. `status_integracao` is set to
/// `"erro_tms"` when the record was stored locally but the TMS push failed.
#[derive(Debug, Deserialize)]
pub struct BaixaResponse {
    #[serde(default)]
    pub mensagem: Option<String>,
    #[serde(default)]
    pub status_integracao: Option<String>,
    #[serde(default)]
    pub erro: Option<String>,
}

impl BaixaResponse {
    pub fn tms_failed(&self) -> bool {
        self.status_integracao.as_deref() == Some("erro_tms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foto_file_name() {
        let foto = FotoComprovante::jpeg("55041", "3520...0000", vec![0xff, 0xd8]);
        assert_eq!(foto.file_name, "mft_55041_3520...0000.jpg");
    }

    #[test]
    fn test_exige_foto_by_codigo() {
        let mut registro = BaixaRegistro {
            ocorrencia_codigo: "1".into(),
            chave_acesso: "k".into(),
            manifesto_id: "m".into(),
            recebedor: String::new(),
            latitude: None,
            longitude: None,
            foto: None,
        };
        assert!(registro.exige_foto());
        registro.ocorrencia_codigo = "7".into();
        assert!(!registro.exige_foto());
    }

    #[test]
    fn test_baixa_response_tms_failure() {
        let resp: BaixaResponse = serde_json::from_str(
            r#"{"status_integracao":"erro_tms","erro":"ESL indisponível"}"#,
        )
        .unwrap();
        assert!(resp.tms_failed());
        assert_eq!(resp.erro.as_deref(), Some("ESL indisponível"));
    }
}
