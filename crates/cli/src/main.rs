// crates/cli/src/main.rs
//! `manifesto` binary — driver-side CLI for the manifest tracking backend.
//!
//! Mirrors the PWA flow: log in, search a manifest (which starts the
//! server-side enrichment job), follow the job with a spinner while the
//! invoice list grows, then record delivery occurrences per invoice.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use manifesto_client::{
    AuthSession, BaixaOutcome, ClientConfig, CredentialStore, ManifestoClient, PollEvent,
};
use manifesto_types::{BaixaRegistro, FotoComprovante, Nota};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manifesto", about = "Acompanhamento de manifestos de entrega", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Autentica o motorista e grava as credenciais localmente.
    Login {
        /// CPF do motorista (username no backend).
        cpf: String,
        /// Senha; se omitida, é lida do terminal.
        #[arg(long)]
        senha: Option<String>,
    },
    /// Busca um manifesto e acompanha o enriquecimento até o fim.
    Buscar { numero: String },
    /// Lista as notas do manifesto ativo (ou de um número específico).
    Notas { numero: Option<String> },
    /// Registra a baixa de uma nota fiscal.
    Baixa {
        /// Código de ocorrência do TMS (1/2 = entregue, exigem foto).
        #[arg(long)]
        codigo: String,
        /// Chave de acesso da NF-e.
        #[arg(long)]
        chave: String,
        #[arg(long, default_value = "")]
        recebedor: String,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
        /// Foto do canhoto (JPEG).
        #[arg(long)]
        foto: Option<PathBuf>,
    },
    /// Finaliza o manifesto ativo informando o KM final.
    Finalizar { km_final: u64 },
    /// Remove as credenciais gravadas.
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let store = Arc::new(CredentialStore::open_default()?);
    let session = Arc::new(AuthSession::new(config, store)?);
    let client = ManifestoClient::new(Arc::clone(&session));

    match cli.command {
        Command::Login { cpf, senha } => {
            let senha = match senha {
                Some(senha) => senha,
                None => prompt("Senha: ")?,
            };
            session.login(&cpf, &senha).await?;
            println!("✅ Autenticado. Credenciais gravadas.");
        }
        Command::Buscar { numero } => {
            let ack = client
                .buscar_manifesto(&numero)
                .await
                .context("falha ao iniciar a busca do manifesto")?;
            println!("{}", ack.mensagem);
            acompanhar(&client, &numero).await?;
        }
        Command::Notas { numero } => {
            let numero = match numero {
                Some(numero) => numero,
                None => active_manifest(&client).await?,
            };
            let notas = client.listar_notas(&numero).await?;
            print_notas(&notas);
        }
        Command::Baixa {
            codigo,
            chave,
            recebedor,
            lat,
            lon,
            foto,
        } => {
            let numero = active_manifest(&client).await?;
            let foto = match foto {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("falha ao ler a foto {}", path.display()))?;
                    Some(FotoComprovante::jpeg(&numero, &chave, bytes))
                }
                None => None,
            };
            let registro = BaixaRegistro {
                ocorrencia_codigo: codigo,
                chave_acesso: chave,
                manifesto_id: numero,
                recebedor,
                latitude: lat,
                longitude: lon,
                foto,
            };
            match client.registrar_baixa(&registro).await? {
                BaixaOutcome::Registrada(_) => {
                    println!("✅ Registro cadastrado com sucesso.");
                }
                BaixaOutcome::SalvaComAlertaTms { erro } => {
                    println!("⚠️  Canhoto salvo no app, mas houve erro na integração: {erro}");
                }
            }
        }
        Command::Finalizar { km_final } => {
            let ack = client.finalizar_manifesto(km_final).await?;
            println!("{}", ack.mensagem);
        }
        Command::Logout => {
            session.logout().await?;
            println!("Sessão finalizada. Credenciais removidas.");
        }
    }
    Ok(())
}

/// Follow the enrichment job with a spinner until a terminal state.
async fn acompanhar(client: &ManifestoClient, numero: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner.set_message("Validando acesso e motorista...");

    let (_poller, mut events) = client.acompanhar(numero);

    while let Some(event) = events.recv().await {
        match event {
            PollEvent::SwitchedToLive { .. } => {
                spinner.set_message("Sincronizando com o TMS...");
            }
            PollEvent::Refresh { numero } => {
                if let Ok(notas) = client.listar_notas(&numero).await {
                    let baixadas = notas.iter().filter(|n| n.ja_baixada).count();
                    spinner.set_message(format!(
                        "Sincronizando... {} notas ({baixadas} baixadas)",
                        notas.len()
                    ));
                }
            }
            PollEvent::Ready { numero } => {
                spinner.finish_with_message("✅ Sincronização concluída");
                let notas = client.listar_notas(&numero).await?;
                print_notas(&notas);
                return Ok(());
            }
            PollEvent::Failed { mensagem, .. } => {
                spinner.finish_and_clear();
                bail!("erro no processamento do manifesto: {mensagem}");
            }
            PollEvent::SessionExpired => {
                spinner.finish_and_clear();
                bail!("sessão expirada — rode `manifesto login` novamente");
            }
        }
    }
    Ok(())
}

/// Resolve the active manifest: local store first, backend as fallback.
async fn active_manifest(client: &ManifestoClient) -> Result<String> {
    if let Some(numero) = client.session().store().manifesto_ativo().await {
        return Ok(numero);
    }
    let ativo = client.verificar_ativo().await?;
    match ativo.numero_manifesto {
        Some(numero) if ativo.tem_manifesto => Ok(numero),
        _ => bail!("nenhum manifesto ativo — rode `manifesto buscar <numero>` primeiro"),
    }
}

fn print_notas(notas: &[Nota]) {
    if notas.is_empty() {
        println!("Nenhuma nota no manifesto ainda.");
        return;
    }
    let baixadas = notas.iter().filter(|n| n.ja_baixada).count();
    println!("{} notas, {} baixadas:", notas.len(), baixadas);
    for nota in notas {
        let marcador = if nota.ja_baixada { "✔" } else { "•" };
        println!(
            "  {marcador} NF {} — {} — {}",
            nota.numero_nota, nota.destinatario, nota.endereco_entrega
        );
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut value = String::new();
    std::io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}
