mod analyzer; mod detector; mod history; mod server; mod ui;

use std::io::Read;
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{bail, Context};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use analyzer::{Analysis, Analyzer};
use detector::ErrorDetector;
use history::HistoryStore;
use ui::UiEvent;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/analyze";
const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_UPSTREAM: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        // The TUI owns the terminal, so no log output there.
        None => run_tui(),
        Some("analyze") => {
            init_logging();
            run_analyze(args.get(1).map(String::as_str))
        }
        Some("serve") => {
            init_logging();
            run_serve()
        }
        Some("history") => {
            init_logging();
            run_history()
        }
        Some("clear") => {
            init_logging();
            run_clear()
        }
        Some(other) => bail!(
            "unknown command `{other}` (expected analyze, serve, history, clear, or no argument for the TUI)"
        ),
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn endpoint_url() -> String {
    std::env::var("ERRSIGHT_API_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.into())
}

fn open_store() -> anyhow::Result<HistoryStore> {
    let mut store = HistoryStore::new(HistoryStore::default_path()?);
    store.load();
    Ok(store)
}

fn run_tui() -> anyhow::Result<()> {
    let rt = Arc::new(Runtime::new()?);
    let analyzer = Arc::new(Analyzer::new(endpoint_url())?);
    let store = Arc::new(Mutex::new(open_store()?));
    let (tx, rx) = mpsc::channel::<UiEvent>();

    ui::run_loop(rx, move |line: String| {
        let line = line.trim().to_string();
        match line.as_str() {
            ":history" => {
                if let Ok(store) = store.lock() {
                    if store.list().is_empty() {
                        let _ = tx.send(UiEvent::Status("history is empty".into()));
                    }
                    for record in store.list() {
                        let _ = tx.send(UiEvent::Status(format!(
                            "{}  {}",
                            record.timestamp, record.error
                        )));
                    }
                }
                false
            }
            ":clear" => {
                if let Ok(mut store) = store.lock() {
                    store.clear();
                }
                let _ = tx.send(UiEvent::Status("history cleared".into()));
                false
            }
            _ => {
                let analyzer = analyzer.clone();
                let store = store.clone();
                let tx = tx.clone();
                rt.spawn(async move {
                    match analyzer.analyze(&line).await {
                        Ok(analysis) => {
                            // Appends are serialized through the mutex; a
                            // failed analysis never reaches the history.
                            if let Ok(mut store) = store.lock() {
                                store.append(&line, analysis.clone());
                            }
                            let _ = tx.send(UiEvent::Analysis(analysis));
                        }
                        Err(e) => {
                            let _ = tx.send(UiEvent::Failure(e.to_string()));
                        }
                    }
                });
                true
            }
        }
    })
}

fn run_analyze(path: Option<&str>) -> anyhow::Result<()> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("no error text supplied");
    }

    let detector = ErrorDetector::new(true);
    if !detector.looks_like_error(&text) {
        tracing::warn!("input does not look like an error message, analyzing anyway");
    }

    let analyzer = Analyzer::new(endpoint_url())?;
    let rt = Runtime::new()?;
    let analysis = rt.block_on(analyzer.analyze(&text))?;

    let mut store = open_store()?;
    store.append(&text, analysis.clone());
    print_analysis(&analysis);
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    println!("{}", analysis.explanation);
    if !analysis.solutions.is_empty() {
        println!("\nhow to fix it:");
        for (i, step) in analysis.solutions.iter().enumerate() {
            println!("  {}. {}", i + 1, step);
        }
    }
    if let Some(fix) = &analysis.fix {
        println!("\nsuggested fix:\n{}", fix.code);
        for pro in &fix.pros {
            println!("  + {pro}");
        }
        for con in &fix.cons {
            println!("  - {con}");
        }
    }
}

fn run_history() -> anyhow::Result<()> {
    let store = open_store()?;
    if store.list().is_empty() {
        println!("history is empty");
        return Ok(());
    }
    for record in store.list() {
        println!("{}  {}", record.timestamp, record.error);
    }
    Ok(())
}

fn run_clear() -> anyhow::Result<()> {
    let mut store = open_store()?;
    store.clear();
    println!("history cleared");
    Ok(())
}

fn run_serve() -> anyhow::Result<()> {
    let bind = std::env::var("ERRSIGHT_BIND").unwrap_or_else(|_| DEFAULT_BIND.into());
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    let upstream =
        std::env::var("ERRSIGHT_UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM.into());
    if api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; analyze requests will fail");
    }
    let state = Arc::new(server::ServerState::new(api_key, upstream)?);
    Runtime::new()?.block_on(server::serve(&bind, state))
}
