use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context as _;
use catalog_application::AppContext;
use catalog_core::Settings;
use catalog_lookup::{LookupWorker, SimilarBooksClient};
use catalog_storage::Storage;
use catalog_ui::Ui;
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DB_ENV: &str = "BOOK_CATALOG_DB";
const LOOKUP_URL_ENV: &str = "BOOK_CATALOG_LOOKUP_URL";
const OFFLINE_ENV: &str = "BOOK_CATALOG_OFFLINE";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dirs =
        ProjectDirs::from("dev", "catalog", "book-catalog").context("resolve project dirs")?;

    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;

    init_tracing(data_dir)?;
    info!("starting book catalog");

    let db_path = std::env::var_os(DB_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("catalog.db"));
    let storage = open_storage(&db_path)?;

    let stored = storage.load_settings()?;
    storage.save_settings(&stored)?;
    let mut settings = stored;
    apply_env_overrides(&mut settings);

    let books = storage.load_books();
    let loans = storage.load_loans();
    info!(books = books.len(), loans = loans.len(), "loaded collections");

    let mut ctx = AppContext::new(settings).with_books(books).with_loans(loans);
    let lookup = start_lookup(&mut ctx.settings);

    let ui = Ui::new(ctx, Box::new(storage), lookup);
    let ctx = ui.run()?;
    info!(
        books = ctx.catalog().len(),
        loans = ctx.loans().len(),
        "exiting"
    );
    Ok(())
}

fn init_tracing(data_dir: &Path) -> anyhow::Result<()> {
    let log_path = data_dir.join("catalog.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Falls back to an in-memory database so the session still works, unsaved.
fn open_storage(path: &Path) -> anyhow::Result<Storage> {
    match Storage::open(path) {
        Ok(storage) => Ok(storage),
        Err(err) => {
            warn!("storage unavailable, changes will not persist: {err:#}");
            Storage::open_in_memory()
        }
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(url) = std::env::var(LOOKUP_URL_ENV) {
        settings.lookup_base_url = url;
    }
    if std::env::var(OFFLINE_ENV).is_ok_and(|value| value == "1") {
        settings.similar_books_enabled = false;
    }
    settings.normalize();
}

fn start_lookup(settings: &mut Settings) -> Option<LookupWorker> {
    if !settings.similar_books_enabled {
        return None;
    }
    let worker = SimilarBooksClient::new(settings).and_then(LookupWorker::new);
    match worker {
        Ok(worker) => Some(worker),
        Err(err) => {
            warn!("similar books lookup disabled: {err:#}");
            settings.similar_books_enabled = false;
            None
        }
    }
}
