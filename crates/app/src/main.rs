mod args;
mod flows;
mod terminal;

use services::{AppServices, AssessmentTarget, ClientConfig, Clock};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{ArgsError, Command, DEFAULT_LOG_FILTER, print_usage};
use crate::flows::Terminal;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// The cache database must exist before the pool opens it.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::Invalid {
        what: "COURSE_CACHE_DB",
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let command = Command::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if command == Command::Help {
        print_usage();
        return Ok(());
    }

    let mut config = ClientConfig::from_env()?;
    config.cache_db = normalize_sqlite_url(config.cache_db);
    prepare_sqlite_file(&config.cache_db)?;

    tracing::info!(base_url = %config.base_url, cache = %config.cache_db, "starting");
    let app = AppServices::connect(config, Clock::default()).await?;
    let _banner = flows::watch_rate_limit(&app);

    match command {
        Command::Dashboard => flows::dashboard(&app).await,
        Command::Learn { slug, lesson } => Terminal::new(app).learn(slug, lesson).await,
        Command::Test {
            category,
            difficulty,
        } => {
            Terminal::new(app)
                .test(AssessmentTarget::Test {
                    category,
                    difficulty,
                })
                .await
        }
        Command::Resume { kind, session } => Terminal::new(app).resume(kind, session).await,
        Command::Draft { lesson, publish } => Terminal::new(app).draft(lesson, publish).await,
        Command::Help => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/cache.db".into()),
            "sqlite:///tmp/cache.db"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:/var/cache.db".into()),
            "sqlite:///var/cache.db"
        );
        assert!(normalize_sqlite_url("cache.db".into()).ends_with("/cache.db"));
    }

    #[test]
    fn memory_database_needs_no_file() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(prepare_sqlite_file("postgres://x").is_err());
    }
}
