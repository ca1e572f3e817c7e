use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use dogear::client::FileCache;
use dogear::config::Config;
use dogear::storage::{ArticleQuery, ArticleSort, Database, StoreError};
use dogear::sync::sync_articles;

/// Get the config directory path (~/.config/dogear/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("dogear");
    Ok(config_dir)
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "dogear", about = "A read-it-later article store with offline sync", version)]
struct Args {
    /// Database file (defaults to ~/.config/dogear/dogear.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// User whose articles the command operates on
    #[arg(long, value_name = "ID")]
    user: Option<String>,

    /// Reconcile a cache file against the store and rewrite it with the merged list
    #[arg(long, value_name = "FILE")]
    sync: Option<PathBuf>,

    /// Print the user's saved articles
    #[arg(long)]
    list: bool,

    /// Sort order for --list (savedAt-desc, title-asc, progressPercent-asc, ...)
    #[arg(long, value_name = "ORDER")]
    sort: Option<ArticleSort>,

    /// Reset the database (deletes all articles, highlights, and notes)
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.sync.is_none() && !args.list && !args.reset_db {
        eprintln!("Nothing to do. Try --sync <FILE>, --list, or --help.");
        std::process::exit(2);
    }

    let config_dir = get_config_dir()?;
    std::fs::create_dir_all(&config_dir).with_context(|| {
        format!(
            "Failed to create config directory '{}'",
            config_dir.display()
        )
    })?;

    // Restrict config directory permissions. The database and cache files
    // under it hold per-user reading data.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(error = %e, "Failed to restrict config directory permissions");
        }
    }

    let config = Config::load(&config_dir.join("config.toml"))?;

    let db_path = args
        .db
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(|| config_dir.join("dogear.db"));
    let db_path_str = db_path
        .to_str()
        .context("Database path contains invalid UTF-8")?;

    if args.reset_db {
        match std::fs::remove_file(&db_path) {
            Ok(()) => println!("Database reset."),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("No database to reset.");
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove database file '{}'", db_path.display())
                });
            }
        }
        if args.sync.is_none() && !args.list {
            return Ok(());
        }
    }

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of dogear appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open database '{}'", db_path.display()));
        }
    };

    let user = args.user.unwrap_or(config.user);

    if let Some(cache_path) = args.sync {
        let mut cache = FileCache::open(&cache_path)
            .with_context(|| format!("Failed to open cache file '{}'", cache_path.display()))?;

        let outcome = sync_articles(&db, &user, cache.articles())
            .await
            .context("Sync failed")?;

        let total = outcome.articles.len();
        cache.replace_articles(outcome.articles).with_context(|| {
            format!("Failed to rewrite cache file '{}'", cache_path.display())
        })?;

        println!(
            "Synced {} articles ({} created, {} updated, {} failed).",
            total, outcome.created, outcome.updated, outcome.failed
        );
    }

    if args.list {
        let query = ArticleQuery {
            sort: args.sort.unwrap_or_default(),
            limit: Some(config.page_size),
            ..ArticleQuery::default()
        };
        let page = db
            .list_articles(&user, &query)
            .await
            .context("Failed to list articles")?;

        if page.articles.is_empty() {
            println!("No articles saved for '{}'.", user);
            return Ok(());
        }

        for article in &page.articles {
            println!(
                "{:>5}  {:<11}  {:>3}%  {}  <{}>",
                article.id,
                article.status.as_str(),
                article.progress_percent,
                article.title,
                article.url
            );
        }
        println!(
            "Page {}/{} ({} articles total).",
            page.page, page.pages, page.total
        );
    }

    Ok(())
}
