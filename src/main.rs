use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docs_rag::commands::{
    ask_question, index_documents, reset_collection, search_documents, serve_http, show_status,
};
use docs_rag::config::{Config, get_config_dir, show_config};
use docs_rag::context::RagContext;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Chat with a local document collection through a local language model")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the embedded vector database
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index the documents directory
    Index {
        /// Directory to index instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Drop and recreate the collection first
        #[arg(long)]
        reset: bool,
    },
    /// Show the excerpts retrieved for a query
    Search {
        query: String,
        /// Maximum number of candidates to fetch
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ask a question and print the answer with its sources
    Ask { question: String },
    /// Start the HTTP chat server
    Serve {
        /// Port to listen on instead of the configured one
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show connectivity and collection status
    Status,
    /// Drop and recreate the collection
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&config)?;
        } else {
            config.save()?;
            println!("Configuration written to {}", config.config_file_path().display());
        }
        return Ok(());
    }

    let context = RagContext::init(config)
        .await
        .context("Failed to initialize backends")?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Index { dir, reset } => {
            index_documents(&context, dir, reset).await?;
        }
        Commands::Search { query, limit } => {
            search_documents(&context, &query, limit).await?;
        }
        Commands::Ask { question } => {
            ask_question(&context, &question).await?;
        }
        Commands::Serve { port } => {
            serve_http(context, port).await?;
        }
        Commands::Status => {
            show_status(&context).await?;
        }
        Commands::Reset => {
            reset_collection(&context).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn index_command_flags() {
        let cli = Cli::try_parse_from(["docs-rag", "index", "--dir", "/srv/docs", "--reset"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Index { dir, reset } = parsed.command {
                assert_eq!(dir, Some(PathBuf::from("/srv/docs")));
                assert!(reset);
            }
        }
    }

    #[test]
    fn search_command_with_limit() {
        let cli = Cli::try_parse_from(["docs-rag", "search", "Wartung Pumpe", "--limit", "3"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, limit } = parsed.command {
                assert_eq!(query, "Wartung Pumpe");
                assert_eq!(limit, Some(3));
            }
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["docs-rag", "status", "--config-dir", "/tmp/rag"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/rag")));
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn serve_command_port() {
        let cli = Cli::try_parse_from(["docs-rag", "serve", "--port", "8080"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Serve { port: Some(8080) }));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["docs-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn ask_requires_question() {
        let cli = Cli::try_parse_from(["docs-rag", "ask"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["docs-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
