use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tracing::info;

use autodel_server::{AutoDelServer, ServerConfig};

use crate::cli::{Cli, Command, ConfigArgs, OutputFormat, ServeArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

/// File settings with command-line overrides applied.
fn effective_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(admin) = args.admin {
        config.admin_addr = Some(admin);
    }
    if let Some(max_keys) = args.max_keys {
        config.store.max_keys = Some(max_keys);
    }
    if let Some(max_connections) = args.max_connections {
        config.max_connections = max_connections;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = effective_config(&args)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        println!(
            "{} autodel listening on {}",
            "✓".green().bold(),
            listener.local_addr()?.to_string().cyan()
        );
        if let Some(admin) = config.admin_addr {
            println!("  admin: http://{}", admin.to_string().cyan());
        }

        let server = AutoDelServer::new(config);
        server
            .serve_on(listener, async {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received, shutting down");
            })
            .await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn cmd_config(args: ConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            if let Some(path) = &args.config {
                println!("{} {}", "# loaded from".dimmed(), path.display());
            } else {
                println!("{}", "# built-in defaults".dimmed());
            }
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn serve_args() -> ServeArgs {
        ServeArgs {
            config: None,
            bind: None,
            admin: None,
            max_keys: None,
            max_connections: None,
        }
    }

    #[test]
    fn defaults_without_file() {
        let config = effective_config(&serve_args()).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"127.0.0.1:7001\"\nmax_connections = 8").unwrap();

        let args = ServeArgs {
            config: Some(file.path().to_path_buf()),
            bind: Some("127.0.0.1:7002".parse().unwrap()),
            max_keys: Some(10),
            ..serve_args()
        };
        let config = effective_config(&args).unwrap();
        assert_eq!(config.bind_addr.port(), 7002);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.store.max_keys, Some(10));
    }

    #[test]
    fn missing_file_is_an_error() {
        let args = ServeArgs {
            config: Some("/nonexistent/autodel.toml".into()),
            ..serve_args()
        };
        let err = effective_config(&args).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ServeArgs {
            max_connections: Some(0),
            ..serve_args()
        };
        assert!(effective_config(&args).is_err());
    }
}
