use clap::Parser;
use std::path::PathBuf;

/// Formwork - a dynamic form builder and submission service
#[derive(Parser, Debug, Clone)]
#[command(name = "formwork", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "FORMWORK_CONFIG", default_value = "formwork.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "FORMWORK_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "FORMWORK_PORT")]
    pub port: Option<u16>,

    /// Database connection URL
    #[arg(long, env = "FORMWORK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory for uploaded files
    #[arg(long, env = "FORMWORK_STORAGE_ROOT")]
    pub storage_root: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["formwork"]);
        assert_eq!(cli.config, PathBuf::from("formwork.toml"));
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.database_url.is_none());
        assert!(cli.storage_root.is_none());
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "formwork",
            "--config",
            "custom.toml",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
    }
}
