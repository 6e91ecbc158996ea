use clap::Parser;

/// Command-line arguments for the dispatch gateway.
#[derive(Debug, Parser)]
#[command(name = "imgjobs-dispatcher", version, about)]
pub struct CliArgs {
    /// Path to a configuration file (toml, yaml or json).
    #[arg(long, short = 'c')]
    pub config_path: Option<String>,

    /// Listen port override.
    #[arg(long)]
    pub port: Option<u16>,

    /// Worker service API base URL override.
    #[arg(long)]
    pub worker_api_url: Option<String>,

    /// Token verification secret override.
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Force debug-level logging.
    #[arg(long)]
    pub debug: bool,
}

impl CliArgs {
    /// Apply CLI overrides on top of the resolved configuration.
    pub fn apply(&self, cfg: &mut imgjobs_config::Config) {
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(ref url) = self.worker_api_url {
            cfg.engine.worker_api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ref secret) = self.jwt_secret {
            cfg.auth.jwt_secret = secret.clone();
        }
        if self.debug {
            cfg.logging.level = "debug".to_string();
        }
    }
}
