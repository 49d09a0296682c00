use std::{
    env, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG: &str = "config.ron";
const PORT: u16 = 7890;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_name: String,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub log_filter: String,
    pub database_url: String,
    pub static_dir: PathBuf,
    pub listen: SocketAddr,
    pub tls: Option<TlsConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: String::from("Todo"),
            api_prefix: String::from("/v1"),
            cors_origins: Vec::new(),
            log_filter: String::from("info,tower_http=debug"),
            database_url: String::from("sqlite://todo.db"),
            static_dir: PathBuf::from("static"),
            listen: SocketAddr::from(([0; 4], PORT)),
            tls: None,
        }
    }
}

impl Config {
    /// Defaults, then the RON file, then the environment.
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load(path: &Path, required: bool) -> eyre::Result<Self> {
        Self::from_file(path, required)?.layered(|key| env::var(key).ok())
    }

    fn layered(mut self, var: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        self.apply_env(var)?;
        self.api_prefix = normalize_prefix(&self.api_prefix);

        Ok(self)
    }

    fn from_file(path: &Path, required: bool) -> eyre::Result<Self> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("failed to open {}", path.display()))
            }
        };

        ron::de::from_reader(file).wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> eyre::Result<()> {
        if let Some(name) = var("PROJECT_NAME") {
            self.project_name = name;
        }
        if let Some(prefix) = var("API_VER_STR") {
            self.api_prefix = prefix;
        }
        if let Some(origins) = var("BACKEND_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.log_filter = filter;
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = var("LISTEN_ADDR") {
            self.listen = addr
                .parse()
                .wrap_err_with(|| format!("invalid LISTEN_ADDR `{addr}`"))?;
        }
        if let (Some(cert), Some(key)) = (var("SSL_CERT"), var("SSL_KEY")) {
            self.tls = Some(TlsConfig {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            });
        }

        Ok(())
    }
}

/// `v1/` and `/v1` both become `/v1`; `/` becomes the empty root prefix.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');

    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
