use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub spicedb: SpiceDb,
    pub terminal: Terminal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Connection to the authorization service. Consumed by the HTTP client and
/// injected into `zed` invocations by the process executor.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpiceDb {
    /// Base URL of the HTTP gateway, e.g. http://localhost:8443
    pub endpoint: String,
    /// gRPC address handed to `zed --endpoint`; derived from `endpoint` when unset
    #[serde(default)]
    pub grpc_endpoint: Option<String>,
    /// Preshared bearer token. Never defaulted.
    #[serde(default)]
    pub token: Option<String>,
    /// Skip TLS verification / allow plaintext gRPC for `zed`
    #[serde(default)]
    pub insecure: bool,
    /// Applied to every outbound request
    pub timeout_ms: u64,
}

// Keep the token out of `tracing::info!(?settings)`.
impl std::fmt::Debug for SpiceDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiceDb")
            .field("endpoint", &self.endpoint)
            .field("grpc_endpoint", &self.grpc_endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Translate commands into HTTP calls in-process
    #[default]
    Api,
    /// Run the real `zed` binary as a supervised child process
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagMode {
    /// Unknown `--flags` are ignored
    #[default]
    Lenient,
    /// Unknown `--flags` fail the command
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    pub strategy: Strategy,
    #[serde(default)]
    pub flag_mode: FlagMode,
    /// Path or name of the `zed` binary for the process strategy
    pub zed_binary: String,
    pub process_timeout_ms: u64,
    /// Per-stream cap on captured child output
    pub max_output_bytes: usize,
    pub max_concurrent_processes: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for SpiceDb {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8443".to_string(),
            grpc_endpoint: None,
            token: None,
            insecure: false,
            timeout_ms: 10_000,
        }
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self {
            strategy: Strategy::Api,
            flag_mode: FlagMode::Lenient,
            zed_binary: "zed".to_string(),
            process_timeout_ms: 30_000,
            max_output_bytes: 256 * 1024,
            max_concurrent_processes: 4,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let server = Server::default();
        let spicedb = SpiceDb::default();
        let terminal = Terminal::default();

        let mut builder = config::Config::builder()
            .set_default("server.host", server.host)
            .into_diagnostic()?
            .set_default("server.port", server.port)
            .into_diagnostic()?
            .set_default("spicedb.endpoint", spicedb.endpoint)
            .into_diagnostic()?
            .set_default("spicedb.insecure", spicedb.insecure)
            .into_diagnostic()?
            .set_default("spicedb.timeout_ms", spicedb.timeout_ms)
            .into_diagnostic()?
            .set_default("terminal.strategy", "api")
            .into_diagnostic()?
            .set_default("terminal.flag_mode", "lenient")
            .into_diagnostic()?
            .set_default("terminal.zed_binary", terminal.zed_binary)
            .into_diagnostic()?
            .set_default("terminal.process_timeout_ms", terminal.process_timeout_ms)
            .into_diagnostic()?
            .set_default("terminal.max_output_bytes", terminal.max_output_bytes as u64)
            .into_diagnostic()?
            .set_default(
                "terminal.max_concurrent_processes",
                terminal.max_concurrent_processes as u64,
            )
            .into_diagnostic()?;

        // Conventional SpiceDB variables act as defaults; file and prefixed env win
        for (key, var) in [
            ("spicedb.endpoint", "SPICEDB_URL"),
            ("spicedb.token", "SPICEDB_TOKEN"),
            ("spicedb.insecure", "SPICEDB_INSECURE"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(key, value).into_diagnostic()?;
            }
        }

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: ZEDCONSOLE__SPICEDB__ENDPOINT=..., etc.
        builder =
            builder.add_source(config::Environment::with_prefix("ZEDCONSOLE").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        s.spicedb.endpoint = s.spicedb.endpoint.trim_end_matches('/').to_string();
        if s.spicedb.token.as_deref().is_some_and(str::is_empty) {
            s.spicedb.token = None;
        }

        Ok(s)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
