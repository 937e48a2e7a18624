//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::conversion::DocumentFormat;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONTENT_ROOT: &str = "content";
const DEFAULT_SCRATCH_DIRNAME: &str = "folio-conversion";
const DEFAULT_CONVERTER_TIMEOUT_SECS: u64 = 120;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub conversion: ConversionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub root: PathBuf,
}

/// Settings shared by every conversion request. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub scratch_dir: PathBuf,
    pub timeout: Duration,
    pub rtf: ConverterSettings,
    pub docx: ConverterSettings,
    pub odt: ConverterSettings,
    pub epub: ConverterSettings,
}

impl ConversionSettings {
    pub fn converter(&self, format: DocumentFormat) -> &ConverterSettings {
        match format {
            DocumentFormat::Rtf => &self.rtf,
            DocumentFormat::Docx => &self.docx,
            DocumentFormat::Odt => &self.odt,
            DocumentFormat::Epub => &self.epub,
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            timeout: Duration::from_secs(DEFAULT_CONVERTER_TIMEOUT_SECS),
            rtf: ConverterSettings::default(),
            docx: ConverterSettings::default(),
            odt: ConverterSettings::default(),
            epub: ConverterSettings::default(),
        }
    }
}

/// Per-format converter switch and program. `tool` is `None` when unconfigured
/// and is run verbatim; `args` are passed before the input and output flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterSettings {
    pub enabled: bool,
    pub tool: Option<String>,
    pub args: Vec<String>,
}

impl ConverterSettings {
    pub fn enabled_with(tool: impl Into<String>) -> Self {
        Self {
            enabled: true,
            tool: Some(tool.into()),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Convert(args)) => raw.apply_conversion_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    conversion: RawConversionSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_conversion_overrides(&overrides.conversion);
    }

    fn apply_conversion_overrides(&mut self, overrides: &ConversionOverrides) {
        if let Some(root) = overrides.content_root.as_ref() {
            self.content.root = Some(root.clone());
        }
        if let Some(dir) = overrides.scratch_dir.as_ref() {
            self.conversion.scratch_dir = Some(dir.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.conversion.timeout_seconds = Some(seconds);
        }
        for format in DocumentFormat::ALL {
            self.conversion
                .converter_mut(format)
                .apply_overrides(overrides.converter(format));
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            conversion,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content),
            conversion: build_conversion_settings(conversion)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    Ok(ServerSettings { public_addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> ContentSettings {
    let root = content
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_ROOT));
    ContentSettings { root }
}

fn build_conversion_settings(
    conversion: RawConversionSettings,
) -> Result<ConversionSettings, LoadError> {
    let RawConversionSettings {
        scratch_dir,
        timeout_seconds,
        rtf,
        docx,
        odt,
        epub,
    } = conversion;

    let scratch_dir = scratch_dir.unwrap_or_else(default_scratch_dir);
    if scratch_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "conversion.scratch_dir",
            "path must not be empty",
        ));
    }

    let timeout_seconds = timeout_seconds.unwrap_or(DEFAULT_CONVERTER_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "conversion.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ConversionSettings {
        scratch_dir,
        timeout: Duration::from_secs(timeout_seconds),
        rtf: build_converter_settings(rtf),
        docx: build_converter_settings(docx),
        odt: build_converter_settings(odt),
        epub: build_converter_settings(epub),
    })
}

// A blank tool is an unconfigured converter, not an invalid configuration.
fn build_converter_settings(raw: RawConverterSettings) -> ConverterSettings {
    let tool = raw.tool.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    ConverterSettings {
        enabled: raw.enabled.unwrap_or(false),
        tool,
        args: raw.args.unwrap_or_default(),
    }
}

fn default_scratch_dir() -> PathBuf {
    env::temp_dir().join(DEFAULT_SCRATCH_DIRNAME)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConversionSettings {
    scratch_dir: Option<PathBuf>,
    timeout_seconds: Option<u64>,
    rtf: RawConverterSettings,
    docx: RawConverterSettings,
    odt: RawConverterSettings,
    epub: RawConverterSettings,
}

impl RawConversionSettings {
    fn converter_mut(&mut self, format: DocumentFormat) -> &mut RawConverterSettings {
        match format {
            DocumentFormat::Rtf => &mut self.rtf,
            DocumentFormat::Docx => &mut self.docx,
            DocumentFormat::Odt => &mut self.odt,
            DocumentFormat::Epub => &mut self.epub,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConverterSettings {
    enabled: Option<bool>,
    tool: Option<String>,
    args: Option<Vec<String>>,
}

impl RawConverterSettings {
    fn apply_overrides(&mut self, overrides: ConverterOverrides<'_>) {
        if let Some(enabled) = overrides.enabled {
            self.enabled = Some(enabled);
        }
        if let Some(tool) = overrides.tool {
            self.tool = Some(tool.to_string());
        }
        if !overrides.args.is_empty() {
            self.args = Some(overrides.args.to_vec());
        }
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
