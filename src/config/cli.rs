use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::conversion::DocumentFormat;

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the folio HTTP service.
    Serve(Box<ServeArgs>),
    /// Convert a single content item and write the result to a file.
    #[command(name = "convert")]
    Convert(ConvertArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ConversionOverrides {
    /// Override the directory that holds markdown content.
    #[arg(long = "content-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub content_root: Option<PathBuf>,

    /// Override the directory used for conversion scratch files.
    #[arg(long = "conversion-scratch-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub scratch_dir: Option<PathBuf>,

    /// Override the converter timeout.
    #[arg(long = "conversion-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Toggle RTF conversion.
    #[arg(
        long = "rtf-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub rtf_enabled: Option<bool>,

    /// Override the RTF converter program path (for example `pandoc`).
    #[arg(long = "rtf-tool", value_name = "PATH", value_hint = ValueHint::CommandName)]
    pub rtf_tool: Option<String>,

    /// Argument passed to the RTF converter ahead of its input (repeatable).
    #[arg(long = "rtf-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub rtf_args: Vec<String>,

    /// Toggle DOCX conversion.
    #[arg(
        long = "docx-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub docx_enabled: Option<bool>,

    /// Override the DOCX converter program path (for example `pandoc`).
    #[arg(long = "docx-tool", value_name = "PATH", value_hint = ValueHint::CommandName)]
    pub docx_tool: Option<String>,

    /// Argument passed to the DOCX converter ahead of its input (repeatable).
    #[arg(long = "docx-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub docx_args: Vec<String>,

    /// Toggle ODT conversion.
    #[arg(
        long = "odt-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub odt_enabled: Option<bool>,

    /// Override the ODT converter program path (for example `pandoc`).
    #[arg(long = "odt-tool", value_name = "PATH", value_hint = ValueHint::CommandName)]
    pub odt_tool: Option<String>,

    /// Argument passed to the ODT converter ahead of its input (repeatable).
    #[arg(long = "odt-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub odt_args: Vec<String>,

    /// Toggle EPUB conversion.
    #[arg(
        long = "epub-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub epub_enabled: Option<bool>,

    /// Override the EPUB converter program path (for example `pandoc`).
    #[arg(long = "epub-tool", value_name = "PATH", value_hint = ValueHint::CommandName)]
    pub epub_tool: Option<String>,

    /// Argument passed to the EPUB converter ahead of its input (repeatable).
    #[arg(long = "epub-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub epub_args: Vec<String>,
}

/// Command-line overrides for one format's converter.
#[derive(Debug, Clone, Copy)]
pub struct ConverterOverrides<'a> {
    pub enabled: Option<bool>,
    pub tool: Option<&'a str>,
    pub args: &'a [String],
}

impl ConversionOverrides {
    pub fn converter(&self, format: DocumentFormat) -> ConverterOverrides<'_> {
        let (enabled, tool, args) = match format {
            DocumentFormat::Rtf => (self.rtf_enabled, &self.rtf_tool, &self.rtf_args),
            DocumentFormat::Docx => (self.docx_enabled, &self.docx_tool, &self.docx_args),
            DocumentFormat::Odt => (self.odt_enabled, &self.odt_tool, &self.odt_args),
            DocumentFormat::Epub => (self.epub_enabled, &self.epub_tool, &self.epub_args),
        };
        ConverterOverrides {
            enabled,
            tool: tool.as_deref(),
            args,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub conversion: ConversionOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub overrides: ConversionOverrides,

    /// Content path, for example `guides/install.rtf`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// File the converted document is written to.
    #[arg(long, short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Output format; detected from the path suffix when omitted.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<DocumentFormat>,

    /// Hostname used for template selection.
    #[arg(long, default_value = "localhost", value_name = "HOST")]
    pub hostname: String,
}
