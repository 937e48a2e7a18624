use std::{process, sync::Arc};

use folio::{
    application::{
        conversion::{
            ConversionOutcome, ConversionService, ConversionTemplate, StaticTemplateProvider,
        },
        error::AppError,
        repos::ConversionModelRepo,
    },
    config,
    domain::conversion::DocumentFormat,
    infra::{
        content::FsContentIndex,
        error::InfraError,
        http::{self, HttpState, NotFoundPage},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
    }
}

fn build_conversion_service(settings: &config::Settings) -> Result<ConversionService, AppError> {
    let models: Arc<dyn ConversionModelRepo> =
        Arc::new(FsContentIndex::new(settings.content.root.clone()));
    let templates = Arc::new(StaticTemplateProvider::new(ConversionTemplate::Document));

    ConversionService::new(Arc::new(settings.conversion.clone()), models, templates)
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let conversion = build_conversion_service(&settings)?;

    for format in DocumentFormat::ALL {
        let converter = settings.conversion.converter(format);
        info!(
            target = "folio::serve",
            format = format.as_str(),
            enabled = converter.enabled,
            tool = converter.tool.as_deref().unwrap_or(""),
            "Converter configured"
        );
    }

    let state = HttpState {
        conversion: Arc::new(conversion),
        fallback: Arc::new(NotFoundPage),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "folio::serve",
        addr = %settings.server.public_addr,
        content_root = %settings.content.root.display(),
        scratch_dir = %settings.conversion.scratch_dir.display(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "folio::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "folio::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "folio::serve", "Shutdown signal received");
}

async fn run_convert(settings: config::Settings, args: config::ConvertArgs) -> Result<(), AppError> {
    let format = args
        .format
        .or_else(|| DocumentFormat::detect(&args.path))
        .ok_or_else(|| {
            AppError::validation(format!(
                "`{}` does not end in a supported format suffix (rtf, docx, odt, epub); pass --format",
                args.path
            ))
        })?;

    let conversion = build_conversion_service(&settings)?;
    let outcome = conversion
        .convert(&args.hostname, format, &args.path)
        .await?;

    let mut document = match outcome {
        ConversionOutcome::Converted(document) => document,
        ConversionOutcome::Unavailable(reason) => {
            return Err(AppError::unavailable(format!(
                "{format} conversion is unavailable: {}",
                reason.as_str()
            )));
        }
        ConversionOutcome::NotFound(_) => return Err(AppError::NotFound),
    };

    let mut output = tokio::fs::File::create(&args.output)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let written = tokio::io::copy(&mut document.file, &mut output)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "folio::convert",
        output = %args.output.display(),
        filename = %document.filename,
        bytes = written,
        "Converted document written"
    );

    Ok(())
}
