use std::sync::Arc;

use confman_config::{ConfigLoader, ConfigSource, ManagerSettings};
use confman_events::{ActionRequest, JsonLinesSink, RecordSink};
use confman_fsops::Mutator;
use confman_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::pipeline::Pipeline;

/// Environment variable overriding the configured log format.
pub const LOG_FORMAT_ENV: &str = "CONFMAN_LOG_FORMAT";

/// Dependencies required to run the config manager.
pub struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    settings: ManagerSettings,
    mutator: Mutator,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails to load or validate, the log
    /// format is unknown, or the metrics registry cannot be built.
    pub fn from_env() -> AppResult<Self> {
        let (config, source) =
            ConfigLoader::from_env().map_err(|err| AppError::config("config.load", err))?;
        if let ConfigSource::File(path) = &source {
            debug!(path = %path.display(), "configuration source");
        }
        let settings = config
            .resolve()
            .map_err(|err| AppError::config("config.resolve", err))?;

        let format_name = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .or_else(|| settings.log_format.clone());
        let format = LogFormat::from_setting(format_name.as_deref())
            .map_err(|err| AppError::telemetry("telemetry.log_format", err))?;
        let logging = LoggingConfig {
            format,
            build_sha: option_env!("CONFMAN_BUILD_SHA").unwrap_or("dev"),
            ..LoggingConfig::default()
        };

        let mutator =
            Mutator::new(&settings).map_err(|err| AppError::fsops("mutator.new", err))?;
        Self::with_parts(logging, settings, mutator)
    }

    /// Assemble dependencies from already-resolved parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be built.
    pub fn with_parts(
        logging: LoggingConfig<'static>,
        settings: ManagerSettings,
        mutator: Mutator,
    ) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            logging,
            settings,
            mutator,
            metrics,
        })
    }

    /// Resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Metrics registry shared with the pipeline.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Entry point for the config manager binary.
///
/// Reads JSON-lines requests from stdin and writes one JSON line per
/// outbound record to stdout until EOF or Ctrl-C.
///
/// # Errors
///
/// Returns an error if dependency construction, logging setup, host IO, or
/// the pipeline fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    confman_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("host");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(dependencies, stdin, tokio::io::stdout()).await
}

/// Run the pipeline against an arbitrary host stream pair.
///
/// Blank input lines are skipped; malformed lines are logged and skipped.
/// EOF drains queued requests before returning. Records are written to
/// `output` before their cursor is checkpointed, so a slow reader stalls the
/// pipeline rather than losing records.
///
/// # Errors
///
/// Returns an error if reading input or writing records fails, or if the
/// pipeline stops on a fatal listing error.
pub async fn serve<R, W>(dependencies: BootstrapDependencies, input: R, output: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let BootstrapDependencies {
        logging: _,
        settings,
        mutator,
        metrics,
    } = dependencies;

    if !settings.use_buffering {
        warn!("use_buffering = false has no effect; every request is flushed individually");
    }
    info!(
        roots = settings.directories.iter().count(),
        include_types = settings.include_types.len(),
        "config manager starting"
    );

    let cancel = CancellationToken::new();
    let sink = Arc::new(JsonLinesSink::new(output));
    let shared: Arc<dyn RecordSink> = sink.clone();
    let pipeline = Pipeline::spawn(mutator, shared, &settings, metrics.clone(), cancel.clone());

    let read_result = pump_requests(input, &pipeline, &cancel).await;
    if read_result.is_err() {
        pipeline.shutdown();
    }
    let pipeline_result = pipeline.join().await;

    if let Some(cursor) = sink.checkpoint() {
        info!(cursor = %cursor, "final checkpoint");
    }

    let snapshot = metrics.snapshot();
    info!(
        committed = snapshot.batches_committed_total,
        emit_failures = snapshot.emit_failures_total,
        listed = snapshot.listed_files_total,
        "config manager stopped"
    );
    if let Ok(rendered) = metrics.render() {
        debug!(metrics = %rendered, "final metrics");
    }

    read_result?;
    pipeline_result
}

async fn pump_requests<R>(
    input: R,
    pipeline: &crate::pipeline::PipelineHandle,
    cancel: &CancellationToken,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_number = 0_usize;
    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            Ok(()) = tokio::signal::ctrl_c() => {
                info!("interrupt received; shutting down");
                pipeline.shutdown();
                return Ok(());
            }
            line = lines.next_line() => line.map_err(|err| AppError::io("stdin.read", err))?,
        };
        let Some(line) = line else {
            debug!(lines = line_number, "input closed");
            return Ok(());
        };
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<ActionRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!(line = line_number, error = %err, "skipping malformed request");
                continue;
            }
        };
        if pipeline.submit(request).await.is_err() {
            debug!("pipeline closed; stop reading input");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confman_events::Status;
    use confman_fsops::EnvSubstituter;
    use confman_test_support::fixtures::ManagedTree;
    use tokio::io::AsyncReadExt;

    fn dependencies(tree: &ManagedTree) -> anyhow::Result<BootstrapDependencies> {
        let mutator = Mutator::with_substituter(tree.settings(), EnvSubstituter::with_lookup(|_| None)?);
        Ok(BootstrapDependencies::with_parts(
            LoggingConfig::default(),
            tree.settings().clone(),
            mutator,
        )?)
    }

    #[tokio::test]
    async fn unrecognized_and_malformed_lines_are_handled() -> anyhow::Result<()> {
        let tree = ManagedTree::new()?;
        let input: &[u8] = b"not json\n\n{\"action\":\"frobnicate\",\"cursor\":\"7\"}\n";
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);

        serve(dependencies(&tree)?, input, writer).await?;

        let mut text = String::new();
        reader.read_to_string(&mut text).await?;
        let records: Vec<confman_events::OutboundRecord> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Status::Error);
        assert_eq!(
            records[0].payload,
            crate::dispatcher::UNRECOGNIZED_ACTION_MESSAGE
        );
        Ok(())
    }
}
