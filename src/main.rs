use clap::Parser;
use slackcat::config::{file, setup};
use slackcat::core::batcher::BatchPolicy;
use slackcat::core::shutdown::{Shutdown, ShutdownCoordinator};
use slackcat::core::snippet::SnippetOptions;
use slackcat::core::{ConfigProvider, Deliver, DeliveryTarget};
use slackcat::utils::output::{exit_err, output};
use slackcat::utils::{logger, validation::Validate};
use slackcat::{
    CliConfig, NoopSender, Result, SlackClient, SlackSender, SlackcatConfig, SlackcatError,
    SnippetEngine, StreamEngine,
};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = run(config).await {
        exit_err(&e);
    }

    // Exit explicitly: a stdin reader left parked by a stream shutdown would
    // otherwise keep the runtime alive.
    std::process::exit(0);
}

async fn run(config: CliConfig) -> Result<()> {
    config.validate()?;

    if config.configure {
        let path = match config.config.clone() {
            Some(path) => path,
            None => file::default_path()?,
        };
        let stdin = std::io::stdin();
        return setup::configure(&path, &mut stdin.lock(), &mut std::io::stdout());
    }

    let (path, exists) = file::locate(config.config.as_deref())?;
    if !exists {
        return Err(SlackcatError::config(format!(
            "missing config file at {}, use --configure to create",
            path.display()
        )));
    }
    let settings = SlackcatConfig::from_file(&path)?;
    settings.validate()?;
    tracing::debug!("loaded config from {}", path.display());

    let (team, channel) = settings.parse_channel_opt(config.channel.as_deref().unwrap_or(""))?;
    let token = settings.token_for(&team)?;

    if config.noop {
        return dispatch(&config, NoopSender::new(channel)).await;
    }

    let client = SlackClient::new(&config.api_url, Duration::from_secs(config.timeout_secs))?;
    let channel_id = client.resolve_channel(token, &channel).await?;
    tracing::debug!("posting to {} ({}) on team {}", channel, channel_id, team);
    let sender = SlackSender::new(client, DeliveryTarget::new(channel_id, token));
    dispatch(&config, sender).await
}

async fn dispatch<D: Deliver>(config: &CliConfig, deliver: D) -> Result<()> {
    let channel = deliver.channel().to_string();

    if let Some(path) = config.input_path() {
        if config.stream {
            output("filepath provided, ignoring stream option");
        }
        let engine = SnippetEngine::new(deliver, SnippetOptions::from_config(config));
        let upload = engine.upload_path(path).await?;
        report_upload(config, &upload.filename, &channel);
        return Ok(());
    }

    if config.stream {
        output("starting stream");
        let shutdown = Shutdown::new();
        let coordinator = ShutdownCoordinator::new(shutdown.clone());
        let listener = coordinator.spawn();

        let engine = StreamEngine::new(deliver, BatchPolicy::from_config(config), shutdown);
        let result = if config.tee() {
            engine
                .run_with_echo(tokio::io::stdin(), tokio::io::stdout())
                .await
        } else {
            engine.run(tokio::io::stdin()).await
        };
        coordinator.mark_terminated();
        listener.abort();

        let report = result?;
        if report.batches_failed > 0 {
            output(&format!(
                "{} of {} messages failed to post",
                report.batches_failed,
                report.batches_sent + report.batches_failed
            ));
        }
        return Ok(());
    }

    let engine = SnippetEngine::new(deliver, SnippetOptions::from_config(config));
    let upload = if config.tee() {
        engine
            .upload_stream_with_echo(tokio::io::stdin(), tokio::io::stdout())
            .await?
    } else {
        engine.upload_stream(tokio::io::stdin()).await?
    };
    report_upload(config, &upload.filename, &channel);
    Ok(())
}

fn report_upload(config: &CliConfig, filename: &str, channel: &str) {
    if config.noop {
        output("skipping upload (noop mode)");
    } else {
        output(&format!("file {} uploaded to {}", filename, channel));
    }
}
