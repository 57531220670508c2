use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use telemetry_relay::{
    Config, Event, EventSink, EventStream, HttpApiClient, LogFormat, ParserManager, RequestQueue,
    Result, SenderWorker, event_channel,
};
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "telemetry-relay failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{}' ({}), using info", config.log_level, e);
        EnvFilter::new("info")
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

fn run(config: Config) -> Result<()> {
    config.validate()?;

    let (sink, events) = event_channel();
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let client = HttpApiClient::new(&config.api_url, config.request_timeout())?;
    let queue = Arc::new(RequestQueue::new(client, sink.clone()));
    let sender = SenderWorker::spawn(queue.clone())?;

    let mut parser = ParserManager::with_poll_interval(queue.clone(), sink, config.poll_interval());
    parser.start(&config.file)?;

    let resume_after = (config.resume_after_secs > 0).then(|| config.resume_after());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(events, queue.clone(), resume_after));

    parser.stop();
    if !parser.await_termination(Some(Duration::from_secs(5))) {
        warn!("Parser did not stop in time");
    }
    let pending = queue.len();
    if pending > 0 {
        warn!(pending, "Exiting with unsent requests");
    }
    sender.shutdown();
    Ok(())
}

/// Logs worker events until Ctrl-C or the parser exits. A queue paused by a
/// failed request is resumed after `resume_after`, if set.
async fn watch(mut events: EventStream, queue: Arc<RequestQueue>, resume_after: Option<Duration>) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut resume_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupt received, stopping");
                break;
            }
            _ = sleep_until(resume_at), if resume_at.is_some() => {
                resume_at = None;
                queue.set_paused(false);
            }
            event = events.next() => match event {
                Some(Event::ParserTerminated { by_user }) => {
                    if !by_user {
                        error!("Parser worker exited");
                    }
                    break;
                }
                Some(Event::RequestFailed { request, trace, .. }) => {
                    warn!(
                        id = request.id,
                        url = %request.url,
                        trace = ?trace,
                        "Request failed, queue paused"
                    );
                    if let Some(delay) = resume_after {
                        resume_at = Some(Instant::now() + delay);
                    }
                }
                Some(Event::RequestProcessed(request)) => {
                    info!(id = request.id, module = %request.module, "Request processed");
                }
                Some(_) => {}
                None => break,
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}
