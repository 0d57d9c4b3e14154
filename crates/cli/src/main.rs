use clap::Parser;
use config::Config;
use orchestrator::attach::{JattachProvider, Layout};
use orchestrator::clock::SystemClock;
use orchestrator::control::HttpConnector;
use orchestrator::probe::ProcfsProbe;
use orchestrator::report::EventId;
use orchestrator::{Environ, Scheduler, Services};
use rasp_supervisor::{
    cli::Cli,
    signals::wait_for_signal,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const LOG_ENV_VAR: &str = "RASP_SUPERVISOR_LOG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `RASP_SUPERVISOR_LOG` can only refine the level per
    // crate, e.g. `RASP_SUPERVISOR_LOG=orchestrator::control=trace`.
    let env_filter = EnvFilter::builder()
        .with_default_directive("reqwest=warn".parse()?)
        .with_env_var(LOG_ENV_VAR)
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);
    let filter_desc = env_filter.to_string();

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/rasp-supervisor/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/rasp-supervisor/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    if let Some(mode) = cli.mode {
        config.agent.mode = mode;
    }
    debug!(?cli);

    let install_dir = cli.install_dir.clone().or_else(|| config.attach.install_dir.clone());
    let environ = Environ::discover(install_dir.as_deref())?;

    info!(
        event_id = EventId::StartUp.code(),
        version = environ.version,
        hostname = %environ.hostname,
        exe_hash = %environ.exe_hash,
        "rasp-supervisor starting"
    );
    info!(event_id = EventId::LogValue.code(), filter = %filter_desc, "log settings");
    info!(
        event_id = EventId::EnvValue.code(),
        install_dir = %environ.install_dir.display(),
        "environment"
    );
    info!(
        event_id = EventId::ConfigValue.code(),
        mode = %config.agent.mode,
        modules = config.modules.len(),
        "current config"
    );
    debug!(?config);

    let layout = Layout::new(&environ.install_dir, &config.attach);
    let services = Services {
        probe: Arc::new(ProcfsProbe),
        attacher: Arc::new(JattachProvider::new(layout.clone(), config.attach.timeout)),
        connector: Arc::new(HttpConnector::new(config.control.clone())),
        clock: Arc::new(SystemClock),
    };
    let scheduler = Scheduler::new(&config, layout, services);

    // install signal handlers
    let (signals_tx, mut signals_rx) = mpsc::unbounded_channel();
    let mut signal_handle = tokio::spawn(wait_for_signal(signals_tx));

    let cancel = CancellationToken::new();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let mut scheduler_handle = tokio::spawn(scheduler.run_until(cancel.clone(), control_rx));

    loop {
        tokio::select! {
            // bubble up any errors from the scheduler
            res = &mut scheduler_handle => {
                let res = res?;
                if let Err(err) = &res {
                    error!("error happened in scheduler: {}", err);
                }
                res?;
                warn!("scheduler stopped without a shutdown request");
                return Ok(());
            }

            // bubble up any errors from the signal handlers
            res = &mut signal_handle => {
                let res = res?;
                if let Err(err) = &res {
                    error!("error happened during handling signals: {}", err);
                }
                cancel.cancel();
                scheduler_handle.await??;
                res?;
                return Ok(());
            }

            Some(event) = signals_rx.recv() => {
                debug!(?event, "received signal event");
                match event.control_event() {
                    Some(control) => {
                        if control_tx.send(control).is_err() {
                            warn!(?event, "scheduler is gone, dropping signal");
                        }
                    }
                    None => {
                        info!("shutdown requested");
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    signal_handle.abort();
    scheduler_handle.await??;
    info!("rasp-supervisor stopped");
    Ok(())
}
