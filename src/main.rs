use calloop::{
    EventLoop,
    signals::{Signal, Signals},
};
use nora::{
    CompositorError, Nora, Result,
    backend::headless::{self, HeadlessBackend, HeadlessTransport},
    config::{self, LoadedConfig, RuntimeConfig},
};
use std::{backtrace::Backtrace, fs, path::PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    config: Option<PathBuf>,
    check_config: bool,
}

fn main() -> Result<()> {
    init_backtrace_defaults();
    let args = parse_args()?;

    if args.check_config {
        return check_config(args.config);
    }

    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("panic: {panic_info}\n{backtrace}");
        eprintln!("panic: {panic_info}\n{backtrace}");
    }));

    let (config, config_path) = match load_config(args.config) {
        Ok(LoadedConfig { path, config }) => (config, Some(path)),
        Err(err) => {
            tracing::warn!("failed to load config, using defaults: {err}");
            (RuntimeConfig::default(), None)
        }
    };
    config::apply_environment(&config);

    let mut event_loop: EventLoop<Nora> =
        EventLoop::try_new().map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    let mut state = Nora::new(
        config,
        Box::new(HeadlessBackend::new()),
        Box::new(HeadlessTransport::new(std::io::stdout())),
    );
    state.config_path = config_path;
    state.loop_signal = Some(event_loop.get_signal());

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .map_err(|err| CompositorError::EventLoop(format!("failed to watch signals: {err}")))?;
    event_loop
        .handle()
        .insert_source(signals, |event, _, state| {
            tracing::info!(signal = ?event.signal(), "received signal");
            state.stop();
        })
        .map_err(|err| {
            CompositorError::EventLoop(format!("failed to insert signal source: {err}"))
        })?;

    headless::init_headless(&event_loop.handle())?;

    tracing::info!("nora started");
    event_loop
        .run(None, &mut state, |_| {})
        .map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    Ok(())
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        check_config: false,
    };

    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw.next().ok_or_else(|| {
                    CompositorError::Config("--config expects a path".to_owned())
                })?;
                args.config = Some(PathBuf::from(path));
            }
            "--check-config" => args.check_config = true,
            other => {
                return Err(CompositorError::Config(format!(
                    "unknown argument `{other}` (supported: --config <path>, --check-config)"
                )));
            }
        }
    }

    Ok(args)
}

fn load_config(path: Option<PathBuf>) -> Result<LoadedConfig> {
    match path {
        Some(path) => {
            let config = config::load_from_path(&path)?;
            Ok(LoadedConfig { path, config })
        }
        None => config::load_or_create_default(),
    }
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let LoadedConfig { path, config } = load_config(path)?;
    println!("{}: ok", path.display());
    println!("{config:#?}");
    Ok(())
}

fn init_backtrace_defaults() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "0") };
    }
}

const DEFAULT_LOG_FILTER: &str = "nora=debug,nora::input=info";

fn log_dir() -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME")
        && !state.is_empty()
    {
        return PathBuf::from(state).join("nora").join("log");
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("nora")
            .join("log");
    }
    std::env::temp_dir().join("nora").join("log")
}

fn init_logging() -> Result<()> {
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).map_err(|err| {
        CompositorError::Config(format!(
            "failed to create log directory {}: {err}",
            log_dir.display()
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "nora.log");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .init();

    let log_file = log_dir.join("nora.log");
    tracing::info!(path = %log_file.display(), "logging initialized");

    Ok(())
}
