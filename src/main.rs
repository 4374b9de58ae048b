use anyhow::Context;
use castview::config::{Config, app_name};
use castview::decoder::{Codec, FfmpegCodec};
use castview::display::{FpsCounter, NullSink, RenderSink, YuvDumpSink};
use castview::pipeline::receiver::ReceiverCoordinator;
use log::{error, info};
use std::{panic, process};

fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => e.exit(),
    };

    // kill the process as soon as a stage task panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    if let Err(e) = run(config) {
        error!("{}: {:#}", app_name(), e);
        process::exit(1);
    }
}

fn run(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async {
        let codec = FfmpegCodec::open()?;
        let sink: Box<dyn RenderSink<<FfmpegCodec as Codec>::Image>> = match &config.dump {
            Some(path) => Box::new(YuvDumpSink::create(path)?),
            None => Box::new(NullSink),
        };

        let coordinator = ReceiverCoordinator::launch(&config, codec, FpsCounter::new(sink));

        // gracefully close the session when receiving SIGINT, SIGTERM, or SIGHUP
        let closer = coordinator.closer();
        ctrlc::set_handler(move || closer.close()).context("failed to set Ctrl-C handler")?;

        let mut state = coordinator.state();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                info!("state: {}", state.borrow_and_update().description());
            }
        });

        coordinator.join().await?;
        info!("closed");
        Ok::<_, anyhow::Error>(())
    })
}
