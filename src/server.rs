use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use rspbridge_config::{load_config, Config, LogConfig, TargetConfig};
use rspbridge_image::ImageTarget;
use rspbridge_rsp::run_session;

use crate::Cli;

/// Load configuration, set up logging and serve debugger sessions.
pub(crate) fn run_server(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    init_logging(&config.log)?;

    let target = build_target(&config.target)?;
    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.server.listen))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to listen on {addr}"))?;
        info!("waiting for debugger on {}", listener.local_addr()?);

        tokio::select! {
            result = serve(&listener, &target, config.server.once) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                Ok(())
            }
        }
    })
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(listen) = &cli.listen {
        config.server.listen = listen.clone();
    }
    if let Some(image) = &cli.image {
        config.target.image = Some(image.clone());
    }
    config.server.once |= cli.once;

    if let Err(errors) = rspbridge_config::validate::validate(&config) {
        if let Some(first) = errors.into_iter().next() {
            return Err(first).context("invalid configuration");
        }
    }
    Ok(config)
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log.level.as_filter()));

    match &log.file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(log_file))
                .with_ansi(false)
                .with_env_filter(env_filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .init();
        }
    }

    info!("rspbridge starting – log level: {}", log.level.as_filter());
    Ok(())
}

fn build_target(config: &TargetConfig) -> Result<ImageTarget> {
    let target = match &config.image {
        Some(path) => ImageTarget::load(path, config.base)?,
        None => ImageTarget::new(Vec::new(), config.base)?,
    };
    let target = target.with_stack(config.stack);
    Ok(match config.entry {
        Some(entry) => target.with_entry(entry),
        None => target,
    })
}

/// Accept debuggers one at a time; a session failure never stops the
/// listener unless `once` is set.
async fn serve(listener: &TcpListener, target: &ImageTarget, once: bool) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        stream.set_nodelay(true)?;
        info!(%peer, "debugger connected");

        match run_session(stream, target).await {
            Ok(end) => info!(%peer, ?end, "session ended"),
            Err(err) => error!(%peer, "session aborted: {err}"),
        }

        if once {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cli() -> Cli {
        Cli {
            config: None,
            listen: None,
            image: None,
            once: false,
        }
    }

    #[test]
    fn defaults_without_config_file() {
        let config = resolve_config(&cli()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn command_line_overrides_config() {
        let args = Cli {
            listen: Some("0.0.0.0:6860".into()),
            image: Some(PathBuf::from("prog.bin")),
            once: true,
            ..cli()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:6860");
        assert_eq!(config.target.image, Some(PathBuf::from("prog.bin")));
        assert!(config.server.once);
    }

    #[test]
    fn invalid_listen_override_is_rejected() {
        let args = Cli {
            listen: Some("not-an-address".into()),
            ..cli()
        };
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("server.listen"));
    }

    #[tokio::test]
    async fn build_target_without_image_uses_entry() {
        use rspbridge_rsp::{Register, Target};

        let config = TargetConfig {
            image: None,
            base: 0x400,
            entry: Some(0x420),
            stack: 0x8000,
        };
        let target = build_target(&config).unwrap();
        assert_eq!(target.entry_point().await, Some(0x420));
        let regs = target.read_registers().await.unwrap();
        assert_eq!(regs.get(Register::A7), 0x8000);
    }

    #[tokio::test]
    async fn serve_once_handles_one_session() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let target = ImageTarget::new(vec![0xde, 0xad], 0x1000).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let debugger = async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"+$m1000,2#8c").await.unwrap();
            let mut reply = [0u8; 9];
            stream.read_exact(&mut reply).await.unwrap();
            stream.write_all(b"+").await.unwrap();
            reply
        };

        let (served, reply) = tokio::join!(serve(&listener, &target, true), debugger);
        served.unwrap();
        assert_eq!(&reply, b"+$dead#8e");
    }
}
