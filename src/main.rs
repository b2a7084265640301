use clap::Parser;
use conduit::cli::{
    build_service, endpoints, handle_completions, handle_config_export, handle_config_init,
    health, load_config, request, Cli, Commands, ConfigCommands, EndpointsCommands,
};
use conduit::config::ConduitConfig;
use std::path::Path;

/// Load the config and start tracing with the CLI log level applied.
fn prepare(path: &Path, log_level: Option<&str>) -> anyhow::Result<ConduitConfig> {
    let mut config = load_config(path)?;
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    conduit::logging::init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    let result = match cli.command {
        Commands::Endpoints(EndpointsCommands::List(args)) => load_config(&args.config)
            .and_then(|config| endpoints::handle_endpoints_list(&args, &config))
            .map(|output| println!("{}", output)),
        Commands::Request(args) => async {
            let config = prepare(&args.config, log_level)?;
            let service = build_service(&config)?;
            let output = request::handle_request(&args, &service).await?;
            println!("{}", output);
            Ok::<(), anyhow::Error>(())
        }
        .await,
        Commands::Health(args) => async {
            let config = prepare(&args.config, log_level)?;
            let prometheus = if args.prometheus {
                Some(conduit::metrics::setup_metrics().map_err(|e| anyhow::anyhow!("{}", e))?)
            } else {
                None
            };
            let service = build_service(&config)?;
            let output = health::handle_health(&args, &service, prometheus.as_ref()).await?;
            println!("{}", output);
            Ok::<(), anyhow::Error>(())
        }
        .await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
            ConfigCommands::Export(args) => load_config(&args.config)
                .and_then(|config| handle_config_export(&config))
                .map(|output| println!("{}", output)),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
