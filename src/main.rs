use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use pricelens::clip::ClipModel;
use pricelens::config::Config;
use pricelens::explain::create_provider;
use pricelens::inspect::Inspector;
use pricelens::{logging, web};

#[derive(Default)]
struct Args {
    config_path: Option<PathBuf>,
    bind_address: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pricelens {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    parsed.bind_address = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --bind requires an address argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"pricelens - photo inspection and price adjustment server

USAGE:
    pricelens [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --bind, -b ADDR     Address to listen on (overrides server.bind_address)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PRICELENS_CONFIG    Path to config file (overrides default location)
    PRICELENS_LOG       Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/pricelens/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // journald on Linux, rolling file elsewhere
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(bind) = args.bind_address {
        config.server.bind_address = bind;
    }

    let model = Arc::new(ClipModel::new(&config.clip));
    if config.server.preload_model {
        let warm = Arc::clone(&model);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = warm.warm_up() {
                tracing::warn!(error = %e, "Model preload failed; will retry on first inspection");
            }
        });
    }

    let explainer = Arc::from(create_provider(&config.explain));
    let inspector = Inspector::new(model, explainer, &config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.server.bind_address,
        "Starting pricelens"
    );

    web::serve(
        web::AppState::new(inspector),
        &config.server.bind_address,
        config.server.max_upload_bytes,
    )
    .await
}
