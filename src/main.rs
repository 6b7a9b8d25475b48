use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cellhost::cell::{CellParams, CodeParams};
use cellhost::{Host, HostConfig, Scope, Value};

fn print_help() {
    println!(
        "\
cellhost v{}

A capability-scoped runtime for untrusted markup/script components.

USAGE:
    cellhost [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/host.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    RUST_LOG    Log level filter for tracing
                (e.g. debug, cellhost=debug,warn)

EXAMPLES:
    cellhost                        # uses config/host.toml
    cellhost /etc/cellhost.toml     # custom config path
    RUST_LOG=debug cellhost         # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("cellhost v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/host.toml".to_string());
    let config = match HostConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Cannot load {config_path}: {e}, using defaults");
            HostConfig::default()
        }
    };

    let default_filter = if config.host.debug {
        "cellhost=debug"
    } else {
        "cellhost=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    println!(
        r#"
   ___     _ _ _   _        _
  / __|___| | | |_| |___ __| |_
 | (__/ -_) | | ' \ / _ (_-<  _|
  \___\___|_|_|_||_\___/__/\__|
                        v{}
"#,
        env!("CARGO_PKG_VERSION")
    );

    info!("Host: {}", config.host.name);
    let mut host = Host::new(config);
    host.init()?;
    info!(
        "Virtual filesystem root: {}",
        host.vfs().read_dir("/")?.join(", ")
    );

    // Demo cell: untrusted markup with a script element that the
    // sanitizer strips, plus scripts exercising the default scope.
    let greeter = Scope::new().with(
        "greet",
        Value::func(|args| {
            for arg in args {
                if let Value::Text(text) = arg {
                    println!("  cell says: {text}");
                }
            }
            Ok(Value::Null)
        }),
    );
    let id = host.create_cell(CellParams {
        code: CodeParams {
            markup: "<div id=\"app\"><h1>hello</h1><script>steal()</script></div>".to_string(),
            scripts: vec![
                "greet(\"starting up\")".to_string(),
                "let badge = dom.createElement(\"span\")\ndom.append(badge, \"ready\")\ndom.appendChild(view, badge)"
                    .to_string(),
            ],
        },
        scopes: vec![greeter],
    })?;

    let session = host
        .attach(id)
        .ok_or_else(|| anyhow::anyhow!("cell {id} vanished"))?;
    let outcome = session.outcome().await;
    info!("Session outcome: {outcome:?}");
    if let Some(cell) = host.cell(id) {
        println!("  rendered: {}", cell.content());
    }
    info!("Uptime: {:?}", host.uptime());
    Ok(())
}
