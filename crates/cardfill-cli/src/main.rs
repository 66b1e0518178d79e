mod lookup;
mod run;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cardfill_core::plugin::{normalize_server_base, LayerNames, LayerToggles, RunRequest};

#[derive(Debug, Parser)]
#[command(name = "cardfill")]
#[command(about = "Resolve merchant names to logo and hero images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve merchants in-process and print the records as JSON.
    Lookup {
        /// Merchant names; comma-separated lists are split.
        #[arg(required = true)]
        names: Vec<String>,
        /// Return placeholder data without touching the network.
        #[arg(long)]
        mock: bool,
        /// Print one pretty JSON array instead of JSON lines.
        #[arg(long)]
        pretty: bool,
    },
    /// Drive a running server the way the design-tool plugin does and print
    /// its progress events as JSON lines.
    Run {
        #[arg(long, env = "CARDFILL_SERVER", default_value = "http://localhost:8787")]
        server: String,
        /// Merchant names; comma-separated lists are split.
        #[arg(required = true)]
        names: Vec<String>,
        /// Also download each resolved image through the server's proxy.
        #[arg(long)]
        fetch_images: bool,
        #[arg(long)]
        no_name: bool,
        #[arg(long)]
        no_logo: bool,
        #[arg(long)]
        no_hero: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Lookup {
            names,
            mock,
            pretty,
        } => {
            let mut config = cardfill_core::load_app_config()?;
            config.use_mock |= mock;
            init_tracing(&config.log_directive())?;
            lookup::run_lookup(&config, &parse_merchant_names(&names), pretty).await
        }
        Commands::Run {
            server,
            names,
            fetch_images,
            no_name,
            no_logo,
            no_hero,
        } => {
            init_tracing("warn")?;
            let request = RunRequest {
                merchants: parse_merchant_names(&names),
                server_base: normalize_server_base(&server),
                layer_names: LayerNames::default(),
                layer_toggles: LayerToggles {
                    name: !no_name,
                    logo: !no_logo,
                    hero: !no_hero,
                },
            };
            let error_count =
                run::run_plugin(&request, fetch_images, &mut std::io::stdout()).await?;
            if error_count > 0 {
                anyhow::bail!("{error_count} of {} merchants failed", request.merchants.len());
            }
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Splits comma-separated entries, trims them, and drops blanks.
fn parse_merchant_names(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
