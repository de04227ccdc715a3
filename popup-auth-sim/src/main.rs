mod scenario;

use clap::{Parser, Subcommand};
use popup_auth::{PopupConfig, ScreenMetrics, StartOptions, WindowSize};
use scenario::{Scenario, Step};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "popup-auth-sim", version, about = "Simulate OAuth popup sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scripted authentication attempt and print the outcome
    Run {
        /// Provider authorization URL
        #[arg(long)]
        url: String,

        /// Popup width (defaults to the configured size)
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Popup height (defaults to the configured size)
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Pretend to be a mobile browser
        #[arg(long)]
        mobile: bool,

        /// Block popup creation
        #[arg(long)]
        blocked: bool,

        /// Post the completion message after this many milliseconds
        #[arg(long)]
        complete_after_ms: Option<u64>,

        /// JSON payload of the completion message
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Origin the completion message is sent from (defaults to the provider's)
        #[arg(long)]
        origin: Option<String>,

        /// Close the popup after this many milliseconds
        #[arg(long)]
        close_after_ms: Option<u64>,

        /// Post an unrelated message after this many milliseconds
        #[arg(long)]
        foreign_after_ms: Option<u64>,

        /// Controller config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop waiting after this many milliseconds of virtual time
        #[arg(long, default_value = "60000")]
        limit_ms: u64,
    },

    /// Print the window.open feature string for the given geometry
    Features {
        #[arg(long, default_value = "660")]
        width: u32,

        #[arg(long, default_value = "370")]
        height: u32,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        screen_x: f64,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        screen_y: f64,

        #[arg(long, default_value = "1280")]
        outer_width: f64,

        #[arg(long, default_value = "800")]
        outer_height: f64,

        #[arg(long, default_value = "1280")]
        screen_width: f64,

        /// Browser user agent
        #[arg(long, default_value = popup_auth::host::sim::DESKTOP_USER_AGENT)]
        user_agent: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "popup_auth=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            url,
            width,
            height,
            mobile,
            blocked,
            complete_after_ms,
            payload,
            origin,
            close_after_ms,
            foreign_after_ms,
            config,
            limit_ms,
        } => {
            let config = match config {
                Some(path) => PopupConfig::load(path)?,
                None => PopupConfig::default(),
            };
            let payload: serde_json::Value = serde_json::from_str(&payload)
                .map_err(|e| anyhow::anyhow!("--payload is not valid JSON: {}", e))?;

            let mut steps = Vec::new();
            if let Some(ms) = complete_after_ms {
                steps.push((
                    Duration::from_millis(ms),
                    Step::Complete {
                        origin: origin.clone(),
                        payload,
                    },
                ));
            }
            if let Some(ms) = foreign_after_ms {
                steps.push((Duration::from_millis(ms), Step::Foreign { origin }));
            }
            if let Some(ms) = close_after_ms {
                steps.push((Duration::from_millis(ms), Step::Close));
            }

            let options = match (width, height) {
                (Some(w), Some(h)) => StartOptions::with_window(w, h),
                _ => StartOptions::default(),
            };

            let report = scenario::run(
                config,
                Scenario {
                    url,
                    options,
                    mobile,
                    blocked,
                    steps,
                    limit: Duration::from_millis(limit_ms),
                },
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Features {
            width,
            height,
            screen_x,
            screen_y,
            outer_width,
            outer_height,
            screen_width,
            user_agent,
        } => {
            let metrics = ScreenMetrics {
                screen_x,
                screen_y,
                outer_width,
                outer_height,
                screen_width,
            };
            println!(
                "{}",
                scenario::features(&user_agent, metrics, WindowSize::new(width, height))
            );
        }
    }

    Ok(())
}
