use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::{debug, error};
use net_stability::config::HarnessConfig;
use net_stability::display::{print_report, ConsoleNarrator, DisplayMode};
use net_stability::engine::{DiagnosticEngine, Suite};
use net_stability::errors::{exit_codes, format_error_for_display, DiagnosticError};
use net_stability::link::command::SystemCommandAdapter;
use net_stability::progress::{NoProgress, ProgressCallback};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SuiteArg {
    /// DNS, TCP, HTTP and latency checks
    Network,
    /// Link association, signal strength and connection stability
    Wifi,
    /// Both suites in one report
    All,
}

impl From<SuiteArg> for Suite {
    fn from(arg: SuiteArg) -> Self {
        match arg {
            SuiteArg::Network => Suite::Network,
            SuiteArg::Wifi => Suite::Wifi,
            SuiteArg::All => Suite::All,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Suite to run
    #[arg(value_enum, default_value_t = SuiteArg::All)]
    suite: SuiteArg,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host for the DNS, TCP and HTTP checks
    #[arg(long)]
    host: Option<String>,

    /// Port for the TCP and HTTP checks
    #[arg(long)]
    port: Option<u16>,

    /// URL for the HTTP check (defaults to http://HOST)
    #[arg(long)]
    url: Option<String>,

    /// Timeout for each network check, in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Host pinged by the stability check
    #[arg(long)]
    stability_target: Option<String>,

    /// Number of stability samples
    #[arg(long)]
    iterations: Option<usize>,

    /// Pause between stability samples, in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Minimum stability success rate, in percent
    #[arg(long)]
    threshold: Option<f64>,

    /// Stop sampling after this many milliseconds
    #[arg(long, value_name = "MS")]
    time_budget_ms: Option<u64>,

    /// Wireless interface to query on Linux
    #[arg(long)]
    interface: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

impl Cli {
    /// Layer defaults, the optional config file and flags.
    fn harness_config(&self) -> Result<HarnessConfig, DiagnosticError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(target) = &self.stability_target {
            config.stability_target = target.clone();
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(threshold) = self.threshold {
            config.threshold_percent = threshold;
        }
        if let Some(budget) = self.time_budget_ms {
            config.time_budget_ms = Some(budget);
        }
        if let Some(interface) = &self.interface {
            config.wifi_interface = interface.clone();
        }

        Ok(config)
    }
}

async fn run(cli: &Cli, mode: DisplayMode) -> Result<i32, DiagnosticError> {
    let config = cli.harness_config()?;
    debug!("Effective configuration: {:?}", config);

    let adapter = SystemCommandAdapter::new(config.command_timeout());
    let engine = DiagnosticEngine::new(config, adapter)?;

    let narrator = ConsoleNarrator::new();
    let progress: &dyn ProgressCallback =
        if mode.narrates() { &narrator } else { &NoProgress };

    let report = engine.run(cli.suite.into(), progress).await?;

    print_report(&report, mode).map_err(|e| {
        DiagnosticError::unknown(format!("failed to serialize report: {}", e)).with_source(e)
    })?;

    Ok(report.exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    debug!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("NETSTABILITY_BUILD_GIT_HASH").unwrap_or("unknown")
    );

    let mode = DisplayMode::detect(cli.json, std::io::stdout().is_terminal());
    if mode != DisplayMode::Text {
        colored::control::set_override(false);
    }

    let code = match run(&cli, mode).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", format_error_for_display(&e));
            if e.exit_code() == exit_codes::SUCCESS {
                exit_codes::UNKNOWN_ERROR
            } else {
                e.exit_code()
            }
        }
    };

    std::process::exit(code);
}
