//! helm-inject CLI - render a chart, inject a sidecar, then upgrade the release

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use helm_inject_core::PipelineConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "helm-inject")]
#[command(author = "helm-inject Contributors")]
#[command(version)]
#[command(about = "Render a chart, inject a service-mesh sidecar, then run helm upgrade", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade a release, injecting the sidecar into every rendered template
    Upgrade(UpgradeArgs),
}

#[derive(Args)]
struct UpgradeArgs {
    /// Release name
    release: String,

    /// Chart directory, chart archive, or chart name to fetch
    chart: String,

    /// Chart version to fetch (remote charts only)
    #[arg(long)]
    chart_version: Option<String>,

    /// Injector to use (must be pre-installed)
    #[arg(long, default_value = "linkerd")]
    injector: String,

    /// Injection command to be used
    #[arg(long, default_value = "inject")]
    command: String,

    /// Flags passed to the injector, without leading "--" (e.g. tls=optional,skip-inbound-ports=25)
    #[arg(long, value_delimiter = ',')]
    inject_flags: Vec<String>,

    /// Log injector stderr output as a warning instead of failing
    #[arg(long)]
    allow_injector_stderr: bool,

    /// Values file or URL (can specify multiple)
    #[arg(short = 'f', long = "values")]
    values_files: Vec<String>,

    /// Set values on the command line (can specify multiple)
    #[arg(long = "set")]
    set: Vec<String>,

    /// Namespace to install the release into (only used with --install)
    #[arg(long)]
    namespace: Option<String>,

    /// Name of the kubeconfig context to use
    #[arg(long = "kubecontext")]
    kube_context: Option<String>,

    /// Time in seconds to wait for any individual Kubernetes operation
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Run an install if a release by this name doesn't already exist
    #[arg(short, long)]
    install: bool,

    /// Simulate an upgrade
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose helm output and debug logging
    #[arg(long)]
    debug: bool,

    /// Enable TLS for the request
    #[arg(long)]
    tls: bool,

    /// Path to TLS certificate file
    #[arg(long)]
    tls_cert: Option<String>,

    /// Path to TLS key file
    #[arg(long)]
    tls_key: Option<String>,

    /// Reset the values to the ones built into the chart
    #[arg(long)]
    reset_values: bool,

    /// Force resource update through delete/recreate if needed
    #[arg(long)]
    force: bool,

    /// helm binary used for fetch, template and upgrade
    #[arg(long, env = "HELM_BIN", default_value = "helm")]
    helm_bin: String,

    /// Keep the staged chart directory instead of removing it
    #[arg(long)]
    keep_workspace: bool,
}

impl UpgradeArgs {
    fn into_config(self) -> PipelineConfig {
        PipelineConfig {
            release: self.release,
            chart: self.chart,
            chart_version: self.chart_version,
            helm: self.helm_bin,
            injector: self.injector,
            inject_command: self.command,
            inject_flags: self.inject_flags,
            allow_injector_stderr: self.allow_injector_stderr,
            values: self.set,
            values_files: self.values_files,
            namespace: self.namespace.filter(|ns| !ns.is_empty()),
            kube_context: self.kube_context.filter(|ctx| !ctx.is_empty()),
            timeout: self.timeout,
            install: self.install,
            dry_run: self.dry_run,
            debug: self.debug,
            tls: self.tls,
            tls_cert: self.tls_cert.filter(|p| !p.is_empty()),
            tls_key: self.tls_key.filter(|p| !p.is_empty()),
            reset_values: self.reset_values,
            force: self.force,
            keep_workspace: self.keep_workspace,
        }
    }
}

/// Default log level; `--debug` implies `-vv`
fn log_level(verbose: u8, debug: bool) -> &'static str {
    match verbose {
        _ if debug => "debug",
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    let debug = match &cli.command {
        Commands::Upgrade(args) => args.debug,
    };
    init_tracing(log_level(cli.verbose, debug));

    let result = match cli.command {
        Commands::Upgrade(args) => commands::upgrade::run(args.into_config()),
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(1, false), "info");
        assert_eq!(log_level(2, false), "debug");
        assert_eq!(log_level(0, true), "debug");
    }

    #[test]
    fn test_upgrade_args_into_config() {
        let cli = Cli::parse_from([
            "helm-inject",
            "upgrade",
            "web",
            "./chart",
            "--inject-flags",
            "tls=optional,skip-inbound-ports=25",
            "-f",
            "a.yaml,b.yaml",
            "--set",
            "image.tag=v2",
            "--namespace",
            "",
            "-i",
            "--timeout",
            "60",
        ]);
        let Commands::Upgrade(args) = cli.command;
        let config = args.into_config();

        assert_eq!(config.release, "web");
        assert_eq!(config.chart, "./chart");
        assert_eq!(config.inject_flags, ["tls=optional", "skip-inbound-ports=25"]);
        // values files are not split on commas
        assert_eq!(config.values_files, ["a.yaml,b.yaml"]);
        assert_eq!(config.values, ["image.tag=v2"]);
        assert_eq!(config.namespace, None);
        assert!(config.install);
        assert_eq!(config.timeout, 60);
        assert_eq!(config.injector, "linkerd");
        assert_eq!(config.inject_command, "inject");
    }
}
