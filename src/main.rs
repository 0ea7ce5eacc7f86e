use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use termcolor::{BufferWriter, ColorChoice};
use tracing_subscriber::EnvFilter;

use kodegen_keysetup::config::default_config_path;
use kodegen_keysetup::context::SSH_KEY_FILE_NAME;
use kodegen_keysetup::{
    CommandRunner, Context, Settings, SystemRunner, TerminalPrompter, Workflow, fail, platform,
    resolve_identity,
};

// Status lines and banners ignore write errors: a closed stdout must not abort
// a half-finished provisioning run. Reading answers and touching files always
// propagate.

#[derive(Parser)]
#[command(name = "kodegen_keysetup")]
#[command(version, about = "Provision YubiKey-backed SSH and GPG keys for Git")]
struct Cli {
    /// Path to settings file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Log debug detail to stderr (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resident FIDO2 SSH key and add a Host entry to ~/.ssh/config
    Ssh,

    /// Create a GPG key, move its sub-keys to the card and enable Git signing
    Gpg {
        /// Name for the key's user ID (defaults to git user.name)
        #[arg(long, env = "GIT_AUTHOR_NAME")]
        name: Option<String>,

        /// Email for the key's user ID (defaults to git user.email)
        #[arg(long, env = "GIT_AUTHOR_EMAIL")]
        email: Option<String>,
    },

    /// Show effective settings, resolved paths and the detected platform
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        fail!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kodegen_keysetup={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).await?;
    let runner = SystemRunner;
    let mut prompter = TerminalPrompter;

    // Unsupported platforms stop before any prompt.
    let (ctx, workflow) = match cli.command {
        Commands::Show => return show_config(&runner, &settings, cli.config).await,
        Commands::Ssh => (
            Context::from_environment(&runner, settings).await?,
            Workflow::Ssh,
        ),
        Commands::Gpg { name, email } => {
            let ctx = Context::from_environment(&runner, settings).await?;
            let identity = resolve_identity(&runner, &mut prompter, name, email).await?;
            (ctx, Workflow::Gpg(identity))
        }
    };

    print_header(&ctx, &workflow);
    kodegen_keysetup::workflow::run(&ctx, &runner, &mut prompter, &workflow).await?;
    Ok(())
}

fn print_header(ctx: &Context, workflow: &Workflow) {
    let title = match workflow {
        Workflow::Ssh => "YubiKey SSH Setup",
        Workflow::Gpg(_) => "YubiKey GPG Signing Setup",
    };
    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "{}", "=".repeat(60));
    let _ = writeln!(&mut buffer, "🔐 {title}");
    let _ = writeln!(&mut buffer, "Platform: {}", ctx.platform);
    let _ = writeln!(&mut buffer, "{}", "=".repeat(60));
    let _ = bufwtr.print(&buffer);
}

async fn show_config(
    runner: &dyn CommandRunner,
    settings: &Settings,
    explicit: Option<PathBuf>,
) -> Result<()> {
    let source = explicit
        .or_else(default_config_path)
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());
    let platform = match platform::detect(runner).await {
        Ok(platform) => platform.to_string(),
        Err(e) => format!("unsupported ({e})"),
    };

    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "📋 Current Setup Configuration\n");
    let _ = writeln!(&mut buffer, "Settings file: {source}");
    let _ = writeln!(&mut buffer, "Platform:      {platform}");

    if let Some(home) = dirs::home_dir() {
        let ssh_dir = home.join(".ssh");
        let _ = writeln!(
            &mut buffer,
            "SSH key:       {}",
            ssh_dir.join(SSH_KEY_FILE_NAME).display()
        );
        let _ = writeln!(&mut buffer, "SSH config:    {}", ssh_dir.join("config").display());
    }

    let _ = writeln!(&mut buffer, "\n{}", settings.to_toml()?);
    let _ = bufwtr.print(&buffer);
    Ok(())
}
