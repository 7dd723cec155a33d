use clap::Parser;
use miette::Result;
use riskreg::cli::commands;
use riskreg::cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    // RISKREG_LOG wins over --verbose
    let filter = EnvFilter::try_from_env("RISKREG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if global.verbose { "riskreg=debug" } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global).await,
        Commands::Risk(cmd) => commands::risk::run(cmd, &global).await,
        Commands::Ctrl(cmd) => commands::ctrl::run(cmd, &global).await,
        Commands::Uc(cmd) => commands::uc::run(cmd, &global).await,
        Commands::Link(cmd) => commands::link::run(cmd, &global).await,
        Commands::Validate(args) => commands::validate::run(args, &global).await,
        Commands::Status(args) => commands::status::run(args, &global).await,
        Commands::Completions(args) => commands::completions::run(args),
    }
}
