use clap::Parser;
use mijia_listener::app::{self, Options};
use mijia_listener::backend;
use std::panic::{self, PanicHookInfo};
use tracing_subscriber::EnvFilter;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log to stderr so stdout carries nothing but readings.
///
/// `--verbose` forces debug level; otherwise `RUST_LOG` applies, defaulting to info.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let bluetooth = backend::open(options.backend, options.tools_config()).await?;

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    app::run_with_io(options, bluetooth.as_ref(), &mut stdout, &mut stderr).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Process managers (cron, systemd, Telegraf exec) only see the exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
