use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};

const LOG_ENV: &str = "QUERYGATE_LOG";

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(std::io::stderr);

    // a global subscriber may already be installed
    if json {
        let _ = builder
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init();
    } else {
        let _ = builder.try_init();
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[querygate] Failed: {e:?}");
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}
