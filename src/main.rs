// src/main.rs

use sentinel::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("sentinel error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// Returns `false` when a `--once` session ended with failures.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    let once = args.once;
    logging::init_logging(args.log_level)?;

    let last = run(args).await?;
    Ok(!once || last.is_none_or(|summary| summary.is_success()))
}
