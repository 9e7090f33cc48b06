use clap::Parser;
use ftpgrab::{logging, run, write_error, Cli, RunStatus, EXIT_FAILURE};
use ftpgrab_core::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let code = match run(&cli, &cancel).await {
        Ok(status) => {
            if status == RunStatus::Cancelled {
                println!("Abort");
            }
            status.exit_code()
        }
        Err(e) => {
            let _ = write_error(&e, &mut std::io::stderr());
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
