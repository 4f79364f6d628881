//! pgprobe - PostgreSQL connectivity checker.

use pgprobe::cli::Cli;
use pgprobe::db::PostgresConnector;
use pgprobe::logging;
use pgprobe::network::NetworkProber;
use pgprobe::runner::Runner;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init_stderr_logging();

    let cli = Cli::parse_args();
    let runner =
        Runner::new(NetworkProber::new(), PostgresConnector).with_overrides(cli.overrides());

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    // The runner has already reported the failure on stderr.
    match runner
        .run(&cli.config_path(), &mut stdout, &mut stderr)
        .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
