use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

mod args;
mod stars;

fn main() {
    let args = args::Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    match stars::run_command(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            warn!("Error occurred {:?}", e);
            eprintln!("An error occurred: {}", e);
            if e.exit_code() == 2 {
                eprintln!("Nothing was saved. The command can be retried.");
            }
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(e.exit_code());
        }
    }
}
