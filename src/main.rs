use std::env;
use std::process::ExitCode;

use idlecombat::{cli, logging};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    logging::init(args.iter().any(|arg| arg == "--verbose"));
    let code = cli::run_with_args(&args);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
