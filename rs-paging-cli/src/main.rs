use clap::Parser;

mod cli;

fn main() {
    // RUST_LOG=debug shows every pipeline stage
    env_logger::init();

    let cli = cli::Cli::parse();
    let mut stdout = std::io::stdout().lock();
    if let Err(error) = cli::run(cli, &mut stdout) {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}
