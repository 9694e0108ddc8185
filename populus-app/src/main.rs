use clap::Parser;
use populus_app::cli::Cli;
use populus_app::run;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Credentials may live in a local .env file.
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let code = run::execute(cli, &mut std::io::stdout()).await;
    ExitCode::from(code)
}
