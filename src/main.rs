use clap::Parser;

use pool_recover_lib::{Cli, Settings, run};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = Settings::from_cli(cli).and_then(|settings| run(&settings));
    match result.and_then(|out| Ok(serde_json::to_string_pretty(&out)?)) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            log::error!("recovery failed: {e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
