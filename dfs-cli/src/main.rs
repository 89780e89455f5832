mod cli;
mod inf;
mod list;
mod maintain;
mod mmbcmd;
mod names;
mod transfer;

pub use list::{InfoCmd, ListCmd};

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .init();

    let result = match &cli.command {
        Commands::List(cmd) => list::list(cmd, &cli),
        Commands::Info(cmd) => list::info(cmd, &cli),
        Commands::Create(cmd) => maintain::create(cmd, &cli),
        Commands::Import(cmd) => transfer::import(cmd, &cli),
        Commands::Export(cmd) => transfer::export(cmd, &cli),
        Commands::Copy(cmd) => transfer::copy(cmd, &cli),
        Commands::Rename(cmd) => maintain::rename(cmd, &cli),
        Commands::Delete(cmd) => maintain::delete(cmd, &cli),
        Commands::Attrib(cmd) => maintain::attrib(cmd, &cli),
        Commands::Compact(cmd) => maintain::compact(cmd, &cli),
        Commands::Format(cmd) => maintain::format(cmd, &cli),
        Commands::Convert(cmd) => maintain::convert(cmd, &cli),
        Commands::Validate(cmd) => maintain::validate_cmd(cmd, &cli),
        Commands::Digest(cmd) => maintain::digest(cmd, &cli),
        Commands::Mmb(cmd) => mmbcmd::run(cmd, &cli),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
