use anyhow::Result;
use clap::Parser;

mod cli;
mod cmd_snaps_doctor;
mod cmd_snaps_list;
mod cmd_snaps_show;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::List { dir } => cmd_snaps_list::exec(dir),

        cli::Cmd::Show { dir, identity } => cmd_snaps_show::exec(dir, identity),

        cli::Cmd::Doctor { dir, json } => cmd_snaps_doctor::exec(dir, json),
    }
}
