//! trapscan - Pest trap and seed-tray photo monitoring using AI image analysis
//!
//! A CLI tool that counts pests on sticky traps and classifies seed-tray
//! cells from photos, aggregating repeated vision-oracle passes into robust
//! counts with alert tiers and calendar trends.

mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::Cli;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = commands::execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
