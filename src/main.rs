mod app;
mod config;
mod field;
mod input;
mod logging;
mod mail;
mod model;
mod network;
mod overlay;
mod page;
mod render;
mod scene;
mod timeline;
mod typing;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = config::Args::parse();
    logging::init(args.log_file.as_deref())?;
    let settings = config::resolve(&args)?;
    log::debug!("settings {settings:?}");
    app::run(settings)
}
