use std::io::{self, BufReader};
use std::path::PathBuf;

use viavoice_bridge::engines::viavoice::{LinkedEci, Strictness};
use viavoice_bridge::protocol::{serve, ModuleOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut options = ModuleOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--strict" => options.strictness = Strictness::Strict,
            _ if options.config_path.is_none() => options.config_path = Some(PathBuf::from(&arg)),
            _ => log::warn!("ignoring extra argument: {arg}"),
        }
    }
    log::info!(
        "sd_viavoice starting, config {:?}, {:?}",
        options.config_path,
        options.strictness
    );

    serve(
        LinkedEci::new,
        &options,
        BufReader::new(io::stdin()),
        io::stdout().lock(),
    )?;
    Ok(())
}
