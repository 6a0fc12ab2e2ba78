use std::process;
use std::time::Instant;

use vmcloud_normalize::{pipeline, Config, Result};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let now = Instant::now();
    if let Err(e) = normalize() {
        log::error!("Normalization failed: {e}");
        process::exit(1);
    }
    log::info!("Elapsed: {:.2?}", now.elapsed());
}

fn normalize() -> Result<()> {
    let config = Config::load()?;
    let output = pipeline::run(&config)?;

    println!("Normalized data saved to: {}", output.output_path.display());
    println!("{}", output.table.preview(config.preview_rows));
    Ok(())
}
