use std::error::Error;

use dense_windows::cli::{DensepArgs, run};
use ortho_config::OrthoConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    // stdout carries the JSON result; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = DensepArgs::load()?;
    let output = run(&args)?;
    println!("{output}");
    Ok(())
}
