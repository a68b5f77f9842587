use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    default_poll_interval_ms: u128,
    max_payload: usize,
}

impl VersionInfo {
    fn collect() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("PLOTBRIDGE_BUILD_TARGET").unwrap_or("unknown"),
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            default_poll_interval_ms: plotbridge_bridge::DEFAULT_POLL_INTERVAL.as_millis(),
            max_payload: plotbridge_frame::DEFAULT_MAX_PAYLOAD,
        }
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("plotbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = VersionInfo::collect();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Pretty => {
            println!("name: {}", info.name);
            println!("version: {}", info.version);
            println!("target: {}", info.target);
            println!("target_os: {}", info.target_os);
            println!("target_arch: {}", info.target_arch);
            println!("rustc: {}", info.rustc);
            println!("git_hash: {}", info.git_hash);
            println!("default_poll_interval: {}ms", info.default_poll_interval_ms);
            println!("max_payload: {} bytes", info.max_payload);
        }
    }

    Ok(SUCCESS)
}
