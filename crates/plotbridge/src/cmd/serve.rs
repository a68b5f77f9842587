use plotbridge_bridge::{Bridge, BridgeConfig, Dispatcher, Lifecycle, StopReason};

use crate::cmd::{parse_duration, ServeArgs};
use crate::evaluator::{LogRenderer, TraceEvaluator};
use crate::exit::{bridge_error, CliError, CliResult, INTERNAL};
use crate::output::{print_summary, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = build_config(&args)?;
    let dispatcher = Dispatcher::new(TraceEvaluator::default(), LogRenderer::default());
    let lifecycle = Lifecycle::new();
    install_ctrlc_handler(lifecycle.clone())?;

    let mut bridge = Bridge::bind(&args.path, config, dispatcher)
        .map_err(|err| bridge_error("bind failed", err))?
        .with_lifecycle(lifecycle);

    let reason = bridge
        .serve()
        .map_err(|err| bridge_error("serve failed", err))?;

    print_summary(reason, bridge.totals(), format);
    Ok(reason.exit_code())
}

fn build_config(args: &ServeArgs) -> CliResult<BridgeConfig> {
    let mut config = BridgeConfig::default()
        .with_poll_interval(parse_duration(&args.poll_interval)?)
        .with_revision(args.protocol.into());
    if let Some(max) = args.max_payload {
        if max == 0 {
            return Err(CliError::usage("--max-payload must be greater than zero"));
        }
        config = config.with_max_payload_size(max);
    }
    Ok(config)
}

fn install_ctrlc_handler(lifecycle: Lifecycle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        lifecycle.request_stop(StopReason::Interrupted);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use plotbridge_protocol::ProtocolRevision;

    use super::*;
    use crate::cmd::Protocol;

    fn args(poll: &str, max: Option<usize>) -> ServeArgs {
        ServeArgs {
            path: PathBuf::from("/tmp/unused.sock"),
            poll_interval: poll.to_string(),
            protocol: Protocol::Legacy,
            max_payload: max,
        }
    }

    #[test]
    fn config_from_args() {
        let config = build_config(&args("20ms", Some(4096))).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.revision, ProtocolRevision::Legacy);
        assert_eq!(config.max_payload_size, 4096);
    }

    #[test]
    fn zero_max_payload_is_usage_error() {
        let err = build_config(&args("50ms", Some(0))).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
