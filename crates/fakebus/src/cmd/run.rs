use std::time::Duration;

use fakebus_mux::{EndpointSet, MuxConfig, Multiplexer, ShutdownCause, ShutdownSignal};
use fakebus_transport::{PtyProvisioner, SerialLine};
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{mux_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{cause_label, print_shutdown, print_startup, OutputFormat, StartupSummary};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = MuxConfig {
        poll_interval: parse_duration(&args.poll_interval)?,
        shutdown_grace: parse_duration(&args.shutdown_grace)?,
        endpoint_write_timeout: parse_duration(&args.endpoint_write_timeout)?,
        failure_policy: args.failure_policy.into(),
    };
    let target = args.target_device.display().to_string();

    let line = SerialLine::open(&args.target_device, args.baud)
        .map_err(|err| transport_error("cannot open target device", err))?;

    // Dropping the provisioner removes whatever it created, so every early
    // return below leaves no endpoint behind.
    let mut provisioner = PtyProvisioner::new(args.fake_bus_prefix.as_str());
    let endpoints = EndpointSet::provision(&mut provisioner, usize::from(args.client_count))
        .map_err(|err| mux_error("cannot create endpoints", err))?;

    let mux = Multiplexer::new(line, endpoints, config)
        .map_err(|err| mux_error("cannot build multiplexer", err))?;
    install_ctrlc_handler(mux.shutdown_signal())?;
    let running = mux
        .start()
        .map_err(|err| mux_error("cannot start multiplexer", err))?;

    print_startup(
        &StartupSummary {
            event: "startup",
            target_device: &target,
            baud: args.baud,
            prefix: provisioner.prefix(),
            client_count: running.endpoint_names().len(),
            endpoints: running.endpoint_names(),
            failure_policy: args.failure_policy.as_str(),
        },
        format,
    );

    let report = running.supervise(&mut provisioner);

    match report.cause {
        ShutdownCause::Requested => info!(uptime = ?report.uptime, "stopped on request"),
        cause => warn!(cause = %cause_label(cause), uptime = ?report.uptime, "stopped"),
    }
    for (name, err) in &report.deprovision_failures {
        warn!(endpoint = %name, error = %err, "endpoint left behind");
    }
    print_shutdown(&report, format);

    Ok(SUCCESS)
}

fn install_ctrlc_handler(signal: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if signal.trigger() {
            info!("interrupt received, shutting down");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
