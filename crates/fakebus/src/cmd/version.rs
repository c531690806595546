use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("fakebus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: fakebus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FAKEBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "defaults: poll_interval={:?}, shutdown_grace={:?}, endpoint_write_timeout={:?}",
        fakebus_mux::DEFAULT_POLL_INTERVAL,
        fakebus_mux::DEFAULT_SHUTDOWN_GRACE,
        fakebus_mux::DEFAULT_ENDPOINT_WRITE_TIMEOUT
    );

    Ok(SUCCESS)
}
