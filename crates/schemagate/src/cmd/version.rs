use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("schemagate {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: schemagate");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SCHEMAGATE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("protocol_version: {}", schemagate_frame::PROTOCOL_VERSION);
    println!(
        "schemas: {}/{}",
        schemagate_schema::DEFAULT_SCHEMAS_BASE,
        schemagate_schema::DEFAULT_SCHEMAS_VERSION
    );
    println!("unix_socket: {}", cfg!(unix));

    Ok(SUCCESS)
}
