use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("murmur {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: murmur");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("MURMUR_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("log_file: {}", murmur_client::store::LOG_FILE_NAME);
    println!(
        "wire: magic={} max_payload={} max_parts={}",
        String::from_utf8_lossy(&murmur_frame::codec::MAGIC),
        murmur_frame::DEFAULT_MAX_PAYLOAD,
        murmur_frame::DEFAULT_MAX_PARTS
    );

    Ok(SUCCESS)
}
