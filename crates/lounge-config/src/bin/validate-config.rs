//! Config validation CLI tool
//!
//! Validates a lounge configuration file and reports any errors.

use lounge_api::DeviceKind;
use lounge_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a lounge configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match lounge_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", lounge_config::CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", config.service.data_dir.display());
            println!("  Member file: {}", config.service.member_file.display());
            println!("  Devices: {}", config.room.device_count());
            println!();
            println!("Devices:");
            for (id, kind) in config.room.devices() {
                let kind_str = match kind {
                    DeviceKind::Workstation => "workstation",
                    DeviceKind::SharedConsole => "shared console",
                };
                println!("  - {} [{}]", id, kind_str);
            }
            let order: Vec<String> = config.room.slot_order.iter().map(|d| d.to_string()).collect();
            println!();
            println!("Slot order: {}", order.join(", "));

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                lounge_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                lounge_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                lounge_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                lounge_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        lounge_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
