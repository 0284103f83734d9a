use quire_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config::CliConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            endpoint,
            api_key,
            timeout_secs,
        } => run_config_init(endpoint, api_key, timeout_secs),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<(), CliError> {
    let existing = CliConfig::load().map_err(CliError::Config)?;
    let config = merge_config_values(existing, endpoint, api_key, timeout_secs);
    config.validate().map_err(CliError::Config)?;

    let path = config.save().map_err(CliError::Config)?;
    println!("Config initialized at {}", path.display());

    let mut missing_fields = Vec::new();
    if normalize_text_option(config.api_endpoint.clone()).is_none() {
        missing_fields.push("endpoint");
    }
    if normalize_text_option(config.api_key.clone()).is_none() {
        missing_fields.push("api_key");
    }
    if missing_fields.is_empty() {
        println!("Sync is ready. Run `quire sync`.");
    } else {
        println!("Config is missing: {}", missing_fields.join(", "));
    }

    Ok(())
}

/// Apply explicitly passed values on top of the stored config.
pub fn merge_config_values(
    mut config: CliConfig,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
) -> CliConfig {
    if let Some(value) = normalize_text_option(endpoint) {
        config.api_endpoint = Some(value.trim_end_matches('/').to_string());
    }
    if let Some(value) = normalize_text_option(api_key) {
        config.api_key = Some(value);
    }
    if let Some(value) = timeout_secs {
        config.timeout_secs = value;
    }
    config
}
