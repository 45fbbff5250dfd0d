use crate::config::generate::generate_starter_config;
use crate::config::{load_config, SYSTEM_CONFIG_PATH, USER_CONFIG_PATH};
use crate::source::PROP_PARSER;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    write_config(&generate_starter_config(), stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer the user config directory, fall back to the system location
    let config_path = dirs::home_dir()
        .map(|home_dir| home_dir.join(USER_CONFIG_PATH))
        .filter(|user_config| match user_config.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to {}", SYSTEM_CONFIG_PATH);
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH));

    if config_path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn check(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    let config = load_config(&path)?;
    println!("✓ Config is valid");
    println!(
        "  index: {} (mappings from {})",
        config.index.url, config.index.mappings_path
    );
    for source in &config.sources {
        println!(
            "  {} [{}] every {:?} via {}{}",
            source.type_key,
            if source.active { "active" } else { "inactive" },
            source.scheduling_frequency,
            source.scheduler_type,
            source
                .property(PROP_PARSER)
                .map(|parser| format!(", parser {}", parser))
                .unwrap_or_default()
        );
    }
    Ok(())
}
