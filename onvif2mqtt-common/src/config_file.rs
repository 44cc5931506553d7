use miette::{Context, IntoDiagnostic};
use serde::Deserialize;
use std::path::Path;

pub fn load_config_file<T: for<'de> Deserialize<'de>>(file: &Path) -> miette::Result<T> {
    let contents = std::fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read config file {}", file.display()))?;

    parse_config_str(&contents)
}

pub fn parse_config_str<T: for<'de> Deserialize<'de>>(contents: &str) -> miette::Result<T> {
    toml::from_str(contents)
        .into_diagnostic()
        .wrap_err("Failed to parse config file")
}
