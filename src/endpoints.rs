use std::{fmt, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// A named JSON-RPC node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read endpoints file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse endpoints file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("endpoint {0} is missing a url")]
    MissingUrl(usize),
    #[error("no endpoints found in configuration")]
    NoEndpoints,
}

#[derive(Deserialize)]
struct EndpointsFile {
    #[serde(default)]
    rpc: RpcSection,
}

#[derive(Default, Deserialize)]
struct RpcSection {
    #[serde(default)]
    endpoints: Vec<EndpointEntry>,
}

#[derive(Deserialize)]
struct EndpointEntry {
    name: Option<String>,
    url: Option<String>,
}

/// Reads the `[[rpc.endpoints]]` tables from a TOML file.
pub fn load_endpoints(path: &Path) -> Result<Vec<Endpoint>, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_endpoints(&contents)
}

pub fn parse_endpoints(contents: &str) -> Result<Vec<Endpoint>, ConfigError> {
    let file: EndpointsFile = toml::from_str(contents)?;

    let endpoints = file
        .rpc
        .endpoints
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let position = index + 1;
            let url = entry
                .url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .ok_or(ConfigError::MissingUrl(position))?;
            let name = entry
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("endpoint-{}", position));
            Ok(Endpoint { name, url })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    if endpoints.is_empty() {
        return Err(ConfigError::NoEndpoints);
    }

    Ok(endpoints)
}
