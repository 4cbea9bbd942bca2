use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the generated Android package is signed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SigningMode {
    /// Unsigned package.
    None,
    /// Generate a fresh signing key.
    #[default]
    New,
    /// Use a key file supplied by the caller.
    Mine,
}

/// Build configuration for a Google Play package.
///
/// The processor never looks inside these options; they are handed to the
/// package builder as-is. Fields the builder understands but this crate does
/// not model are kept in `extra` so nothing is lost on the way through the
/// queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PackageOptions {
    #[garde(url)]
    pub pwa_url: String,

    #[garde(length(min = 1, max = 200))]
    pub package_id: String,

    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(length(min = 1, max = 30))]
    #[serde(default)]
    pub launcher_name: Option<String>,

    #[garde(length(min = 1, max = 50))]
    #[serde(default)]
    pub app_version: Option<String>,

    #[garde(range(min = 1))]
    #[serde(default)]
    pub app_version_code: Option<u32>,

    #[garde(skip)]
    #[serde(default)]
    pub signing_mode: SigningMode,

    #[garde(skip)]
    #[serde(default)]
    pub include_source_code: bool,

    #[garde(skip)]
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageOptions {
    /// Minimal options for the given PWA URL, with name and package id
    /// derived from its host.
    pub fn for_url(pwa_url: &str) -> Self {
        let host = reqwest::Url::parse(pwa_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let package_id = host
            .split('.')
            .rev()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");

        Self {
            pwa_url: pwa_url.to_string(),
            package_id: format!("{}.twa", package_id),
            name: host,
            launcher_name: None,
            app_version: None,
            app_version_code: None,
            signing_mode: SigningMode::default(),
            include_source_code: false,
            extra: serde_json::Map::new(),
        }
    }
}
