//! Service configuration, layered from one or more TOML files.
//!
//! Later files override earlier ones key by key, so a site file only needs the
//! settings it changes. The ITS API key may also come from `OPENAPI_ITS_KEY`, which
//! keeps it out of files that end up in version control.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use toml::Value;

use crate::its_client::{CCTV_TYPE_HLS_HTTP, CCTV_TYPE_HLS_HTTPS};
use crate::link_matcher::DEFAULT_MIN_PREFIX_LEN;
use crate::traffic::TrafficSettings;



pub const API_KEY_ENV: &str = "OPENAPI_ITS_KEY";

const DEFAULT_CONFIG_FILES: [&str; 2] = ["/etc/cctv-viewer/config.toml", "cctv-viewer.toml"];

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub its: ItsConfig,
	pub catalog: CatalogConfig,
	pub traffic: TrafficConfig,
	pub cctv: CctvConfig,
	pub favorites: FavoritesConfig,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ItsConfig {
	pub api_key: String,
	pub base_url: String,
	/// Ask for HTTPS stream urls (needed when the viewer itself is served over HTTPS).
	pub use_https: bool,
	pub timeout_secs: u64,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
	pub path: PathBuf,
	pub search_limit: usize,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
	/// Degrees; 0.01 is roughly a kilometre.
	pub search_radius: f64,
	pub min_prefix_len: usize,
	pub refresh_interval_secs: u64,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CctvConfig {
	/// Half-width in degrees of the box used to re-find a camera upstream.
	pub coord_tolerance: f64,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FavoritesConfig {
	pub path: PathBuf,
	pub capacity: usize,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			its: ItsConfig::default(),
			catalog: CatalogConfig::default(),
			traffic: TrafficConfig::default(),
			cctv: CctvConfig::default(),
			favorites: FavoritesConfig::default(),
		}
	}
}

impl Default for ItsConfig {
	fn default() -> ItsConfig {
		ItsConfig {
			api_key: String::new(),
			base_url: "https://openapi.its.go.kr:9443".to_string(),
			use_https: false,
			timeout_secs: 30,
		}
	}
}

impl Default for CatalogConfig {
	fn default() -> CatalogConfig {
		CatalogConfig {
			path: PathBuf::from("data/cctv-data-with-links.json"),
			search_limit: 10,
		}
	}
}

impl Default for TrafficConfig {
	fn default() -> TrafficConfig {
		TrafficConfig {
			search_radius: 0.01,
			min_prefix_len: DEFAULT_MIN_PREFIX_LEN,
			refresh_interval_secs: 60,
		}
	}
}

impl Default for CctvConfig {
	fn default() -> CctvConfig {
		CctvConfig { coord_tolerance: 0.0005 }
	}
}

impl Default for FavoritesConfig {
	fn default() -> FavoritesConfig {
		FavoritesConfig {
			path: PathBuf::from("favorites.json"),
			capacity: 10,
		}
	}
}

impl Config {
	pub fn cctv_type(&self) -> u8 {
		if self.its.use_https { CCTV_TYPE_HLS_HTTPS } else { CCTV_TYPE_HLS_HTTP }
	}

	pub fn traffic_settings(&self) -> TrafficSettings {
		TrafficSettings {
			search_radius: self.traffic.search_radius,
			min_prefix_len: self.traffic.min_prefix_len,
			refresh_interval: Duration::from_secs(self.traffic.refresh_interval_secs.max(1)),
		}
	}
}



#[derive(Clone)]
#[derive(Debug)]
pub struct ConfigManager {
	merged: toml::Table,
	config: Config,
}

impl ConfigManager {
	pub fn new() -> ConfigManager {
		ConfigManager {
			merged: toml::Table::new(),
			config: Config::default(),
		}
	}

	pub fn get_config(&self) -> &Config {
		&self.config
	}

	/// Read the given files in order; every one of them must exist.
	pub fn read_config(&mut self, filenames: Vec<&str>) -> anyhow::Result<()> {
		for filename in filenames {
			let text = std::fs::read_to_string(filename)
				.with_context(|| format!("Cannot read config file {}", filename))?;
			self.merge_str(&text)
				.with_context(|| format!("Invalid config file {}", filename))?;
			info!("Loaded config from {}", filename);
		}
		self.finish()
	}

	/// Read whichever default files are present; none at all means built-in defaults.
	pub fn read_default_config_files(&mut self) -> anyhow::Result<()> {
		for filename in DEFAULT_CONFIG_FILES {
			if !Path::new(filename).exists() {
				continue;
			}
			let text = std::fs::read_to_string(filename)
				.with_context(|| format!("Cannot read config file {}", filename))?;
			self.merge_str(&text)
				.with_context(|| format!("Invalid config file {}", filename))?;
			info!("Loaded config from {}", filename);
		}
		self.finish()
	}

	fn merge_str(&mut self, text: &str) -> anyhow::Result<()> {
		let table: toml::Table = text.parse()?;
		merge_tables(&mut self.merged, table);
		Ok(())
	}

	fn finish(&mut self) -> anyhow::Result<()> {
		let mut config: Config = Value::Table(self.merged.clone()).try_into()?;
		if let Ok(key) = std::env::var(API_KEY_ENV) {
			if !key.is_empty() {
				config.its.api_key = key;
			}
		}
		if config.its.api_key.is_empty() {
			warn!("No ITS API key configured; set {} or its.api_key", API_KEY_ENV);
		}
		self.config = config;
		Ok(())
	}
}

impl Default for ConfigManager {
	fn default() -> ConfigManager {
		ConfigManager::new()
	}
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
	for (key, value) in overlay {
		match (base.get_mut(&key), value) {
			(Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
			(_, value) => {
				base.insert(key, value);
			}
		}
	}
}
