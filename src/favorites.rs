use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use log::{error, info, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::common::{CameraList, CameraRecord};



pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum FavoritesError {
	#[error("favorites are limited to {0} cameras")]
	CapacityReached(usize),
}

/// Where favorites live between runs.
#[rocket::async_trait]
pub trait FavoriteStore: Send + Sync {
	async fn load(&self) -> anyhow::Result<CameraList>;
	async fn save(&self, favorites: &[CameraRecord]) -> anyhow::Result<()>;
}

/// Favorites kept as a JSON array in a single file.
pub struct JsonFileStore {
	path: PathBuf,
}

impl JsonFileStore {
	pub fn new(path: PathBuf) -> JsonFileStore {
		JsonFileStore { path }
	}
}

#[rocket::async_trait]
impl FavoriteStore for JsonFileStore {
	async fn load(&self) -> anyhow::Result<CameraList> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			// First run, before anything was saved
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(err).with_context(|| format!("Cannot read {}", self.path.display())),
		};
		Ok(serde_json::from_slice(&bytes)?)
	}

	async fn save(&self, favorites: &[CameraRecord]) -> anyhow::Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		let file = tokio::fs::File::create(&self.path).await?;
		let json = serde_json::to_vec_pretty(favorites)?;
		let mut writer = tokio::io::BufWriter::new(file);
		writer.write_all(&json).await?;
		writer.flush().await?;
		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryStore {
	saved: Mutex<CameraList>,
}

#[rocket::async_trait]
impl FavoriteStore for MemoryStore {
	async fn load(&self) -> anyhow::Result<CameraList> {
		Ok(self.saved.lock().map_err(|_| anyhow::anyhow!("favorites lock poisoned"))?.clone())
	}

	async fn save(&self, favorites: &[CameraRecord]) -> anyhow::Result<()> {
		*self.saved.lock().map_err(|_| anyhow::anyhow!("favorites lock poisoned"))? = favorites.to_vec();
		Ok(())
	}
}



/// Ordered favorites, unique by camera name and capped at `capacity`.
pub struct Favorites {
	store: Box<dyn FavoriteStore>,
	entries: CameraList,
	capacity: usize,
}

impl Favorites {
	/// A store that cannot be read is logged and treated as empty.
	pub async fn open(store: Box<dyn FavoriteStore>, capacity: usize) -> Favorites {
		let mut entries = match store.load().await {
			Ok(entries) => entries,
			Err(err) => {
				error!("Failed to load favorites; error was {:#}", err);
				Vec::new()
			}
		};
		dedup_by_name(&mut entries);
		if entries.len() > capacity {
			warn!("Stored favorites exceed capacity {}; dropping {}", capacity, entries.len() - capacity);
			entries.truncate(capacity);
		}
		Favorites { store, entries, capacity }
	}

	pub fn list(&self) -> &[CameraRecord] {
		&self.entries
	}

	pub fn is_favorite(&self, name: &str) -> bool {
		self.entries.iter().any(|entry| entry.cctvname == name)
	}

	/// Appends `camera` unless one with the same name is already present.
	pub async fn add(&mut self, camera: CameraRecord) -> Result<(), FavoritesError> {
		if self.is_favorite(&camera.cctvname) {
			return Ok(());
		}
		if self.entries.len() >= self.capacity {
			return Err(FavoritesError::CapacityReached(self.capacity));
		}
		self.entries.push(camera);
		self.persist().await;
		Ok(())
	}

	pub async fn remove(&mut self, name: &str) -> bool {
		let before = self.entries.len();
		self.entries.retain(|entry| entry.cctvname != name);
		let removed = self.entries.len() != before;
		if removed {
			self.persist().await;
		}
		removed
	}

	/// Returns whether the camera is a favorite afterwards.
	pub async fn toggle(&mut self, camera: CameraRecord) -> Result<bool, FavoritesError> {
		if self.is_favorite(&camera.cctvname) {
			self.remove(&camera.cctvname).await;
			Ok(false)
		} else {
			self.add(camera).await?;
			Ok(true)
		}
	}

	// The in-memory list stays authoritative when the store is unavailable.
	async fn persist(&self) {
		match self.store.save(&self.entries).await {
			Ok(_) => {
				info!("Saved {} favorites", self.entries.len());
			},
			Err(err) => {
				error!("Failed to save favorites; error was {:#}", err);
			}
		}
	}
}

fn dedup_by_name(entries: &mut CameraList) {
	let mut seen = std::collections::HashSet::new();
	entries.retain(|entry| seen.insert(entry.cctvname.clone()));
}
