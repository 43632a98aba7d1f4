use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use rocket::serde::json::{json, Value};

use crate::common::{BoundingArea, CameraList, CameraRecord, RoadType};
use crate::its_client::{parse_camera_envelope, AreaSource};



/// In-memory camera catalog, swapped out wholesale when a new snapshot arrives.
#[derive(Clone)]
#[derive(Debug, Default)]
pub struct Catalog {
	cameras: CameraList,
}

impl Catalog {
	pub fn new(cameras: CameraList) -> Catalog {
		Catalog { cameras }
	}

	/// Load a `{ "response": { "data": [...] } }` snapshot.
	pub fn load(path: &Path) -> anyhow::Result<Catalog> {
		let file = File::open(path)
			.with_context(|| format!("Cannot open catalog {}", path.display()))?;
		let body: Value = serde_json::from_reader(BufReader::new(file))
			.with_context(|| format!("Cannot parse catalog {}", path.display()))?;
		let cameras = parse_camera_envelope(&body)?;
		info!("Loaded {} cameras from {}", cameras.len(), path.display());
		Ok(Catalog::new(cameras))
	}

	/// Like [`Catalog::load`], but a missing or broken snapshot yields an empty catalog.
	pub fn load_or_empty(path: &Path) -> Catalog {
		match Catalog::load(path) {
			Ok(catalog) => catalog,
			Err(err) => {
				warn!("Starting with an empty catalog; error was {:#}", err);
				Catalog::default()
			}
		}
	}

	pub fn len(&self) -> usize {
		self.cameras.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cameras.is_empty()
	}

	pub fn all(&self) -> &[CameraRecord] {
		&self.cameras
	}

	pub fn replace(&mut self, cameras: CameraList) {
		info!("Catalog replaced: {} -> {} cameras", self.cameras.len(), cameras.len());
		self.cameras = cameras;
	}

	pub fn cameras_in(&self, area: &BoundingArea) -> CameraList {
		self.cameras.iter()
			.filter(|camera| area.contains(camera.coordx, camera.coordy))
			.cloned()
			.collect()
	}

	/// Case-insensitive substring search on camera names, at most `limit` hits.
	/// Whitespace only decides whether the query is blank; it is matched as typed.
	pub fn search_by_name(&self, query: &str, limit: usize) -> CameraList {
		if query.trim().is_empty() {
			return Vec::new();
		}
		let query = query.to_lowercase();
		self.cameras.iter()
			.filter(|camera| camera.cctvname.to_lowercase().contains(&query))
			.take(limit)
			.cloned()
			.collect()
	}

	/// Copy road-link fields from `previous` onto cameras with the same key.
	///
	/// Upstream camera lists carry no link mapping, so a fresh download would otherwise
	/// lose every `linkId`. Returns how many cameras got their links back.
	pub fn carry_links_from(&mut self, previous: &Catalog) -> usize {
		let linked: HashMap<String, &CameraRecord> = previous.cameras.iter()
			.filter(|camera| camera.link_id.is_some())
			.map(|camera| (camera.key(), camera))
			.collect();
		let mut carried = 0;
		for camera in self.cameras.iter_mut().filter(|camera| camera.link_id.is_none()) {
			if let Some(old) = linked.get(&camera.key()) {
				camera.link_id = old.link_id.clone();
				camera.link_road_name = old.link_road_name.clone();
				camera.link_distance = old.link_distance;
				carried += 1;
			}
		}
		if carried < linked.len() {
			warn!("{} linked cameras are gone from the new catalog", linked.len() - carried);
		}
		info!("Carried road links over for {} cameras", carried);
		carried
	}

	pub fn find_by_name(&self, name: &str) -> Option<&CameraRecord> {
		self.cameras.iter().find(|camera| camera.cctvname == name)
	}

	/// Snapshot in the same envelope [`Catalog::load`] reads.
	pub fn to_snapshot(&self) -> Value {
		json!({
			"response": {
				"datacount": self.cameras.len(),
				"data": self.cameras,
			}
		})
	}
}

/// Fetch highway and national-road cameras in `area` and merge them, tagging each
/// record with the road type it came from.
pub async fn download_catalog(source: &dyn AreaSource, area: &BoundingArea, cctv_type: u8) -> anyhow::Result<Catalog> {
	let mut merged = CameraList::new();
	for road_type in [RoadType::Highway, RoadType::NationalRoad] {
		let cameras = source.cameras(area, road_type, cctv_type).await
			.with_context(|| format!("Cannot download {} cameras", road_type))?;
		info!("Downloaded {} {} cameras", cameras.len(), road_type);
		merged.extend(cameras.into_iter().map(|mut camera| {
			camera.road_type = Some(road_type);
			camera
		}));
	}
	Ok(Catalog::new(merged))
}



#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	use anyhow::anyhow;

	use crate::common::TrafficList;

	fn sample() -> Catalog {
		Catalog::new(vec![
			CameraRecord::new("[Gyeongbu] Hannam IC", 127.01, 37.53),
			CameraRecord::new("[Gyeongbu] Seocho", 127.02, 37.49),
			CameraRecord::new("Busan Port", 129.04, 35.10),
		])
	}

	#[test]
	fn filters_by_bounds() {
		let area = BoundingArea::new(126.9, 127.1, 37.4, 37.6).unwrap();
		let found = sample().cameras_in(&area);
		assert_eq!(found.len(), 2);
		assert!(found.iter().all(|camera| camera.coordx < 128.0));
	}

	#[test]
	fn search_is_case_insensitive_and_limited() {
		let catalog = sample();
		assert_eq!(catalog.search_by_name("gyeongbu", 10).len(), 2);
		assert_eq!(catalog.search_by_name("GYEONGBU", 1).len(), 1);
		assert_eq!(catalog.search_by_name("port", 10)[0].cctvname, "Busan Port");
	}

	#[test]
	fn blank_search_finds_nothing() {
		assert!(sample().search_by_name("   ", 10).is_empty());
	}

	#[test]
	fn search_keeps_surrounding_whitespace() {
		let catalog = sample();
		assert_eq!(catalog.search_by_name("] seocho", 10).len(), 1);
		assert!(catalog.search_by_name(" busan port ", 10).is_empty());
		assert_eq!(catalog.search_by_name("busan port", 10).len(), 1);
	}

	#[test]
	fn replace_swaps_everything() {
		let mut catalog = sample();
		catalog.replace(vec![CameraRecord::new("only", 0.0, 0.0)]);
		assert_eq!(catalog.len(), 1);
		assert!(catalog.find_by_name("Busan Port").is_none());
		assert!(catalog.find_by_name("only").is_some());
	}

	#[test]
	fn snapshot_loads_back() {
		let dir = std::env::temp_dir().join("cctv_viewer_catalog_test");
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("snapshot.json");
		std::fs::write(&path, serde_json::to_string(&sample().to_snapshot()).unwrap()).unwrap();

		let loaded = Catalog::load(&path).unwrap();
		assert_eq!(loaded.all(), sample().all());
	}

	#[test]
	fn missing_snapshot_is_empty() {
		let catalog = Catalog::load_or_empty(&PathBuf::from("/nonexistent/cctv.json"));
		assert!(catalog.is_empty());
	}

	struct TwoRoads;

	#[rocket::async_trait]
	impl AreaSource for TwoRoads {
		async fn cameras(&self, _area: &BoundingArea, road_type: RoadType, _cctv_type: u8) -> anyhow::Result<CameraList> {
			match road_type {
				RoadType::Highway => Ok(vec![CameraRecord::new("hw", 127.0, 37.0)]),
				RoadType::NationalRoad => Ok(vec![CameraRecord::new("nat1", 127.1, 37.1), CameraRecord::new("nat2", 127.2, 37.2)]),
			}
		}

		async fn traffic(&self, _area: &BoundingArea) -> anyhow::Result<TrafficList> {
			Err(anyhow!("unused"))
		}
	}

	#[rocket::async_test]
	async fn links_survive_a_fresh_download() {
		let mut gate = CameraRecord::new("nat1", 127.1, 37.1);
		gate.link_id = Some("1220012300".to_string());
		gate.link_road_name = Some("Olympic-daero".to_string());
		gate.link_distance = Some(0.042);
		// Same name, different spot: must not inherit anything
		let mut moved = CameraRecord::new("hw", 127.5, 37.0);
		moved.link_id = Some("1110000000".to_string());
		let previous = Catalog::new(vec![gate, moved]);

		let area = BoundingArea::new(124.0, 132.0, 33.0, 43.0).unwrap();
		let mut fresh = download_catalog(&TwoRoads, &area, 1).await.unwrap();
		assert_eq!(fresh.carry_links_from(&previous), 1);

		let nat1 = fresh.find_by_name("nat1").unwrap();
		assert_eq!(nat1.link_id.as_deref(), Some("1220012300"));
		assert_eq!(nat1.link_road_name.as_deref(), Some("Olympic-daero"));
		assert_eq!(nat1.link_distance, Some(0.042));
		assert_eq!(nat1.road_type, Some(RoadType::NationalRoad));
		assert!(fresh.find_by_name("hw").unwrap().link_id.is_none());
		assert!(fresh.find_by_name("nat2").unwrap().link_id.is_none());
	}

	#[rocket::async_test]
	async fn download_tags_road_types() {
		let area = BoundingArea::new(124.0, 132.0, 33.0, 43.0).unwrap();
		let catalog = download_catalog(&TwoRoads, &area, 1).await.unwrap();
		assert_eq!(catalog.len(), 3);
		assert_eq!(catalog.find_by_name("hw").unwrap().road_type, Some(RoadType::Highway));
		assert_eq!(catalog.find_by_name("nat2").unwrap().road_type, Some(RoadType::NationalRoad));
	}
}
