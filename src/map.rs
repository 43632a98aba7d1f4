//! Marker lifecycle against an abstract map widget.

use log::debug;

use crate::catalog::Catalog;
use crate::common::{BoundingArea, CameraRecord};



/// What the viewer needs from whatever map SDK draws the tiles.
pub trait MapHandle {
	fn bounds(&self) -> BoundingArea;
	fn set_center(&mut self, x: f64, y: f64);
	fn add_marker(&mut self, key: &str, x: f64, y: f64);
	fn remove_marker(&mut self, key: &str);
}

/// Camera markers currently drawn on a map.
#[derive(Debug, Default)]
pub struct MarkerLayer {
	keys: Vec<String>,
}

impl MarkerLayer {
	pub fn new() -> MarkerLayer {
		MarkerLayer::default()
	}

	pub fn keys(&self) -> &[String] {
		&self.keys
	}

	pub fn clear(&mut self, map: &mut dyn MapHandle) {
		for key in self.keys.drain(..) {
			map.remove_marker(&key);
		}
	}

	/// Replace every marker with one per catalog camera inside the visible bounds.
	pub fn redraw(&mut self, map: &mut dyn MapHandle, catalog: &Catalog) -> usize {
		self.clear(map);
		let visible = catalog.cameras_in(&map.bounds());
		for camera in &visible {
			let key = camera.key();
			map.add_marker(&key, camera.coordx, camera.coordy);
			self.keys.push(key);
		}
		debug!("Drew {} camera markers", self.keys.len());
		self.keys.len()
	}

	pub fn focus(&self, map: &mut dyn MapHandle, camera: &CameraRecord) {
		map.set_center(camera.coordx, camera.coordy);
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	struct FakeMap {
		bounds: BoundingArea,
		center: (f64, f64),
		markers: BTreeMap<String, (f64, f64)>,
		removed: usize,
	}

	impl FakeMap {
		fn new(bounds: BoundingArea) -> FakeMap {
			FakeMap { bounds, center: (0.0, 0.0), markers: BTreeMap::new(), removed: 0 }
		}
	}

	impl MapHandle for FakeMap {
		fn bounds(&self) -> BoundingArea { self.bounds }
		fn set_center(&mut self, x: f64, y: f64) { self.center = (x, y); }
		fn add_marker(&mut self, key: &str, x: f64, y: f64) {
			self.markers.insert(key.to_string(), (x, y));
		}
		fn remove_marker(&mut self, key: &str) {
			self.markers.remove(key);
			self.removed += 1;
		}
	}

	fn catalog() -> Catalog {
		Catalog::new(vec![
			CameraRecord::new("Seoul Station", 126.97, 37.55),
			CameraRecord::new("Seoul Station", 126.98, 37.55),
			CameraRecord::new("Daejeon", 127.38, 36.35),
		])
	}

	#[test]
	fn redraw_follows_bounds() {
		let mut map = FakeMap::new(BoundingArea::new(126.9, 127.0, 37.5, 37.6).unwrap());
		let mut layer = MarkerLayer::new();
		assert_eq!(layer.redraw(&mut map, &catalog()), 2);
		assert_eq!(map.markers.len(), 2);

		map.bounds = BoundingArea::new(127.3, 127.4, 36.3, 36.4).unwrap();
		assert_eq!(layer.redraw(&mut map, &catalog()), 1);
		assert_eq!(map.removed, 2);
		assert!(map.markers.contains_key("127.38-36.35-Daejeon"));
		assert_eq!(layer.keys(), ["127.38-36.35-Daejeon".to_string()]);
	}

	#[test]
	fn clear_removes_everything() {
		let mut map = FakeMap::new(BoundingArea::new(120.0, 130.0, 30.0, 40.0).unwrap());
		let mut layer = MarkerLayer::new();
		layer.redraw(&mut map, &catalog());
		layer.clear(&mut map);
		assert!(map.markers.is_empty());
		assert!(layer.keys().is_empty());
	}

	#[test]
	fn focus_centers_on_camera() {
		let mut map = FakeMap::new(BoundingArea::around(0.0, 0.0, 1.0));
		MarkerLayer::new().focus(&mut map, &CameraRecord::new("Daejeon", 127.38, 36.35));
		assert_eq!(map.center, (127.38, 36.35));
	}
}
