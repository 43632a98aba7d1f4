use log::{info, warn};
use thiserror::Error;

use crate::common::{BoundingArea, CameraRecord, RoadType, StreamRefresh};
use crate::its_client::AreaSource;



#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
	#[error("no camera found near ({x}, {y})")]
	NotFound { x: f64, y: f64 },
}

/// Pick the candidate closest to `(x, y)` on the plane.
///
/// Planar distance is fine here: candidates come from a sub-kilometre query box.
/// Ties keep the earliest candidate.
pub fn find_closest(candidates: &[CameraRecord], x: f64, y: f64) -> Result<StreamRefresh, LookupError> {
	let mut closest: Option<&CameraRecord> = None;
	let mut min_distance = f64::INFINITY;

	for candidate in candidates {
		let distance = (candidate.coordx - x).hypot(candidate.coordy - y);
		if closest.is_none() || distance < min_distance {
			min_distance = distance;
			closest = Some(candidate);
		}
	}

	closest
		.map(|camera| StreamRefresh {
			cctvurl: camera.cctvurl.clone(),
			cctvname: camera.cctvname.clone(),
			coordx: camera.coordx,
			coordy: camera.coordy,
		})
		.ok_or(LookupError::NotFound { x, y })
}

/// Road types to query for a camera, in order.
pub fn road_types_for(camera: &CameraRecord) -> Vec<RoadType> {
	match camera.road_type {
		Some(road_type) => vec![road_type],
		None => RoadType::FALLBACK_ORDER.to_vec(),
	}
}

/// Re-identify `camera` upstream to get a stream url that has not expired yet.
///
/// Each road type is tried in turn inside a box of half-width `tolerance`; the first
/// non-empty answer is resolved. Upstream failures count as an empty answer.
pub async fn refresh_stream_url(
	source: &dyn AreaSource,
	camera: &CameraRecord,
	tolerance: f64,
	cctv_type: u8,
) -> Result<StreamRefresh, LookupError> {
	let area = BoundingArea::around(camera.coordx, camera.coordy, tolerance);

	for road_type in road_types_for(camera) {
		let candidates = match source.cameras(&area, road_type, cctv_type).await {
			Ok(candidates) => candidates,
			Err(err) => {
				warn!("Camera query ({}) for {} failed; error was {:#}", road_type, camera.cctvname, err);
				continue;
			}
		};
		if candidates.is_empty() {
			continue;
		}
		let refreshed = find_closest(&candidates, camera.coordx, camera.coordy)?;
		info!("Refreshed stream url for {} via {} ({} candidates)", camera.cctvname, road_type, candidates.len());
		return Ok(refreshed);
	}

	Err(LookupError::NotFound { x: camera.coordx, y: camera.coordy })
}
