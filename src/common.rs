use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;



pub type CameraList = Vec<CameraRecord>;
pub type TrafficList = Vec<TrafficRecord>;

/// Upstream road classification used by the ITS `type` query parameter.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum RoadType {
	#[serde(rename = "ex")]
	Highway,
	#[serde(rename = "its")]
	NationalRoad,
}

impl RoadType {
	/// Order tried when a camera does not know its own road type.
	pub const FALLBACK_ORDER: [RoadType; 2] = [RoadType::NationalRoad, RoadType::Highway];

	pub fn as_param(&self) -> &'static str {
		match self {
			RoadType::Highway => "ex",
			RoadType::NationalRoad => "its",
		}
	}

	pub fn from_param(value: &str) -> Option<RoadType> {
		match value {
			"ex" => Some(RoadType::Highway),
			"its" => Some(RoadType::NationalRoad),
			_ => None,
		}
	}
}

impl fmt::Display for RoadType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_param())
	}
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct CameraRecord {
	pub cctvname: String,
	#[serde(default)]
	pub cctvurl: String,
	#[serde(deserialize_with = "coordinate")]
	pub coordx: f64,
	#[serde(deserialize_with = "coordinate")]
	pub coordy: f64,
	#[serde(default, deserialize_with = "cctv_type_code", skip_serializing_if = "Option::is_none")]
	pub cctvtype: Option<u8>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cctvformat: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cctvresolution: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub roadsectionid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub filecreatetime: Option<String>,
	#[serde(rename = "linkId", default, skip_serializing_if = "Option::is_none")]
	pub link_id: Option<String>,
	#[serde(rename = "linkRoadName", default, skip_serializing_if = "Option::is_none")]
	pub link_road_name: Option<String>,
	#[serde(rename = "linkDistance", default, skip_serializing_if = "Option::is_none")]
	pub link_distance: Option<f64>,
	#[serde(rename = "roadType", default, skip_serializing_if = "Option::is_none")]
	pub road_type: Option<RoadType>,
}

impl CameraRecord {
	pub fn new(name: &str, coordx: f64, coordy: f64) -> CameraRecord {
		CameraRecord {
			cctvname: name.to_string(),
			cctvurl: String::new(),
			coordx,
			coordy,
			cctvtype: None,
			cctvformat: None,
			cctvresolution: None,
			roadsectionid: None,
			filecreatetime: None,
			link_id: None,
			link_road_name: None,
			link_distance: None,
			road_type: None,
		}
	}

	/// Marker key; coordinates are included because two cameras may share a name.
	pub fn key(&self) -> String {
		format!("{}-{}-{}", self.coordx, self.coordy, self.cctvname)
	}
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct TrafficRecord {
	#[serde(rename = "linkId")]
	pub link_id: String,
	#[serde(rename = "roadName", default)]
	pub road_name: String,
	#[serde(default)]
	pub speed: String,
	#[serde(rename = "travelTime", default)]
	pub travel_time: String,
	#[serde(rename = "createdDate", default)]
	pub created_date: String,
	#[serde(rename = "startNodeId", default)]
	pub start_node_id: String,
	#[serde(rename = "endNodeId", default)]
	pub end_node_id: String,
}

impl TrafficRecord {
	/// Speed in km/h, if the upstream text parses.
	pub fn speed_kmh(&self) -> Option<f64> {
		self.speed.trim().parse().ok()
	}

	pub fn travel_time_secs(&self) -> Option<f64> {
		self.travel_time.trim().parse().ok()
	}
}

/// Freshly signed stream location for a camera.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct StreamRefresh {
	pub cctvurl: String,
	pub cctvname: String,
	pub coordx: f64,
	pub coordy: f64,
}

#[derive(Debug, Error, PartialEq)]
#[error("inverted bounds: min ({min}) is greater than max ({max})")]
pub struct BoundsError {
	pub min: f64,
	pub max: f64,
}

/// Longitude/latitude rectangle; containment is inclusive on every edge.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct BoundingArea {
	#[serde(rename = "minX")]
	min_x: f64,
	#[serde(rename = "maxX")]
	max_x: f64,
	#[serde(rename = "minY")]
	min_y: f64,
	#[serde(rename = "maxY")]
	max_y: f64,
}

impl BoundingArea {
	pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<BoundingArea, BoundsError> {
		if !(min_x <= max_x) {
			return Err(BoundsError { min: min_x, max: max_x });
		}
		if !(min_y <= max_y) {
			return Err(BoundsError { min: min_y, max: max_y });
		}
		Ok(BoundingArea { min_x, max_x, min_y, max_y })
	}

	/// Square of half-width `radius` centred on a point. A negative radius is treated as its magnitude.
	pub fn around(x: f64, y: f64, radius: f64) -> BoundingArea {
		let r = radius.abs();
		BoundingArea {
			min_x: x - r,
			max_x: x + r,
			min_y: y - r,
			max_y: y + r,
		}
	}

	pub fn min_x(&self) -> f64 { self.min_x }
	pub fn max_x(&self) -> f64 { self.max_x }
	pub fn min_y(&self) -> f64 { self.min_y }
	pub fn max_y(&self) -> f64 { self.max_y }

	pub fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
	}

	/// Query parameters in the shape the ITS API expects.
	pub fn query_pairs(&self) -> [(&'static str, String); 4] {
		[
			("minX", self.min_x.to_string()),
			("maxX", self.max_x.to_string()),
			("minY", self.min_y.to_string()),
			("maxY", self.max_y.to_string()),
		]
	}
}



// Upstream sends coordinates as JSON numbers in some feeds and as strings in others.
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(f64),
		Text(String),
	}

	match Raw::deserialize(deserializer)? {
		Raw::Number(value) => Ok(value),
		Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
	}
}

// Same story for the stream type code; blank text means the feed left it out.
fn cctv_type_code<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u8),
		Text(String),
	}

	match Option::<Raw>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Raw::Number(code)) => Ok(Some(code)),
		Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
		Some(Raw::Text(text)) => text.trim().parse().map(Some).map_err(serde::de::Error::custom),
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn camera_accepts_string_and_numeric_coordinates() {
		let json = r#"[
			{"cctvname": "a", "cctvurl": "http://x/a.m3u8", "coordx": 127.1, "coordy": "37.5"},
			{"cctvname": "b", "coordx": "126.9", "coordy": 37.4, "roadType": "ex", "linkId": "1100"}
		]"#;
		let cameras: CameraList = serde_json::from_str(json).unwrap();
		assert_eq!(cameras[0].coordy, 37.5);
		assert_eq!(cameras[1].coordx, 126.9);
		assert_eq!(cameras[1].road_type, Some(RoadType::Highway));
		assert_eq!(cameras[1].link_id.as_deref(), Some("1100"));
		assert_eq!(cameras[1].cctvurl, "");
	}

	#[test]
	fn camera_rejects_garbage_coordinates() {
		let json = r#"{"cctvname": "a", "coordx": "east", "coordy": 37.0}"#;
		assert!(serde_json::from_str::<CameraRecord>(json).is_err());
	}

	#[test]
	fn camera_type_code_accepts_number_or_text() {
		let json = r#"[
			{"cctvname": "a", "coordx": 127.0, "coordy": 37.0, "cctvtype": 4},
			{"cctvname": "b", "coordx": 127.0, "coordy": 37.0, "cctvtype": "1"},
			{"cctvname": "c", "coordx": 127.0, "coordy": 37.0, "cctvtype": ""},
			{"cctvname": "d", "coordx": 127.0, "coordy": 37.0, "cctvtype": null}
		]"#;
		let cameras: CameraList = serde_json::from_str(json).unwrap();
		let codes: Vec<Option<u8>> = cameras.iter().map(|camera| camera.cctvtype).collect();
		assert_eq!(codes, vec![Some(4), Some(1), None, None]);
	}

	#[test]
	fn camera_key_includes_coordinates() {
		let a = CameraRecord::new("gate", 127.0, 37.0);
		let b = CameraRecord::new("gate", 127.5, 37.0);
		assert_ne!(a.key(), b.key());
		assert_eq!(a.key(), "127-37-gate");
	}

	#[test]
	fn bounds_reject_inverted_axes() {
		assert!(BoundingArea::new(1.0, 0.0, 0.0, 1.0).is_err());
		assert!(BoundingArea::new(0.0, 1.0, 2.0, 1.0).is_err());
		assert!(BoundingArea::new(0.0, 0.0, 1.0, 1.0).is_ok());
	}

	#[test]
	fn bounds_contain_their_edges() {
		let area = BoundingArea::new(126.0, 127.0, 37.0, 38.0).unwrap();
		assert!(area.contains(126.0, 38.0));
		assert!(area.contains(126.5, 37.5));
		assert!(!area.contains(127.01, 37.5));
	}

	#[test]
	fn around_builds_square() {
		let area = BoundingArea::around(127.0, 37.0, 0.5);
		assert_eq!(area.min_x(), 126.5);
		assert_eq!(area.max_y(), 37.5);
	}

	#[test]
	fn traffic_speed_parses_wire_text() {
		let record: TrafficRecord = serde_json::from_str(
			r#"{"linkId": "1", "roadName": "r", "speed": " 57.5", "travelTime": "12"}"#
		).unwrap();
		assert_eq!(record.speed_kmh(), Some(57.5));
		assert_eq!(record.travel_time_secs(), Some(12.0));
	}
}
