//! Client for the national ITS open API (`cctvInfo` and `trafficInfo`).

use std::time::Duration;

use anyhow::{anyhow, Context};
use log::{debug, warn};
use rocket::serde::json::Value;
use url::Url;

use crate::common::{BoundingArea, CameraList, CameraRecord, RoadType, TrafficList};
use crate::config::ItsConfig;



/// HLS over plain HTTP.
pub const CCTV_TYPE_HLS_HTTP: u8 = 1;
/// HLS over HTTPS.
pub const CCTV_TYPE_HLS_HTTPS: u8 = 4;

/// Anything that can answer area queries for cameras and live traffic.
#[rocket::async_trait]
pub trait AreaSource: Send + Sync {
	async fn cameras(&self, area: &BoundingArea, road_type: RoadType, cctv_type: u8) -> anyhow::Result<CameraList>;
	async fn traffic(&self, area: &BoundingArea) -> anyhow::Result<TrafficList>;
}

pub struct ItsClient {
	http: reqwest::Client,
	base_url: Url,
	api_key: String,
}

impl ItsClient {
	pub fn new(config: &ItsConfig) -> anyhow::Result<ItsClient> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.context("Cannot create HTTP client")?;
		let mut base_url = Url::parse(&config.base_url)
			.with_context(|| format!("Invalid ITS base url {}", config.base_url))?;
		// Url::join replaces the last segment unless the path ends in a slash
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}
		Ok(ItsClient {
			http,
			base_url,
			api_key: config.api_key.clone(),
		})
	}

	pub fn has_api_key(&self) -> bool {
		!self.api_key.is_empty()
	}

	/// Raw `cctvInfo` response, as passed through by the proxy route.
	pub async fn cctv_info_raw(&self, area: &BoundingArea, road_type: &str, cctv_type: u8) -> anyhow::Result<Value> {
		let url = self.endpoint_url("cctvInfo", area, &[
			("type", road_type.to_string()),
			("cctvType", cctv_type.to_string()),
		])?;
		self.get_json(url).await
	}

	/// Raw `trafficInfo` response, as passed through by the proxy route.
	pub async fn traffic_info_raw(&self, area: &BoundingArea) -> anyhow::Result<Value> {
		let url = self.endpoint_url("trafficInfo", area, &[("type", "all".to_string())])?;
		self.get_json(url).await
	}

	fn endpoint_url(&self, endpoint: &str, area: &BoundingArea, extra: &[(&str, String)]) -> anyhow::Result<Url> {
		let mut url = self.base_url.join(endpoint)?;
		{
			let mut query = url.query_pairs_mut();
			query.append_pair("apiKey", &self.api_key);
			for (key, value) in extra {
				query.append_pair(key, value);
			}
			for (key, value) in area.query_pairs() {
				query.append_pair(key, &value);
			}
			query.append_pair("getType", "json");
		}
		Ok(url)
	}

	async fn get_json(&self, url: Url) -> anyhow::Result<Value> {
		debug!("GET {}{}", url.origin().ascii_serialization(), url.path());
		let response = self.http.get(url).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(anyhow!("ITS API returned HTTP {}", status));
		}
		Ok(response.json().await?)
	}
}

#[rocket::async_trait]
impl AreaSource for ItsClient {
	async fn cameras(&self, area: &BoundingArea, road_type: RoadType, cctv_type: u8) -> anyhow::Result<CameraList> {
		let body = self.cctv_info_raw(area, road_type.as_param(), cctv_type).await?;
		parse_camera_envelope(&body)
	}

	async fn traffic(&self, area: &BoundingArea) -> anyhow::Result<TrafficList> {
		let body = self.traffic_info_raw(area).await?;
		parse_traffic_envelope(&body)
	}
}



/// Pull records out of `{ response: { data: ... } }`. `data` may be an array, a single
/// object when exactly one camera matched, or missing when none did.
///
/// Records that do not decode are logged and skipped; the rest of the batch survives.
pub fn parse_camera_envelope(body: &Value) -> anyhow::Result<CameraList> {
	match body.pointer("/response/data") {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(Value::Array(items)) => Ok(items.iter()
			.filter_map(camera_from_value)
			.collect()),
		Some(item @ Value::Object(_)) => Ok(camera_from_value(item).into_iter().collect()),
		Some(other) => Err(anyhow!("unexpected cctv data: {}", other)),
	}
}

/// Pull records out of `{ body: { items: [...] } }`.
pub fn parse_traffic_envelope(body: &Value) -> anyhow::Result<TrafficList> {
	match body.pointer("/body/items") {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(items) => Ok(serde_json::from_value(items.clone()).context("malformed traffic items")?),
	}
}

fn camera_from_value(item: &Value) -> Option<CameraRecord> {
	match serde_json::from_value(item.clone()) {
		Ok(camera) => Some(camera),
		Err(err) => {
			let name = item.get("cctvname").and_then(Value::as_str).unwrap_or("<unnamed>");
			warn!("Skipping malformed cctv record {}; error was {}", name, err);
			None
		}
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use rocket::serde::json::json;

	fn client(base: &str) -> ItsClient {
		let config = ItsConfig {
			api_key: "secret".to_string(),
			base_url: base.to_string(),
			use_https: false,
			timeout_secs: 5,
		};
		ItsClient::new(&config).unwrap()
	}

	#[test]
	fn endpoint_url_carries_all_params() {
		let its = client("https://openapi.its.go.kr:9443");
		let area = BoundingArea::new(126.5, 127.5, 37.0, 38.0).unwrap();
		let url = its.endpoint_url("cctvInfo", &area, &[("type", "ex".to_string())]).unwrap();
		assert_eq!(url.path(), "/cctvInfo");
		let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
		assert_eq!(pairs[0], ("apiKey".to_string(), "secret".to_string()));
		assert!(pairs.contains(&("type".to_string(), "ex".to_string())));
		assert!(pairs.contains(&("minX".to_string(), "126.5".to_string())));
		assert!(pairs.contains(&("maxY".to_string(), "38".to_string())));
		assert_eq!(pairs.last().unwrap(), &("getType".to_string(), "json".to_string()));
	}

	#[test]
	fn endpoint_url_keeps_base_path() {
		let its = client("http://localhost:8080/its");
		let area = BoundingArea::around(127.0, 37.0, 0.01);
		let url = its.endpoint_url("trafficInfo", &area, &[]).unwrap();
		assert_eq!(url.path(), "/its/trafficInfo");
	}

	#[test]
	fn camera_envelope_accepts_single_object() {
		let body = json!({"response": {"coordtype": 1, "data": {"cctvname": "a", "cctvurl": "u", "coordx": "127.0", "coordy": "37.0"}}});
		let cameras = parse_camera_envelope(&body).unwrap();
		assert_eq!(cameras.len(), 1);
		assert_eq!(cameras[0].coordx, 127.0);
	}

	#[test]
	fn camera_envelope_accepts_array_and_missing_data() {
		let body = json!({"response": {"data": [
			{"cctvname": "a", "coordx": 127.0, "coordy": 37.0},
			{"cctvname": "b", "coordx": 127.1, "coordy": 37.1}
		]}});
		assert_eq!(parse_camera_envelope(&body).unwrap().len(), 2);
		assert!(parse_camera_envelope(&json!({"response": {"coordtype": 1}})).unwrap().is_empty());
	}

	#[test]
	fn malformed_camera_does_not_sink_the_batch() {
		let body = json!({"response": {"data": [
			{"cctvname": "good", "cctvurl": "u1", "coordx": 127.0, "coordy": 37.0, "cctvtype": 1},
			{"cctvname": "text type", "cctvurl": "u2", "coordx": "127.1", "coordy": "37.1", "cctvtype": "4"},
			{"cctvname": "broken", "coordx": "east", "coordy": 37.2},
			{"coordx": 127.3, "coordy": 37.3}
		]}});
		let cameras = parse_camera_envelope(&body).unwrap();
		let names: Vec<&str> = cameras.iter().map(|camera| camera.cctvname.as_str()).collect();
		assert_eq!(names, vec!["good", "text type"]);
		assert_eq!(cameras[0].cctvtype, Some(1));
		assert_eq!(cameras[1].cctvtype, Some(4));
	}

	#[test]
	fn malformed_single_camera_is_empty() {
		let body = json!({"response": {"data": {"cctvname": "broken", "coordx": "east", "coordy": 37.0}}});
		assert!(parse_camera_envelope(&body).unwrap().is_empty());
	}

	#[test]
	fn traffic_envelope_reads_items() {
		let body = json!({
			"header": {"resultCode": 0, "resultMsg": "success"},
			"body": {"totalCount": 1, "items": [
				{"roadName": "r", "linkId": "1100", "speed": "42", "travelTime": "9", "createdDate": "20240101", "startNodeId": "1", "endNodeId": "2"}
			]}
		});
		let items = parse_traffic_envelope(&body).unwrap();
		assert_eq!(items[0].link_id, "1100");
		assert!(parse_traffic_envelope(&json!({"body": {"totalCount": 0}})).unwrap().is_empty());
	}
}
