//! Live traffic for the road link a camera is mapped to, one-shot or on a repeating poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::common::{BoundingArea, CameraRecord, TrafficRecord};
use crate::its_client::AreaSource;
use crate::link_matcher;
use crate::speed::SpeedTier;



#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct TrafficSettings {
	/// Half-width in degrees of the box queried around a camera.
	pub search_radius: f64,
	pub min_prefix_len: usize,
	pub refresh_interval: Duration,
}

impl Default for TrafficSettings {
	fn default() -> TrafficSettings {
		TrafficSettings {
			search_radius: 0.01,
			min_prefix_len: link_matcher::DEFAULT_MIN_PREFIX_LEN,
			refresh_interval: Duration::from_secs(60),
		}
	}
}

/// A matched traffic record together with its display classification.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct TrafficReport {
	#[serde(flatten)]
	pub record: TrafficRecord,
	#[serde(rename = "speedKmh")]
	pub speed_kmh: Option<f64>,
	pub tier: SpeedTier,
	pub color: String,
	#[serde(rename = "exactMatch")]
	pub exact_match: bool,
}

impl TrafficReport {
	pub fn new(record: TrafficRecord, target_link: &str) -> TrafficReport {
		let tier = SpeedTier::classify_text(&record.speed);
		TrafficReport {
			speed_kmh: record.speed_kmh(),
			exact_match: record.link_id == target_link,
			color: tier.color().to_string(),
			tier,
			record,
		}
	}
}

/// Query the area around `(x, y)` and match `link_id` against it.
///
/// `Ok(None)` means the feed answered but nothing matched.
pub async fn poll_traffic(
	source: &dyn AreaSource,
	x: f64,
	y: f64,
	link_id: &str,
	settings: &TrafficSettings,
) -> anyhow::Result<Option<TrafficReport>> {
	let area = BoundingArea::around(x, y, settings.search_radius);
	let records = source.traffic(&area).await?;
	Ok(link_matcher::match_link(link_id, &records, settings.min_prefix_len)
		.map(|record| TrafficReport::new(record.clone(), link_id)))
}

/// Like [`poll_traffic`], but an unreachable feed is reported as "no traffic data".
pub async fn traffic_for_camera(
	source: &dyn AreaSource,
	x: f64,
	y: f64,
	link_id: &str,
	settings: &TrafficSettings,
) -> Option<TrafficReport> {
	match poll_traffic(source, x, y, link_id, settings).await {
		Ok(report) => report,
		Err(err) => {
			warn!("Traffic lookup for link {} failed; error was {:#}", link_id, err);
			None
		}
	}
}



/// Repeating traffic poll for one camera.
///
/// Dropping the watch aborts the task, including a poll that is still in flight, so
/// nothing is published after the viewer goes away.
pub struct TrafficWatch {
	camera: String,
	latest: watch::Receiver<Option<TrafficReport>>,
	task: JoinHandle<()>,
}

impl TrafficWatch {
	/// Must be called from within a tokio runtime.
	pub fn start(source: Arc<dyn AreaSource>, camera: &CameraRecord, link_id: &str, settings: TrafficSettings) -> TrafficWatch {
		let (tx, rx) = watch::channel(None);
		let name = camera.cctvname.clone();
		let (x, y) = (camera.coordx, camera.coordy);
		let link_id = link_id.to_string();

		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(settings.refresh_interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				ticker.tick().await;
				// A poll may not outlive its slot, so a hung request never delays the next one.
				let outcome = tokio::time::timeout(
					settings.refresh_interval,
					poll_traffic(source.as_ref(), x, y, &link_id, &settings),
				).await;
				let outcome = match outcome {
					Ok(result) => result,
					Err(_) => Err(anyhow::anyhow!("poll timed out")),
				};
				if !publish(&tx, &link_id, outcome) {
					debug!("Traffic watch for link {} has no listeners; stopping", link_id);
					break;
				}
			}
		});

		info!("Watching traffic for {} every {:?}", name, settings.refresh_interval);
		TrafficWatch { camera: name, latest: rx, task }
	}

	pub fn camera(&self) -> &str {
		&self.camera
	}

	pub fn latest(&self) -> Option<TrafficReport> {
		self.latest.borrow().clone()
	}

	pub fn stop(self) {
		// Drop does the work
	}
}

impl Drop for TrafficWatch {
	fn drop(&mut self) {
		self.task.abort();
		debug!("Stopped traffic watch for {}", self.camera);
	}
}

// Only a fresh match replaces the published report; a failed or empty poll keeps it.
// Returns false once every receiver is gone.
fn publish(tx: &watch::Sender<Option<TrafficReport>>, link_id: &str, outcome: anyhow::Result<Option<TrafficReport>>) -> bool {
	match outcome {
		Ok(Some(report)) => tx.send(Some(report)).is_ok(),
		Ok(None) => {
			debug!("No traffic data for link {}; keeping last report", link_id);
			!tx.is_closed()
		},
		Err(err) => {
			warn!("Traffic poll for link {} failed; keeping last report; error was {:#}", link_id, err);
			!tx.is_closed()
		}
	}
}

/// Active traffic watches keyed by camera name.
pub struct WatchRegistry {
	watches: RwLock<HashMap<String, TrafficWatch>>,
}

impl WatchRegistry {
	pub fn new() -> WatchRegistry {
		WatchRegistry { watches: RwLock::new(HashMap::new()) }
	}

	/// Replaces any watch already running for the same camera.
	pub async fn start(&self, source: Arc<dyn AreaSource>, camera: &CameraRecord, link_id: &str, settings: TrafficSettings) {
		let watch = TrafficWatch::start(source, camera, link_id, settings);
		let mut watches = self.watches.write().await;
		watches.insert(camera.cctvname.clone(), watch);
	}

	/// `None` when no watch exists; `Some(None)` when one exists but has nothing to show yet.
	pub async fn latest(&self, camera: &str) -> Option<Option<TrafficReport>> {
		let watches = self.watches.read().await;
		watches.get(camera).map(|watch| watch.latest())
	}

	pub async fn stop(&self, camera: &str) -> bool {
		let mut watches = self.watches.write().await;
		watches.remove(camera).map(TrafficWatch::stop).is_some()
	}

	pub async fn len(&self) -> usize {
		self.watches.read().await.len()
	}
}

impl Default for WatchRegistry {
	fn default() -> WatchRegistry {
		WatchRegistry::new()
	}
}
