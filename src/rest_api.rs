use std::sync::Arc;

use tokio::sync::RwLock;

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::State;

use log::{error, info, warn};

use crate::catalog::Catalog;
use crate::common::{BoundingArea, CameraList, CameraRecord, RoadType, StreamRefresh};
use crate::config::Config;
use crate::favorites::Favorites;
use crate::its_client::{AreaSource, ItsClient};
use crate::nearest;
use crate::traffic::{self, TrafficReport, WatchRegistry};



type ApiError = status::Custom<Value>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Everything the routes share.
pub struct Services {
	pub config: Config,
	pub catalog: Catalog,
	pub favorites: Favorites,
	pub source: Arc<dyn AreaSource>,
	/// Raw upstream access for the pass-through routes.
	pub its: Arc<ItsClient>,
}

fn api_error(code: Status, reason: &str) -> ApiError {
	status::Custom(code, json!({
		"status": "error",
		"reason": reason,
	}))
}

#[derive(Debug, FromForm)]
struct BoundsQuery {
	#[field(name = "minX")]
	min_x: Option<f64>,
	#[field(name = "maxX")]
	max_x: Option<f64>,
	#[field(name = "minY")]
	min_y: Option<f64>,
	#[field(name = "maxY")]
	max_y: Option<f64>,
}

impl BoundsQuery {
	fn area(&self) -> Result<BoundingArea, ApiError> {
		match (self.min_x, self.max_x, self.min_y, self.max_y) {
			(Some(min_x), Some(max_x), Some(min_y), Some(max_y)) => BoundingArea::new(min_x, max_x, min_y, max_y)
				.map_err(|err| api_error(Status::BadRequest, &err.to_string())),
			_ => Err(api_error(Status::BadRequest, "Missing required parameters: minX, maxX, minY, maxY")),
		}
	}
}



#[get("/?<bounds..>")]
async fn list_cameras(bounds: BoundsQuery, catalog_state: &State<RwLock<Catalog>>) -> ApiResult<CameraList> {
	let area = bounds.area()?;
	let catalog = catalog_state.read().await;
	Ok(Json(catalog.cameras_in(&area)))
}

#[get("/search?<q>")]
async fn search_cameras(q: &str, catalog_state: &State<RwLock<Catalog>>, config: &State<Config>) -> Json<CameraList> {
	let catalog = catalog_state.read().await;
	Json(catalog.search_by_name(q, config.catalog.search_limit))
}

#[derive(Debug, FromForm)]
struct RefreshQuery {
	name: String,
	coordx: f64,
	coordy: f64,
	#[field(name = "roadType")]
	road_type: Option<String>,
}

#[get("/refresh?<query..>")]
async fn refresh_camera(
	query: RefreshQuery,
	catalog_state: &State<RwLock<Catalog>>,
	source: &State<Arc<dyn AreaSource>>,
	config: &State<Config>,
) -> ApiResult<StreamRefresh> {
	let mut camera = {
		let catalog = catalog_state.read().await;
		catalog.find_by_name(&query.name)
			.filter(|known| known.coordx == query.coordx && known.coordy == query.coordy)
			.cloned()
			.unwrap_or_else(|| CameraRecord::new(&query.name, query.coordx, query.coordy))
	};
	if let Some(road_type) = query.road_type.as_deref() {
		camera.road_type = Some(RoadType::from_param(road_type)
			.ok_or_else(|| api_error(Status::BadRequest, "roadType must be ex or its"))?);
	}

	match nearest::refresh_stream_url(source.inner().as_ref(), &camera, config.cctv.coord_tolerance, config.cctv_type()).await {
		Ok(refreshed) => Ok(Json(refreshed)),
		Err(err) => {
			warn!("Stream refresh for {} failed; error was {}", camera.cctvname, err);
			Err(api_error(Status::NotFound, "Camera not found at this location."))
		}
	}
}

#[post("/reload")]
async fn reload_catalog(catalog_state: &State<RwLock<Catalog>>, config: &State<Config>) -> ApiResult<Value> {
	let fresh = Catalog::load(&config.catalog.path).map_err(|err| {
		error!("Failed to reload catalog; error was {:#}", err);
		api_error(Status::InternalServerError, "Catalog could not be reloaded.")
	})?;
	let mut catalog = catalog_state.write().await;
	catalog.replace(fresh.all().to_vec());
	Ok(Json(json!({ "cameras": catalog.len() })))
}



#[derive(Debug, FromForm)]
struct TrafficQuery {
	coordx: f64,
	coordy: f64,
	#[field(name = "linkId")]
	link_id: String,
}

/// `null` when there is no traffic data for the link; that is not an error.
#[get("/?<query..>")]
async fn get_traffic(query: TrafficQuery, source: &State<Arc<dyn AreaSource>>, config: &State<Config>) -> Json<Option<TrafficReport>> {
	let settings = config.traffic_settings();
	Json(traffic::traffic_for_camera(source.inner().as_ref(), query.coordx, query.coordy, &query.link_id, &settings).await)
}

#[post("/watch", data = "<camera_json>")]
async fn start_watch(
	camera_json: Json<CameraRecord>,
	watches: &State<WatchRegistry>,
	source: &State<Arc<dyn AreaSource>>,
	config: &State<Config>,
) -> Result<status::Created<Json<Value>>, ApiError> {
	let camera = camera_json.into_inner();
	let link_id = match camera.link_id.as_deref() {
		Some(link_id) if !link_id.is_empty() => link_id.to_string(),
		_ => return Err(api_error(Status::BadRequest, "Camera has no linkId; there is no traffic data to watch.")),
	};
	watches.start(Arc::clone(source.inner()), &camera, &link_id, config.traffic_settings()).await;
	let location = format!("/v0/traffic/watch/{}", camera.cctvname);
	Ok(status::Created::new(location).body(Json(json!({
		"camera": camera.cctvname,
		"linkId": link_id,
		"intervalSecs": config.traffic_settings().refresh_interval.as_secs(),
	}))))
}

#[get("/watch/<name>")]
async fn get_watch(name: &str, watches: &State<WatchRegistry>) -> Option<Json<Option<TrafficReport>>> {
	watches.latest(name).await.map(Json)
}

#[delete("/watch/<name>")]
async fn stop_watch(name: &str, watches: &State<WatchRegistry>) -> Option<status::NoContent> {
	if watches.stop(name).await {
		info!("Traffic watch for {} cancelled", name);
		Some(status::NoContent)
	} else {
		None
	}
}



#[get("/")]
async fn list_favorites(favorites_state: &State<RwLock<Favorites>>) -> Json<CameraList> {
	let favorites = favorites_state.read().await;
	Json(favorites.list().to_vec())
}

#[post("/toggle", data = "<camera_json>")]
async fn toggle_favorite(camera_json: Json<CameraRecord>, favorites_state: &State<RwLock<Favorites>>) -> ApiResult<Value> {
	let mut favorites = favorites_state.write().await;
	let favorite = favorites.toggle(camera_json.into_inner()).await
		.map_err(|err| api_error(Status::Conflict, &err.to_string()))?;
	Ok(Json(json!({
		"favorite": favorite,
		"favorites": favorites.list(),
	})))
}

#[delete("/<name>")]
async fn remove_favorite(name: &str, favorites_state: &State<RwLock<Favorites>>) -> Option<status::NoContent> {
	let mut favorites = favorites_state.write().await;
	if favorites.remove(name).await {
		Some(status::NoContent)
	} else {
		None
	}
}



#[derive(Debug, FromForm)]
struct CctvProxyQuery {
	#[field(name = "minX")]
	min_x: Option<f64>,
	#[field(name = "maxX")]
	max_x: Option<f64>,
	#[field(name = "minY")]
	min_y: Option<f64>,
	#[field(name = "maxY")]
	max_y: Option<f64>,
	#[field(name = "type")]
	road_type: Option<String>,
	#[field(name = "cctvType")]
	cctv_type: Option<u8>,
}

impl CctvProxyQuery {
	fn area(&self) -> Result<BoundingArea, ApiError> {
		BoundsQuery {
			min_x: self.min_x,
			max_x: self.max_x,
			min_y: self.min_y,
			max_y: self.max_y,
		}.area()
	}
}

// The pass-through routes let a browser reach the ITS API without ever seeing the key.
#[get("/cctv?<query..>")]
async fn proxy_cctv(query: CctvProxyQuery, its: &State<Arc<ItsClient>>, config: &State<Config>) -> ApiResult<Value> {
	let area = query.area()?;
	if !its.has_api_key() {
		return Err(api_error(Status::InternalServerError, "API key not configured"));
	}
	let road_type = query.road_type.as_deref().unwrap_or("all");
	let cctv_type = query.cctv_type.unwrap_or_else(|| config.cctv_type());
	its.cctv_info_raw(&area, road_type, cctv_type).await
		.map(Json)
		.map_err(|err| {
			error!("CCTV proxy request failed; error was {:#}", err);
			api_error(Status::BadGateway, "Failed to fetch CCTV info")
		})
}

#[get("/traffic?<bounds..>")]
async fn proxy_traffic(bounds: BoundsQuery, its: &State<Arc<ItsClient>>) -> ApiResult<Value> {
	let area = bounds.area()?;
	if !its.has_api_key() {
		return Err(api_error(Status::InternalServerError, "API key not configured"));
	}
	its.traffic_info_raw(&area).await
		.map(Json)
		.map_err(|err| {
			error!("Traffic proxy request failed; error was {:#}", err);
			api_error(Status::BadGateway, "Failed to fetch traffic info")
		})
}



#[catch(404)]
fn not_found() -> Value {
	json!({
		"status": "error",
		"reason": "Resource was not found."
	})
}

#[catch(422)]
fn unprocessable() -> Value {
	json!({
		"status": "error",
		"reason": "Request parameters were missing or malformed."
	})
}



pub fn stage(services: Services) -> rocket::fairing::AdHoc {
	let Services { config, catalog, favorites, source, its } = services;

	// tokio::sync::RwLock so readers never block each other and a queued writer is not starved.
	let catalog_lock = RwLock::new(catalog);
	let favorites_lock = RwLock::new(favorites);

	rocket::fairing::AdHoc::on_ignite("JSON", |rocket| async move {
		rocket
			.manage(config)
			.manage(catalog_lock)
			.manage(favorites_lock)
			.manage(source)
			.manage(its)
			.manage(WatchRegistry::new())
			.register("/", catchers![not_found, unprocessable])
			.mount("/v0/cameras", routes![list_cameras, search_cameras, refresh_camera, reload_catalog])
			.mount("/v0/traffic", routes![get_traffic, start_watch, get_watch, stop_watch])
			.mount("/v0/favorites", routes![list_favorites, toggle_favorite, remove_favorite])
			.mount("/v0/proxy", routes![proxy_cctv, proxy_traffic])
	})
}
