use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use rocket::{Request, Response};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Method, Status};

use cctv_viewer_svc::catalog::{self, Catalog};
use cctv_viewer_svc::common::BoundingArea;
use cctv_viewer_svc::config::ConfigManager;
use cctv_viewer_svc::favorites::{Favorites, JsonFileStore};
use cctv_viewer_svc::its_client::ItsClient;
use cctv_viewer_svc::rest_api;



// Since the map UI is served by another server, it needs CORS to call this one.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, DELETE, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
		response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));

		// Preflight requests have no route of their own
		if request.method() == Method::Options && response.status() == Status::NotFound {
			response.set_status(Status::Ok);
			response.set_sized_body(0, std::io::Cursor::new(""));
		}
	}
}


fn cli() -> Command {
	Command::new("cctv-viewer-svc")
		.version("0.1.0")
		.about("Backend for the map-based CCTV viewer.")
		.arg(
			Arg::new("config")
				.action(ArgAction::Append)	// Allow argument to be specified multiple times
				.short('c')
				.long("config")
				.help("TOML file with viewer config")
		)
		.subcommand(
			Command::new("update-catalog")
				.about("Download every highway and national-road camera into the catalog snapshot")
				.arg(
					Arg::new("output")
						.short('o')
						.long("output")
						.help("Where to write the snapshot; defaults to catalog.path")
				)
				.arg(
					Arg::new("cctv-type")
						.short('t')
						.long("cctv-type")
						.value_parser(clap::value_parser!(u8).range(1..=5))
						.help("Stream type: 1 HLS/HTTP, 2 MP4/HTTP, 3 still, 4 HLS/HTTPS, 5 MP4/HTTPS; defaults from its.use_https")
				)
		)
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = cli().get_matches();

	let mut config_manager = ConfigManager::new();
	let config_filename_matches = matches.get_many::<String>("config");
	match config_filename_matches {
		Some(filenames) => {
			config_manager.read_config(filenames.map(|v| v.as_str()).collect())?;
		},
		None => {
			// Use default file path
			config_manager.read_default_config_files()?;
		}
	};
	let config = config_manager.get_config().clone();
	let its = Arc::new(ItsClient::new(&config.its)?);

	if let Some(update_matches) = matches.subcommand_matches("update-catalog") {
		let output = update_matches.get_one::<String>("output")
			.map(std::path::PathBuf::from)
			.unwrap_or_else(|| config.catalog.path.clone());
		let cctv_type = update_matches.get_one::<u8>("cctv-type")
			.copied()
			.unwrap_or_else(|| config.cctv_type());
		// The whole country
		let area = BoundingArea::new(124.0, 132.0, 33.0, 43.0)?;
		let mut downloaded = catalog::download_catalog(&*its, &area, cctv_type).await?;
		// Road links come from an offline mapping step, so keep the ones already on disk
		if output.exists() {
			let previous = Catalog::load(&output)?;
			downloaded.carry_links_from(&previous);
		}
		if let Some(parent) = output.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}
		let json = serde_json::to_vec_pretty(&downloaded.to_snapshot())?;
		std::fs::write(&output, json)
			.with_context(|| format!("Cannot write {}", output.display()))?;
		println!("Wrote {} cameras to {}", downloaded.len(), output.display());
		return anyhow::Ok(());
	}

	let favorites = Favorites::open(
		Box::new(JsonFileStore::new(config.favorites.path.clone())),
		config.favorites.capacity,
	).await;
	let services = rest_api::Services {
		catalog: Catalog::load_or_empty(&config.catalog.path),
		favorites,
		source: its.clone(),
		its,
		config,
	};

	let _rocket = rocket::build()
		.attach(rest_api::stage(services))
		.attach(CORS)
		.launch()
		.await?;

	anyhow::Ok(())
}
