//! Field client: uploads photos and recordings to the relay,
//! speaks the assessment and keeps the session's sightings.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use wildwatch_lib::capture::pick_media;
use wildwatch_lib::client::UploadClient;
use wildwatch_lib::console::{render_map_pin, render_report_entry, Command, HELP};
use wildwatch_lib::location::{Coordinates, FixedLocation, LocationProvider, NoLocation};
use wildwatch_lib::reports::sink_for_path;
use wildwatch_lib::session::FieldSession;
use wildwatch_lib::settings::Settings;
use wildwatch_lib::speech::{CommandSpeaker, SilentSpeaker, Speaker};

#[derive(Parser, Debug)]
#[command(name = "wildwatch", version, about = "Wildlife Poaching Detection System field client")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, env = "WILDWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Relay base URL, e.g. http://192.168.1.20:3000
    #[arg(short, long)]
    backend: Option<String>,

    /// Device latitude in decimal degrees
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Device longitude in decimal degrees
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Do not read results aloud
    #[arg(long)]
    no_speech: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    wildwatch_lib::init_logging();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        settings.client.backend_url = backend;
    }
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        Coordinates::parse(&lat.to_string(), &lon.to_string())?;
        settings.client.latitude = Some(lat);
        settings.client.longitude = Some(lon);
    }

    let speaker: Arc<dyn Speaker> = if args.no_speech || settings.client.speech_command.is_empty() {
        Arc::new(SilentSpeaker)
    } else {
        Arc::new(CommandSpeaker::new(
            settings.client.speech_command.clone(),
            settings.client.speech_args.clone(),
        ))
    };

    let location: Box<dyn LocationProvider> = match settings.fixed_location() {
        Some(coords) => Box::new(FixedLocation::new(coords)),
        None => Box::new(NoLocation),
    };

    let client = UploadClient::new(&settings.client.backend_url)?;
    let session = FieldSession::start(client, speaker, location.as_ref(), settings.jpeg_options()).await;

    println!("Wildlife Poaching Detection System");
    println!("Helping Rangers Protect Nature");
    println!("{}", session.location_status());
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(c) => c,
            Err(e) if e.is_empty() => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Submit { kind, path } => {
                let media = match pick_media(&path, kind).await {
                    Ok(m) => m,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                println!("Analyzing...");
                let submission = session.submit(&media).await;
                println!("{}", submission.message);
                if let Some(marker) = submission.marker {
                    println!("Marker #{} placed at {}", marker.id, marker.coordinates().display());
                }
            }
            Command::Filter(kind) => {
                session.set_filter(kind).await;
                println!("Map shows {kind} sightings");
            }
            Command::Map => {
                let kind = session.active_filter().await;
                let pins = session.filtered().await;
                if pins.is_empty() {
                    println!("No {kind} sightings on the map.");
                }
                for marker in &pins {
                    println!("{}", render_map_pin(marker));
                }
            }
            Command::Reports => {
                let markers = session.snapshot().await;
                if markers.is_empty() {
                    println!("No reports yet.");
                }
                for marker in &markers {
                    println!("{}\n", render_report_entry(marker));
                }
            }
            Command::Export(path) => match session.export(sink_for_path(&path).as_ref()).await {
                Ok(written) => println!("Report written to {}", written.display()),
                Err(e) => println!("{e}"),
            },
            Command::Location => println!("{}", session.location_status()),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    log::info!("Session ended with {} reports", session.snapshot().await.len());
    Ok(())
}
