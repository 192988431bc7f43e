//! Line-oriented front end of the field client: command parsing and the
//! text renderings of the report list and the map view.

use std::path::PathBuf;

use crate::capture::MediaKind;
use crate::reports::Marker;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Upload a file of the given kind.
    Submit { kind: MediaKind, path: PathBuf },
    /// Switch the map filter.
    Filter(MediaKind),
    /// Show the filtered markers.
    Map,
    /// Show every report.
    Reports,
    /// Export every report to a document.
    Export(PathBuf),
    Location,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  image <path>        upload an animal photo
  audio <path>        upload an audio recording
  filter image|audio  choose which sightings the map shows
  map                 list the sightings on the map
  reports             list all reports
  export <path>       export all reports as PDF (or HTML for .html)
  location            show the current location
  help                show this help
  quit                exit (reports are discarded)";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        let path_arg = |what: &str| -> Result<PathBuf, String> {
            if rest.is_empty() {
                Err(format!("usage: {what} <path>"))
            } else {
                Ok(PathBuf::from(rest))
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "image" | "photo" => Ok(Command::Submit {
                kind: MediaKind::Image,
                path: path_arg("image")?,
            }),
            "audio" => Ok(Command::Submit {
                kind: MediaKind::Audio,
                path: path_arg("audio")?,
            }),
            "filter" => rest.parse().map(Command::Filter),
            "map" => Ok(Command::Map),
            "reports" => Ok(Command::Reports),
            "export" => path_arg("export").map(Command::Export),
            "location" => Ok(Command::Location),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err(String::new()),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

/// Full report entry, as on the reports screen.
pub fn render_report_entry(marker: &Marker) -> String {
    let mut out = format!(
        "#{} {}\n  {}\n  {}\n",
        marker.id,
        marker.timestamp,
        marker.title(),
        marker.analysis
    );
    if let Some(uri) = &marker.uri {
        out.push_str(&format!("  Image: {}\n", uri));
    }
    out.push_str(&format!("  Location: {}", marker.coordinates().display()));
    out
}

/// One map pin with its callout.
pub fn render_map_pin(marker: &Marker) -> String {
    format!(
        "[{}] {} @ {} ({})\n  {}",
        marker.pin_color(),
        marker.pin_label(),
        marker.coordinates().display(),
        marker.timestamp,
        marker.analysis
    )
}
