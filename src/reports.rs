// reports.rs: The session's sightings: an append-only, ordered store of
// markers, the per-kind filter view the map draws, and the report export.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use std::path::{Path, PathBuf};

use crate::capture::MediaKind;
use crate::location::Coordinates;

pub const NO_REPORTS_MESSAGE: &str = "No reports to export.";
pub const EXPORT_FAILED_MESSAGE: &str = "Error exporting report.";
pub const REPORT_TITLE: &str = "Wildlife Sightings Report";

/// A single recorded sighting. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: MediaKind,
    pub analysis: String,
    /// Original media reference; images only.
    pub uri: Option<String>,
    pub timestamp: String,
}

impl Marker {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            MediaKind::Image => "Image Report",
            MediaKind::Audio => "Audio Report",
        }
    }

    /// Callout heading on the map.
    pub fn pin_label(&self) -> &'static str {
        match self.kind {
            MediaKind::Image => "Animal Image",
            MediaKind::Audio => "Audio Recording",
        }
    }

    pub fn pin_color(&self) -> &'static str {
        match self.kind {
            MediaKind::Image => "red",
            MediaKind::Audio => "blue",
        }
    }
}

/// Fields of a marker known before it is stamped with an id and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMarker {
    pub coordinates: Coordinates,
    pub kind: MediaKind,
    pub analysis: String,
    pub uri: Option<String>,
}

/// Ordered, append-only marker collection.
///
/// Ids come from a counter owned by the store, never from its length.
#[derive(Debug)]
pub struct ReportStore {
    markers: Vec<Marker>,
    next_id: u64,
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore {
    pub fn new() -> Self {
        Self {
            markers: Vec::new(),
            next_id: 1,
        }
    }

    /// Stamp and append a marker; returns the stored copy.
    pub fn append(&mut self, new: NewMarker, timestamp: String) -> &Marker {
        let id = self.next_id;
        self.next_id += 1;
        self.markers.push(Marker {
            id,
            latitude: new.coordinates.latitude,
            longitude: new.coordinates.longitude,
            kind: new.kind,
            analysis: new.analysis,
            uri: new.uri,
            timestamp,
        });
        log::debug!("Marker {} appended ({} total)", id, self.markers.len());
        &self.markers[self.markers.len() - 1]
    }

    /// Markers of `kind`, in insertion order.
    pub fn filter(&self, kind: MediaKind) -> Vec<&Marker> {
        self.markers.iter().filter(|m| m.kind == kind).collect()
    }

    pub fn snapshot(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Local time formatted for display on a marker.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ── Export ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{}", NO_REPORTS_MESSAGE)]
    NoReports,
    #[error("{msg} {0}", msg = EXPORT_FAILED_MESSAGE)]
    Failed(#[from] std::io::Error),
    #[error("{msg} {0}", msg = EXPORT_FAILED_MESSAGE)]
    Render(String),
}

/// Where the rendered report goes (printer, share sheet, file).
pub trait DocumentSink {
    fn publish(&self, markers: &[Marker]) -> Result<PathBuf, ExportError>;
}

fn write_document(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Writes the report as a PDF file.
pub struct PdfFileSink {
    path: PathBuf,
}

impl PdfFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSink for PdfFileSink {
    fn publish(&self, markers: &[Marker]) -> Result<PathBuf, ExportError> {
        let bytes = render_pdf(markers).map_err(|e| ExportError::Render(e.to_string()))?;
        write_document(&self.path, &bytes)?;
        Ok(self.path.clone())
    }
}

/// Writes the HTML template, for printing from a browser.
pub struct HtmlFileSink {
    path: PathBuf,
}

impl HtmlFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSink for HtmlFileSink {
    fn publish(&self, markers: &[Marker]) -> Result<PathBuf, ExportError> {
        write_document(&self.path, render_report(markers).as_bytes())?;
        Ok(self.path.clone())
    }
}

/// PDF unless the path ends in `.html` or `.htm`.
pub fn sink_for_path(path: impl AsRef<Path>) -> Box<dyn DocumentSink> {
    let path = path.as_ref();
    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
    if is_html {
        Box::new(HtmlFileSink::new(path))
    } else {
        Box::new(PdfFileSink::new(path))
    }
}

/// Hand every marker (not the filtered view) to `sink`.
pub fn export_snapshot(markers: &[Marker], sink: &dyn DocumentSink) -> Result<PathBuf, ExportError> {
    if markers.is_empty() {
        return Err(ExportError::NoReports);
    }
    let path = sink.publish(markers).map_err(|e| {
        log::error!("Failed to export report: {}", e);
        e
    })?;
    log::info!("Exported {} reports to {}", markers.len(), path.display());
    Ok(path)
}

/// The "Wildlife Sightings Report" document.
pub fn render_report(markers: &[Marker]) -> String {
    let mut html = String::from(
        "<html>\n<head>\n<style>\n\
         body { font-family: Arial; padding: 20px; }\n\
         .report { border-bottom: 1px solid #ccc; margin-bottom: 20px; padding-bottom: 10px; }\n\
         .title { font-weight: bold; font-size: 18px; }\n\
         .text { margin: 4px 0; }\n\
         </style>\n</head>\n<body>\n<h1>",
    );
    html.push_str(REPORT_TITLE);
    html.push_str("</h1>\n");
    for marker in markers {
        html.push_str(&format!(
            "<div class=\"report\">\n\
             <div class=\"title\">{}</div>\n\
             <div class=\"text\">🕒 {}</div>\n\
             <div class=\"text\">📍 {}</div>\n\
             <div class=\"text\">{}</div>\n\
             </div>\n",
            marker.title(),
            escape_html(&marker.timestamp),
            marker.coordinates().display(),
            escape_html(&marker.analysis),
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── PDF ─────────────────────────────────────────────────────────────────

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_MM: f32 = 6.0;
/// Characters of 11pt Helvetica that fit between the margins.
const WRAP_COLUMNS: usize = 90;

/// The report as an A4 PDF set in the built-in Helvetica faces.
pub fn render_pdf(markers: &[Marker]) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        REPORT_TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Report",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    layer.use_text(REPORT_TITLE, 20.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= 2.0 * LINE_MM;

    for marker in markers {
        let mut lines: Vec<(String, f32, &IndirectFontRef)> = vec![
            (marker.title().to_string(), 14.0, &bold),
            (format!("Time: {}", marker.timestamp), 11.0, &regular),
            (
                format!("Location: {}", marker.coordinates().display()),
                11.0,
                &regular,
            ),
        ];
        lines.extend(
            wrap_text(&marker.analysis, WRAP_COLUMNS)
                .into_iter()
                .map(|line| (line, 11.0, &regular)),
        );

        for (text, size, font) in lines {
            if y < MARGIN_MM {
                let (page, page_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Report");
                layer = doc.get_page(page).get_layer(page_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            layer.use_text(text, size, Mm(MARGIN_MM), Mm(y), font);
            y -= LINE_MM;
        }
        y -= LINE_MM;
    }

    doc.save_to_bytes()
}

/// Greedy word wrap; explicit line breaks are kept.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > columns {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}
