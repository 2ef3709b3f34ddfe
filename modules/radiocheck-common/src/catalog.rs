//! Catalog document: a markdown table whose rows carry a frequency, a station
//! name and a `[TAG](url)` stream link.
//!
//! Parsing keeps every original line so the rewrite can patch rows in place
//! and leave the rest of the document byte-for-byte untouched.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{RadioCheckError, Result};
use crate::types::{Station, StationUpdate};

/// Host fragment identifying the CDN redirect vendor.
pub const VENDOR_HOST: &str = "streamtheworld.com";

/// Header labels recognised when no explicit label is configured.
pub const DEFAULT_HEADER_LABELS: &[&str] = &["Frecuencia", "Frequency"];

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(https?://[^\s)]+)").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct Catalog {
    lines: Vec<String>,
    stations: Vec<Station>,
    trailing_newline: bool,
}

impl Catalog {
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Apply row updates and return the full document.
    pub fn render(&self, updates: &[StationUpdate]) -> String {
        let mut doc = render_lines(&self.lines, updates);
        if self.trailing_newline {
            doc.push('\n');
        }
        doc
    }
}

/// Parse the catalog with the default header labels.
pub fn parse_catalog(markdown: &str) -> Result<Catalog> {
    parse_catalog_with_header(markdown, DEFAULT_HEADER_LABELS)
}

/// Parse the catalog. Rows are skipped when they are separators, bold
/// section rows, header rows, or carry no URL. One station is produced per
/// URL in the first URL-bearing cell.
pub fn parse_catalog_with_header(markdown: &str, header_labels: &[&str]) -> Result<Catalog> {
    let lines: Vec<String> = markdown.lines().map(str::to_string).collect();
    let mut stations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') {
            continue;
        }
        if trimmed.contains("---") || trimmed.contains("**") {
            continue;
        }

        let columns: Vec<&str> = trimmed.trim_matches('|').split('|').map(str::trim).collect();
        if columns.len() < 3 {
            continue;
        }
        if header_labels
            .iter()
            .any(|label| columns[0].eq_ignore_ascii_case(label))
        {
            continue;
        }

        let Some(url_cell) = columns.iter().find(|c| URL_RE.is_match(c)) else {
            debug!(line = idx, "Catalog row without stream URL, skipping");
            continue;
        };

        for cap in URL_RE.captures_iter(url_cell) {
            stations.push(Station::new(columns[1], columns[0], &cap[1], idx));
        }
    }

    if stations.is_empty() {
        return Err(RadioCheckError::Catalog(
            "no station rows found in catalog document".to_string(),
        ));
    }

    Ok(Catalog {
        lines,
        stations,
        trailing_newline: markdown.ends_with('\n'),
    })
}

/// Format tag shown as the link text for a stream URL.
pub fn format_tag(url: &str) -> &'static str {
    let u = url.to_lowercase();
    if u.contains(".m3u8") {
        "M3U8"
    } else if u.contains(".m3u") {
        "M3U"
    } else if u.contains(".pls") {
        "PLS"
    } else if u.contains(".aac") || u.contains(VENDOR_HOST) {
        "AAC"
    } else if u.contains(".mp3") {
        "MP3"
    } else {
        "STREAM"
    }
}

pub fn is_vendor_url(url: &str) -> bool {
    url.to_lowercase().contains(VENDOR_HOST)
}

/// Add the vendor provenance marker (`*`) to a station name when its URL is
/// served by the CDN redirect vendor, strip it otherwise. The marker goes
/// before a parenthetical suffix: `Radio X (Rosario)` → `Radio X* (Rosario)`.
pub fn adjust_name_for_url(name: &str, url: &str) -> String {
    if url.is_empty() {
        return name.to_string();
    }

    let base = name
        .replace('*', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if !is_vendor_url(url) {
        return base;
    }

    match base.split_once('(') {
        Some((head, tail)) => format!("{}* ({tail}", head.trim()),
        None => format!("{base}*"),
    }
}

fn render_lines(lines: &[String], updates: &[StationUpdate]) -> String {
    let mut out = lines.to_vec();
    let mut touched = HashSet::new();

    for update in updates {
        let Some(line) = out.get(update.line) else {
            warn!(line = update.line, "Update points past the end of the catalog");
            continue;
        };

        let tag = format_tag(&update.new_url);
        let link_re = Regex::new(&format!(r"\[([^\]]+)\]\({}\)", regex::escape(&update.old_url)));
        let replaced = match link_re {
            Ok(re) if re.is_match(line) => re
                .replace(line, regex::NoExpand(&format!("[{tag}]({})", update.new_url)))
                .into_owned(),
            _ => line.replace(&update.old_url, &update.new_url),
        };

        let mut parts: Vec<String> = replaced.split('|').map(str::to_string).collect();
        if parts.len() >= 3 {
            parts[2] = format!(" {} ", update.name);
        }
        out[update.line] = parts.join("|");
        touched.insert(update.line);
    }

    debug!(rows = touched.len(), "Catalog rows rewritten");
    out.join("\n")
}
