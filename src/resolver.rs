//! Turns extractor metadata into the list of renditions offered to the user.
use std::{cmp::Reverse, collections::HashMap};

use humansize::{DECIMAL, format_size};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    downloader::{Extractor, RawFormat, RawInfo},
    error::ResolveError,
    model::{Analysis, MediaInfo, ResolutionKey, Site, StreamDescriptor},
    translate::{Translate, strip_leading_mentions},
};

static DIMENSIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[xX×]\s*(\d+)").expect("valid regex"));
static HEIGHT_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)[pP]").expect("valid regex"));

pub const UNKNOWN_SIZE: &str = "unknown size";

/// Probes `url` and builds the de-duplicated, sorted rendition list.
pub async fn analyze(
    extractor: &dyn Extractor,
    translator: Option<&dyn Translate>,
    url: &str,
) -> Result<Analysis, ResolveError> {
    let site = Site::detect(url);
    let info = extractor.probe(url).await?;
    let streams = resolve_streams(&info.formats, site.resolution_key());
    if streams.is_empty() {
        warn!(url, formats = info.formats.len(), "no playable mp4 video stream");
        return Err(ResolveError::NoPlayableStreams);
    }

    let mut media = media_info(url, site, info);
    if let (Some(translator), Some(description)) = (translator, media.description.as_deref()) {
        let cleaned = strip_leading_mentions(description);
        if !cleaned.is_empty() {
            let result = translator.translate(&cleaned).await;
            let translated = match result {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "translation failed, keeping original text");
                    cleaned
                }
            };
            media.translated_description = Some(translated);
        }
    }

    info!(title = %media.title, streams = streams.len(), "analysis finished");
    Ok(Analysis { media, streams })
}

fn media_info(url: &str, site: Site, info: RawInfo) -> MediaInfo {
    MediaInfo {
        url: url.to_string(),
        id: info.id.unwrap_or_default(),
        title: info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| site.default_title().to_string()),
        description: info.description.filter(|d| !d.trim().is_empty()),
        translated_description: None,
        thumbnail_url: info.thumbnail,
        site,
    }
}

/// Keeps MP4 video entries, one per resolution key (highest bitrate wins),
/// ordered from the largest resolution down.
pub fn resolve_streams(formats: &[RawFormat], key: ResolutionKey) -> Vec<StreamDescriptor> {
    let mut unique: Vec<StreamDescriptor> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in formats.iter().filter(|f| is_mp4_video(f)).map(descriptor) {
        let k = match key {
            ResolutionKey::Label => candidate.resolution.clone(),
            ResolutionKey::Height => candidate.height.to_string(),
        };
        match index.get(&k) {
            Some(&i) if candidate.bitrate > unique[i].bitrate => unique[i] = candidate,
            Some(_) => {}
            None => {
                index.insert(k, unique.len());
                unique.push(candidate);
            }
        }
    }

    // sort_by_key is stable, so equal ranks keep their input order
    unique.sort_by_key(|d| Reverse(resolution_rank(d)));
    unique
}

/// A missing vcodec still counts as video; only an explicit "none" is audio.
fn is_mp4_video(format: &RawFormat) -> bool {
    format.ext.as_deref() == Some("mp4") && format.vcodec.as_deref() != Some("none")
}

fn descriptor(format: &RawFormat) -> StreamDescriptor {
    let size_bytes = format.size_bytes();
    let width = format.width.unwrap_or(0);
    let height = format.height.unwrap_or(0);
    let resolution = format
        .resolution
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| match (format.width, format.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => "unknown".to_string(),
        });

    StreamDescriptor {
        id: format.format_id.clone(),
        resolution,
        width,
        height,
        size_bytes,
        size_label: size_label(size_bytes),
        bitrate: format.tbr.unwrap_or(0.0),
    }
}

pub fn size_label(bytes: u64) -> String {
    if bytes > 0 {
        format_size(bytes, DECIMAL)
    } else {
        UNKNOWN_SIZE.to_string()
    }
}

/// (height, width), taken from the numeric fields or parsed from the label.
fn resolution_rank(d: &StreamDescriptor) -> (u32, u32) {
    if d.height > 0 {
        return (d.height, d.width);
    }
    if let Some(caps) = DIMENSIONS.captures(&d.resolution) {
        let w = caps[1].parse().unwrap_or(0);
        let h = caps[2].parse().unwrap_or(0);
        return (h, w);
    }
    HEIGHT_LABEL
        .captures(&d.resolution)
        .and_then(|caps| caps[1].parse().ok())
        .map(|h| (h, 0))
        .unwrap_or((0, 0))
}
