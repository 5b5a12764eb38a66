use eframe::egui::ColorImage;
use tracing::debug;

/// Downloads and decodes the video's thumbnail; `None` on any failure.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    // Blocking GET; callers run this on the blocking pool
    let resp = match reqwest::blocking::get(url).and_then(|r| r.error_for_status()) {
        Ok(resp) => resp.bytes().ok()?,
        Err(e) => {
            debug!(url, error = %e, "thumbnail fetch failed");
            return None;
        }
    };
    decode(&resp)
}

/// Decodes image bytes and scales them down for the result list.
fn decode(bytes: &[u8]) -> Option<ColorImage> {
    let img = image::load_from_memory(bytes).ok()?.thumbnail(320, 320).to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
