use eframe::egui::ColorImage;
use tracing::debug;

/// Downloads and decodes a video thumbnail for display.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    if url.is_empty() {
        return None;
    }
    // Perform a blocking HTTP GET request, returning None on any error
    let resp = match reqwest::blocking::get(url).and_then(|r| r.error_for_status()) {
        Ok(resp) => resp.bytes().ok()?,
        Err(e) => {
            debug!("thumbnail fetch failed for {}: {}", url, e);
            return None;
        }
    };
    // Load image data into an image::DynamicImage and convert to RGBA8
    let img = image::load_from_memory(&resp).ok()?.to_rgba8();
    // Determine the image dimensions for egui
    let size = [img.width() as usize, img.height() as usize];
    // Create a ColorImage from the raw RGBA bytes without premultiplying alpha
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
