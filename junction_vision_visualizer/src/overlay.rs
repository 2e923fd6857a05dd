// THEORY:
// The overlay turns a `JunctionSnapshot` into a picture an operator can read
// at a glance: one panel per direction with a marker for every live track and
// a lamp showing which side holds green. It is a rendering of published state,
// not of camera pixels, so it works the same with live and simulated feeds.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, ImageError, Rgb, RgbImage};
use junction_vision::pipeline::DirectionReport;
use junction_vision::{Direction, FeedStatus, JunctionSnapshot};

const PANEL_WIDTH: u32 = 400;
const PANEL_HEIGHT: u32 = 300;
const LAMP_SIZE: u32 = 24;
const MARKER_HALF: i32 = 12;

const ROAD: Rgb<u8> = Rgb([50, 50, 50]);
const BACKGROUND: Rgb<u8> = Rgb([18, 18, 18]);
const LANE_MARK: Rgb<u8> = Rgb([230, 230, 230]);
const GREEN: Rgb<u8> = Rgb([0, 220, 0]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);
const AMBER: Rgb<u8> = Rgb([240, 170, 0]);
const COASTING: Rgb<u8> = Rgb([120, 120, 120]);

/// Maps detector pixel space onto the overlay panels.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    source_width: u32,
    source_height: u32,
    jpeg_quality: u8,
}

impl OverlayRenderer {
    pub fn new(source_width: u32, source_height: u32) -> Self {
        Self {
            source_width: source_width.max(1),
            source_height: source_height.max(1),
            jpeg_quality: 80,
        }
    }

    /// Two side-by-side panels: direction A on the left, B on the right.
    pub fn render(&self, snapshot: &JunctionSnapshot) -> RgbImage {
        let mut img = RgbImage::from_pixel(PANEL_WIDTH * 2, PANEL_HEIGHT, BACKGROUND);
        for (index, direction) in [Direction::A, Direction::B].into_iter().enumerate() {
            let origin_x = index as u32 * PANEL_WIDTH;
            let is_green = snapshot.phase.green() == direction;
            self.draw_panel(&mut img, origin_x, snapshot.direction(direction), is_green);
        }
        img
    }

    pub fn render_jpeg(&self, snapshot: &JunctionSnapshot) -> Result<Vec<u8>, ImageError> {
        let img = self.render(snapshot);
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        encoder.write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }

    fn draw_panel(
        &self,
        img: &mut RgbImage,
        origin_x: u32,
        report: &DirectionReport,
        is_green: bool,
    ) {
        let road_top = PANEL_HEIGHT / 3;
        let road_bottom = 2 * PANEL_HEIGHT / 3;
        fill_rect(
            img,
            origin_x as i32,
            road_top as i32,
            PANEL_WIDTH,
            road_bottom - road_top,
            ROAD,
        );

        let mid = (PANEL_HEIGHT / 2) as i32;
        for x in (0..PANEL_WIDTH).step_by(40) {
            fill_rect(img, (origin_x + x) as i32, mid - 2, 20, 4, LANE_MARK);
        }

        for track in &report.tracks {
            let (cx, cy) = self.project(track.centroid);
            let color = if track.disappeared == 0 { GREEN } else { COASTING };
            stroke_rect(
                img,
                origin_x as i32 + cx - MARKER_HALF,
                cy - MARKER_HALF,
                (MARKER_HALF * 2) as u32,
                (MARKER_HALF * 2) as u32,
                color,
            );
        }

        let lamp = match (report.feed, is_green) {
            (FeedStatus::Degraded, _) => AMBER,
            (_, true) => GREEN,
            (_, false) => RED,
        };
        fill_rect(
            img,
            (origin_x + PANEL_WIDTH - LAMP_SIZE - 8) as i32,
            8,
            LAMP_SIZE,
            LAMP_SIZE,
            lamp,
        );
    }

    fn project(&self, (x, y): (i32, i32)) -> (i32, i32) {
        let px = i64::from(x) * i64::from(PANEL_WIDTH) / i64::from(self.source_width);
        let py = i64::from(y) * i64::from(PANEL_HEIGHT) / i64::from(self.source_height);
        (px as i32, py as i32)
    }
}

fn put_clipped(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    for dy in 0..h as i32 {
        for dx in 0..w as i32 {
            put_clipped(img, x + dx, y + dy, color);
        }
    }
}

fn stroke_rect(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    let (w, h) = (w as i32, h as i32);
    for t in 0..2 {
        for dx in 0..w {
            put_clipped(img, x + dx, y + t, color);
            put_clipped(img, x + dx, y + h - 1 - t, color);
        }
        for dy in 0..h {
            put_clipped(img, x + t, y + dy, color);
            put_clipped(img, x + w - 1 - t, y + dy, color);
        }
    }
}
