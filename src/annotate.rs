//! Result image rendering: person boxes, in-zone centers, the zone outline and
//! the guest count.

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};

use crate::detect::Detection;
use crate::zone::{Zone, ZoneCountResult};

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

pub const PERSON_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const MEMBER_MARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const COUNT_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const LINE_THICKNESS: i32 = 2;
const MEMBER_MARK_RADIUS: i32 = 5;
/// Left edge and baseline of the count label.
const COUNT_ANCHOR: (i32, i32) = (20, 40);
const COUNT_TEXT_SCALE: f32 = 32.0;

/// Render the counting outcome onto a copy of `image`.
///
/// Every person detection gets a box whether or not it is a member; members
/// additionally get a filled disc at their center. Geometry outside the image
/// is clipped by the drawing primitives.
pub fn annotate(
    image: &RgbImage,
    detections: &[Detection],
    zone: &Zone,
    result: &ZoneCountResult,
) -> RgbImage {
    let mut canvas = image.clone();

    for detection in detections.iter().filter(|d| d.class.is_person()) {
        let (x1, y1, x2, y2) = detection.bbox.pixel_corners();
        draw_thick_rect(&mut canvas, x1, y1, x2, y2, PERSON_BOX_COLOR);
    }

    for mark in result.persons.iter().filter(|p| p.inside) {
        let (x, y) = mark.center;
        let center = (
            clamp_to_canvas(x, canvas.width(), MEMBER_MARK_RADIUS + 1),
            clamp_to_canvas(y, canvas.height(), MEMBER_MARK_RADIUS + 1),
        );
        draw_filled_circle_mut(&mut canvas, center, MEMBER_MARK_RADIUS, MEMBER_MARK_COLOR);
    }

    let z = zone.normalized();
    draw_thick_rect(&mut canvas, z.x1, z.y1, z.x2, z.y2, ZONE_COLOR);

    draw_count(&mut canvas, result.count);
    canvas
}

fn draw_thick_rect(canvas: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    // edges beyond the canvas stay beyond it after clamping
    let (w, h) = canvas.dimensions();
    let (x1, x2) = (clamp_to_canvas(x1, w, LINE_THICKNESS), clamp_to_canvas(x2, w, LINE_THICKNESS));
    let (y1, y2) = (clamp_to_canvas(y1, h, LINE_THICKNESS), clamp_to_canvas(y2, h, LINE_THICKNESS));
    for inset in 0..LINE_THICKNESS {
        let left = x1 + inset;
        let top = y1 + inset;
        let right = x2 - inset;
        let bottom = y2 - inset;
        if inset > 0 && (right <= left || bottom <= top) {
            break;
        }
        // imageproc rejects zero-sized rects; degenerate boxes become a single pixel.
        let width = (right - left).max(1) as u32;
        let height = (bottom - top).max(1) as u32;
        draw_hollow_rect_mut(canvas, Rect::at(left, top).of_size(width, height), color);
    }
}

/// Clamp a coordinate to `[-margin, extent + margin]`. A shape whose reach
/// is at most `margin` pixels draws identically before and after.
fn clamp_to_canvas(value: i32, extent: u32, margin: i32) -> i32 {
    let max = i32::try_from(extent).unwrap_or(i32::MAX - margin).min(i32::MAX - margin) + margin;
    value.clamp(-margin, max)
}

fn draw_count(canvas: &mut RgbImage, count: usize) {
    let font = match FontRef::try_from_slice(FONT_DATA) {
        Ok(font) => font,
        Err(err) => {
            log::error!("bundled font failed to load, count label skipped: {}", err);
            return;
        }
    };
    let scale = PxScale::from(COUNT_TEXT_SCALE);
    let ascent = font.as_scaled(scale).ascent();
    let top = COUNT_ANCHOR.1 - ascent.round() as i32;
    let label = format!("Guests: {count}");
    draw_text_mut(canvas, COUNT_TEXT_COLOR, COUNT_ANCHOR.0, top, scale, &font, &label);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ObjectClass};
    use crate::zone::count_in_zone;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, WHITE)
    }

    #[test]
    fn draws_boxes_marks_and_zone() {
        let image = blank(300, 300);
        let detections = vec![
            Detection::person(140.0, 140.0, 160.0, 160.0),
            Detection::person(250.0, 250.0, 270.0, 270.0),
        ];
        let zone = Zone::new(100, 100, 200, 200);
        let result = count_in_zone(&detections, &zone);

        let out = annotate(&image, &detections, &zone, &result);

        assert_eq!(out.dimensions(), image.dimensions());
        // person boxes, in and out of zone
        assert_eq!(*out.get_pixel(140, 150), PERSON_BOX_COLOR);
        assert_eq!(*out.get_pixel(250, 260), PERSON_BOX_COLOR);
        // member center disc
        assert_eq!(*out.get_pixel(150, 150), MEMBER_MARK_COLOR);
        // non-member center untouched
        assert_eq!(*out.get_pixel(260, 260), WHITE);
        // zone outline, two pixels thick
        assert_eq!(*out.get_pixel(100, 180), ZONE_COLOR);
        assert_eq!(*out.get_pixel(101, 180), ZONE_COLOR);
        assert_eq!(*out.get_pixel(102, 180), WHITE);
        // count label lands near the anchor
        let label_pixels = (20..200)
            .flat_map(|x| (5..50).map(move |y| (x, y)))
            .filter(|&(x, y)| out.get_pixel(x, y)[2] > 200 && out.get_pixel(x, y)[0] < 128)
            .count();
        assert!(label_pixels > 0);
    }

    #[test]
    fn input_image_is_not_mutated() {
        let image = blank(64, 64);
        let detections = vec![Detection::person(10.0, 10.0, 30.0, 30.0)];
        let zone = Zone::new(0, 0, 63, 63);
        let result = count_in_zone(&detections, &zone);

        let _ = annotate(&image, &detections, &zone, &result);
        assert!(image.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn non_person_detections_are_not_drawn() {
        let image = blank(100, 100);
        let detections = vec![Detection::new(
            ObjectClass::Other(16),
            0.9,
            BoundingBox::new(60.0, 60.0, 80.0, 80.0),
        )];
        let zone = Zone::new(0, 0, 10, 10);
        let result = count_in_zone(&detections, &zone);

        let out = annotate(&image, &detections, &zone, &result);
        assert_eq!(*out.get_pixel(60, 70), WHITE);
    }

    #[test]
    fn out_of_bounds_geometry_is_clipped() {
        let image = blank(50, 50);
        let detections = vec![
            Detection::person(-40.0, -40.0, 500.0, 500.0),
            Detection::person(45.0, 45.0, 45.0, 45.0),
        ];
        let zone = Zone::new(-100, 900, 900, -100);
        let result = count_in_zone(&detections, &zone);

        let out = annotate(&image, &detections, &zone, &result);
        assert_eq!(out.dimensions(), (50, 50));
    }

    #[test]
    fn extreme_zone_corners_are_clipped() {
        let image = blank(64, 64);
        let detections = vec![
            Detection::person(f32::MIN, 20.0, f32::MAX, 40.0),
            Detection::person(f32::MAX, f32::MAX, f32::MAX, f32::MAX),
        ];
        for zone in [
            Zone::new(-2_000_000_000, 0, 2_000_000_000, 10),
            Zone::new(i32::MIN, 0, i32::MAX, 10),
            Zone::new(i32::MAX, i32::MAX, i32::MIN, i32::MIN),
        ] {
            let result = count_in_zone(&detections, &zone);
            let out = annotate(&image, &detections, &zone, &result);
            assert_eq!(out.dimensions(), (64, 64));
        }

        // top edge of the wide zone is still drawn across the canvas
        let zone = Zone::new(i32::MIN, 0, i32::MAX, 10);
        let out = annotate(&image, &[], &zone, &count_in_zone(&[], &zone));
        assert_eq!(*out.get_pixel(10, 0), ZONE_COLOR);
        assert_eq!(*out.get_pixel(10, 9), ZONE_COLOR);
        assert_eq!(*out.get_pixel(0, 5), WHITE);
    }

    #[test]
    fn annotation_is_deterministic() {
        let image = blank(120, 120);
        let detections = vec![Detection::person(20.0, 60.0, 50.0, 110.0)];
        let zone = Zone::new(10, 10, 100, 100);
        let result = count_in_zone(&detections, &zone);

        let a = annotate(&image, &detections, &zone, &result);
        let b = annotate(&image, &detections, &zone, &result);
        assert_eq!(a, b);
    }
}
