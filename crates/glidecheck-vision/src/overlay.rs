use async_trait::async_trait;
use glidecheck_types::{
    config::VisionConfig,
    vision::{Detection, Frame},
    Result,
};
use image::{ImageBuffer, Rgba, RgbaImage};

use crate::{
    glyphs::{self, GLYPH_HEIGHT, GLYPH_WIDTH},
    vision_error, Annotator,
};

const PALETTE: [[u8; 4]; 6] = [
    [255, 64, 64, 255],
    [64, 200, 64, 255],
    [64, 128, 255, 255],
    [255, 200, 0, 255],
    [200, 64, 255, 255],
    [0, 220, 220, 255],
];

const TEXT_COLOUR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TAG_PADDING: u32 = 1;

/// Draws a coloured outline around every detection, tagged with its label and score.
#[derive(Debug, Clone)]
pub struct BoxOverlayAnnotator {
    thickness: u32,
    labels: bool,
}

impl BoxOverlayAnnotator {
    pub fn new(config: &VisionConfig) -> Self {
        let annotator = Self::with_thickness(config.overlay_thickness);
        if config.overlay_labels {
            annotator
        } else {
            annotator.without_labels()
        }
    }

    pub fn with_thickness(thickness: u32) -> Self {
        Self {
            thickness: thickness.max(1),
            labels: true,
        }
    }

    /// Outlines only.
    pub fn without_labels(mut self) -> Self {
        self.labels = false;
        self
    }

    pub fn label_text(detection: &Detection) -> String {
        format!("{} {:.2}", detection.label.trim(), detection.score)
    }

    /// Same label, same colour, across frames.
    pub fn colour_for(label: &str) -> Rgba<u8> {
        let hash = label
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        Rgba(PALETTE[hash % PALETTE.len()])
    }

    fn draw_outline(&self, img: &mut RgbaImage, rect: (u32, u32, u32, u32), colour: Rgba<u8>) {
        let (left, top, right, bottom) = rect;
        for inset in 0..self.thickness {
            let (l, t) = (left + inset, top + inset);
            let (Some(r), Some(b)) = (right.checked_sub(inset), bottom.checked_sub(inset)) else {
                break;
            };
            if l > r || t > b {
                break;
            }
            for x in l..=r {
                img.put_pixel(x, t, colour);
                img.put_pixel(x, b, colour);
            }
            for y in t..=b {
                img.put_pixel(l, y, colour);
                img.put_pixel(r, y, colour);
            }
        }
    }

    /// Filled tag in the box colour with dark text, above the box when it fits,
    /// otherwise inside its top edge. Clipped to the frame.
    fn draw_label(&self, img: &mut RgbaImage, left: u32, top: u32, text: &str, colour: Rgba<u8>) {
        let (width, height) = img.dimensions();
        let advance = GLYPH_WIDTH + TAG_PADDING;
        let tag_h = GLYPH_HEIGHT + 2 * TAG_PADDING;
        let tag_w = text.chars().count() as u32 * advance + TAG_PADDING;
        let y0 = top.checked_sub(tag_h).unwrap_or(top);

        for y in y0..(y0 + tag_h).min(height) {
            for x in left..(left + tag_w).min(width) {
                img.put_pixel(x, y, colour);
            }
        }

        for (i, c) in text.chars().enumerate() {
            let gx = left + TAG_PADDING + i as u32 * advance;
            for (row, bits) in glyphs::glyph(c).iter().enumerate() {
                let y = y0 + TAG_PADDING + row as u32;
                for col in 0..GLYPH_WIDTH {
                    let x = gx + col;
                    if glyphs::is_set(*bits, col) && x < width && y < height {
                        img.put_pixel(x, y, TEXT_COLOUR);
                    }
                }
            }
        }
    }
}

impl Default for BoxOverlayAnnotator {
    fn default() -> Self {
        Self::with_thickness(3)
    }
}

#[async_trait]
impl Annotator for BoxOverlayAnnotator {
    async fn annotate(&self, frame: &Frame, detections: &[Detection]) -> Result<Frame> {
        let mut img: RgbaImage =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(
                || {
                    vision_error(format!(
                        "cannot annotate malformed {}x{} frame ({} bytes)",
                        frame.width,
                        frame.height,
                        frame.data.len()
                    ))
                },
            )?;

        for detection in detections {
            let Some(rect) = detection.bbox.to_pixels(frame.width, frame.height) else {
                continue;
            };
            let colour = Self::colour_for(&detection.label);
            self.draw_outline(&mut img, rect, colour);
            if self.labels {
                self.draw_label(&mut img, rect.0, rect.1, &Self::label_text(detection), colour);
            }
        }

        Ok(Frame {
            width: frame.width,
            height: frame.height,
            data: img.into_raw(),
            timestamp: frame.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glidecheck_types::vision::BoundingBox;

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * frame.width + x) * 4) as usize;
        frame.data[idx..idx + 4].try_into().expect("pixel")
    }

    #[tokio::test]
    async fn outline_colours_border_and_keeps_interior() {
        let frame = Frame::from_rgba(10, 10, vec![0; 400]).with_timestamp(2.0);
        let detection = Detection {
            label: "helmet".into(),
            bbox: BoundingBox::new(0.2, 0.2, 0.8, 0.8),
            score: 0.9,
        };
        let annotator = BoxOverlayAnnotator::with_thickness(1).without_labels();
        let out = annotator.annotate(&frame, &[detection]).await.expect("annotate");

        assert_eq!((out.width, out.height), (10, 10));
        assert_eq!(out.timestamp, 2.0);
        let colour = BoxOverlayAnnotator::colour_for("helmet").0;
        assert_eq!(pixel(&out, 2, 2), colour);
        assert_eq!(pixel(&out, 8, 5), colour);
        assert_eq!(pixel(&out, 5, 5), [0, 0, 0, 0]);
        assert_eq!(pixel(&out, 0, 0), [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn label_tag_sits_above_the_box() {
        let frame = Frame::from_rgba(80, 40, vec![0; 80 * 40 * 4]);
        let detection = Detection {
            label: "gloves".into(),
            bbox: BoundingBox::new(0.1, 0.5, 0.9, 0.9),
            score: 0.9,
        };
        assert_eq!(BoxOverlayAnnotator::label_text(&detection), "gloves 0.90");

        let out = BoxOverlayAnnotator::with_thickness(1)
            .annotate(&frame, &[detection])
            .await
            .expect("annotate");

        assert_eq!((out.width, out.height), (80, 40));
        let colour = BoxOverlayAnnotator::colour_for("gloves").0;
        // box spans x 8..=72, y 20..=36; the tag occupies rows 11..20
        assert_eq!(pixel(&out, 8, 20), colour);
        assert_eq!(pixel(&out, 8, 11), colour);
        assert_eq!(pixel(&out, 9, 12), colour);
        // top row of 'G' lights columns 1..=3
        assert_eq!(pixel(&out, 10, 12), [0, 0, 0, 255]);
        assert_eq!(pixel(&out, 8, 10), [0, 0, 0, 0]);
        assert_eq!(pixel(&out, 40, 28), [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn label_moves_inside_when_box_touches_top() {
        let frame = Frame::from_rgba(40, 20, vec![0; 40 * 20 * 4]);
        let detection = Detection {
            label: "helmet".into(),
            bbox: BoundingBox::new(0.0, 0.0, 0.5, 0.9),
            score: 0.5,
        };
        let out = BoxOverlayAnnotator::with_thickness(1)
            .annotate(&frame, &[detection])
            .await
            .expect("annotate");

        assert_eq!((out.width, out.height), (40, 20));
        // top row of 'H' lights columns 0 and 4
        assert_eq!(pixel(&out, 1, 1), [0, 0, 0, 255]);
        assert_eq!(pixel(&out, 5, 1), [0, 0, 0, 255]);
        assert_eq!(pixel(&out, 2, 1), BoxOverlayAnnotator::colour_for("helmet").0);
        assert_eq!(pixel(&out, 39, 19), [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn no_detections_leaves_pixels_unchanged() {
        let frame = Frame::from_rgba(3, 3, (0..36).collect());
        let out = BoxOverlayAnnotator::default()
            .annotate(&frame, &[])
            .await
            .expect("annotate");
        assert_eq!(out, frame);
    }

    #[tokio::test]
    async fn malformed_frame_is_an_error() {
        let frame = Frame::from_rgba(3, 3, vec![0; 5]);
        assert!(BoxOverlayAnnotator::default()
            .annotate(&frame, &[])
            .await
            .is_err());
    }

    #[test]
    fn colour_is_stable_per_label() {
        assert_eq!(
            BoxOverlayAnnotator::colour_for("Helmet"),
            BoxOverlayAnnotator::colour_for("helmet")
        );
    }
}
