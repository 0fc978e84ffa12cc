use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use std::path::Path;

const TRAIN_COLOR: Rgb<u8> = Rgb([33, 96, 196]);
const VAL_COLOR: Rgb<u8> = Rgb([214, 188, 23]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Per-epoch training curves, rendered to a two-panel PNG
/// (accuracy on the left, loss on the right).
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_loss: Vec<f32>,
    pub val_loss: Vec<f32>,
    pub train_acc: Vec<f32>,
    pub val_acc: Vec<f32>,
}

impl TrainingHistory {
    pub fn push(&mut self, train_loss: f32, train_acc: f32, val_loss: f32, val_acc: f32) {
        self.train_loss.push(train_loss);
        self.train_acc.push(train_acc);
        self.val_loss.push(val_loss);
        self.val_acc.push(val_acc);
    }

    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }

    pub fn plot(&self, path: &Path) -> Result<()> {
        const WIDTH: u32 = 1200;
        const HEIGHT: u32 = 500;
        const MARGIN: f32 = 50.0;

        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

        let panel_w = WIDTH as f32 / 2.0 - 2.0 * MARGIN;
        let panel_h = HEIGHT as f32 - 2.0 * MARGIN;

        // Accuracy panel, fixed [0,1] scale.
        let acc_origin = (MARGIN, MARGIN);
        draw_panel(&mut img, acc_origin, panel_w, panel_h);
        draw_series(&mut img, acc_origin, panel_w, panel_h, &self.train_acc, 1.0, TRAIN_COLOR);
        draw_series(&mut img, acc_origin, panel_w, panel_h, &self.val_acc, 1.0, VAL_COLOR);

        // Loss panel, scaled to the largest observed loss.
        let loss_max = self
            .train_loss
            .iter()
            .chain(self.val_loss.iter())
            .fold(1e-6f32, |m, &v| if v.is_finite() { m.max(v) } else { m });
        let loss_origin = (WIDTH as f32 / 2.0 + MARGIN, MARGIN);
        draw_panel(&mut img, loss_origin, panel_w, panel_h);
        draw_series(&mut img, loss_origin, panel_w, panel_h, &self.train_loss, loss_max, TRAIN_COLOR);
        draw_series(&mut img, loss_origin, panel_w, panel_h, &self.val_loss, loss_max, VAL_COLOR);

        img.save(path)?;
        Ok(())
    }
}

fn draw_panel(img: &mut RgbImage, origin: (f32, f32), w: f32, h: f32) {
    let (x, y) = origin;
    draw_line_segment_mut(img, (x, y + h), (x + w, y + h), AXIS_COLOR);
    draw_line_segment_mut(img, (x, y), (x, y + h), AXIS_COLOR);
}

fn draw_series(
    img: &mut RgbImage,
    origin: (f32, f32),
    w: f32,
    h: f32,
    values: &[f32],
    max: f32,
    color: Rgb<u8>,
) {
    if values.len() < 2 {
        return;
    }
    let (x0, y0) = origin;
    let step = w / (values.len() - 1) as f32;

    let point = |i: usize, v: f32| {
        let clamped = (v / max).clamp(0.0, 1.0);
        (x0 + i as f32 * step, y0 + h - clamped * h)
    };

    for i in 1..values.len() {
        draw_line_segment_mut(img, point(i - 1, values[i - 1]), point(i, values[i]), color);
    }
}
