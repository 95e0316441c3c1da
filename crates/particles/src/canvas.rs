//! Drawing target of the particle trails.

use foundation::{PixelBounds, Rgba};

pub trait ParticleCanvas {
    /// Multiplies the alpha of everything inside `area` by `alpha`, fading
    /// older trails.
    fn fade(&mut self, area: PixelBounds, alpha: f64);

    /// Strokes one path made of `[x0, y0, x1, y1]` segments.
    fn stroke(&mut self, color: Rgba, width: f64, segments: &[[f64; 4]]);

    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Fade { area: PixelBounds, alpha: f64 },
    Stroke { color: Rgba, width: f64, segments: Vec<[f64; 4]> },
    Clear,
}

/// Canvas for headless runs and tests. Counts every call but keeps only
/// the ops of the latest frame, which starts at a fade or a clear.
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    frame: Vec<CanvasOp>,
    fades: usize,
    strokes: usize,
    clears: usize,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ops of the latest frame.
    pub fn ops(&self) -> &[CanvasOp] {
        &self.frame
    }

    pub fn fades(&self) -> usize {
        self.fades
    }

    pub fn strokes(&self) -> usize {
        self.strokes
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl ParticleCanvas for RecordingCanvas {
    fn fade(&mut self, area: PixelBounds, alpha: f64) {
        self.fades += 1;
        self.frame.clear();
        self.frame.push(CanvasOp::Fade { area, alpha });
    }

    fn stroke(&mut self, color: Rgba, width: f64, segments: &[[f64; 4]]) {
        self.strokes += 1;
        self.frame.push(CanvasOp::Stroke {
            color,
            width,
            segments: segments.to_vec(),
        });
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.frame.clear();
        self.frame.push(CanvasOp::Clear);
    }
}

#[cfg(test)]
mod tests {
    use foundation::{PixelBounds, Rgba};
    use pretty_assertions::assert_eq;

    use super::{CanvasOp, ParticleCanvas, RecordingCanvas};

    #[test]
    fn keeps_counts_and_only_the_latest_frame() {
        let area = PixelBounds {
            x: 0,
            y: 0,
            x_max: 9,
            y_max: 9,
        };
        let white = Rgba([255, 255, 255, 255]);
        let mut canvas = RecordingCanvas::new();
        for frame in 0..100 {
            canvas.fade(area, 0.97);
            canvas.stroke(white, 2.0, &[[0.0, 0.0, frame as f64, 1.0]; 50]);
        }
        assert_eq!((canvas.fades(), canvas.strokes()), (100, 100));
        assert_eq!(canvas.ops().len(), 2);
        assert!(matches!(&canvas.ops()[1], CanvasOp::Stroke { segments, .. } if segments[0][2] == 99.0));

        canvas.clear();
        assert_eq!(canvas.clears(), 1);
        assert_eq!(canvas.ops(), &[CanvasOp::Clear]);
        assert_eq!(canvas.strokes(), 100);
    }
}
