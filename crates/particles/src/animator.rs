//! Advection of the particle population through a [`Field`].

use std::rc::Rc;

use field::{Field, VectorSample};
use foundation::{IntensityColorScale, PixelBounds};
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::canvas::ParticleCanvas;
use crate::particle::{IntensityBuckets, Particle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationSettings {
    /// Frames a particle lives before it is relocated.
    pub max_particle_age: u32,
    /// Particles per pixel of field width.
    pub particle_multiplier: f64,
    pub line_width: f64,
    /// Alpha kept by existing trails on every frame.
    pub fade_alpha: f64,
    /// Gray level increment between trail colors.
    pub intensity_step: u8,
    pub frame_ms: u64,
    /// Extra draws allowed when looking for a defined pixel.
    pub randomize_retries: u32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            max_particle_age: 100,
            particle_multiplier: 7.0,
            line_width: 2.0,
            fade_alpha: 0.97,
            intensity_step: 10,
            frame_ms: 40,
            randomize_retries: 30,
        }
    }
}

pub struct Animator {
    field: Rc<Field>,
    bounds: PixelBounds,
    particles: Vec<Particle>,
    buckets: IntensityBuckets,
    settings: AnimationSettings,
    rng: SmallRng,
    segments: Vec<[f64; 4]>,
}

impl std::fmt::Debug for Animator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animator")
            .field("bounds", &self.bounds)
            .field("particles", &self.particles.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl Animator {
    /// Seeds `round(width * multiplier)` particles at random defined
    /// positions with random ages.
    pub fn new(
        field: Rc<Field>,
        max_intensity: f64,
        settings: AnimationSettings,
        mut rng: SmallRng,
    ) -> Self {
        let bounds = field.bounds();
        let count = (bounds.width() as f64 * settings.particle_multiplier).round() as usize;
        let particles = (0..count)
            .map(|_| {
                let age = rng.gen_range(0..=settings.max_particle_age);
                let (x, y) = field.randomize(&mut rng, settings.randomize_retries);
                Particle::new(x, y, age)
            })
            .collect();
        let buckets = IntensityBuckets::new(IntensityColorScale::grayscale(
            settings.intensity_step,
            max_intensity,
        ));
        Self {
            field,
            bounds,
            particles,
            buckets,
            settings,
            rng,
            segments: Vec::new(),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn buckets(&self) -> &IntensityBuckets {
        &self.buckets
    }

    pub fn field(&self) -> &Rc<Field> {
        &self.field
    }

    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    /// Ages, relocates and buckets every particle for the next frame.
    pub fn evolve(&mut self) {
        let max_age = self.settings.max_particle_age;
        self.buckets.clear();
        for (i, particle) in self.particles.iter_mut().enumerate() {
            if particle.age > max_age {
                particle.relocate(self.field.randomize(&mut self.rng, self.settings.randomize_retries));
                particle.age = 0;
            }
            match self.field.sample(particle.x, particle.y) {
                VectorSample::Value { u, v, magnitude } => {
                    particle.x_next = particle.x + u;
                    particle.y_next = particle.y + v;
                    self.buckets.assign(i, magnitude);
                }
                _ => particle.age = max_age,
            }
            particle.age += 1;
        }
    }

    /// Fades old trails, then strokes one path per occupied bucket and
    /// advances the drawn particles.
    pub fn draw(&mut self, canvas: &mut dyn ParticleCanvas) {
        canvas.fade(self.bounds, self.settings.fade_alpha);
        for (color, members) in self.buckets.occupied() {
            self.segments.clear();
            self.segments
                .extend(members.iter().map(|&i| self.particles[i].segment()));
            canvas.stroke(color, self.settings.line_width, &self.segments);
            for &i in members {
                self.particles[i].commit();
            }
        }
    }

    pub fn frame(&mut self, canvas: &mut dyn ParticleCanvas) {
        self.evolve();
        self.draw(canvas);
    }

    pub fn release_field(&self) {
        self.field.release();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use field::{BuildStats, Field, OverlayImage, VectorSample};
    use foundation::{PixelBounds, View};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{AnimationSettings, Animator};
    use crate::canvas::{CanvasOp, RecordingCanvas};

    fn bounds() -> PixelBounds {
        PixelBounds {
            x: 0,
            y: 0,
            x_max: 9,
            y_max: 9,
        }
    }

    fn uniform_field(sample: VectorSample) -> Rc<Field> {
        Rc::new(Field::new(
            bounds(),
            vec![sample; 100],
            OverlayImage::new(View::new(10, 10)),
            BuildStats::default(),
        ))
    }

    fn animator(field: Rc<Field>) -> Animator {
        Animator::new(
            field,
            1.0,
            AnimationSettings::default(),
            SmallRng::seed_from_u64(3),
        )
    }

    #[test]
    fn population_scales_with_width() {
        let a = animator(uniform_field(VectorSample::Value {
            u: 0.0,
            v: 0.0,
            magnitude: 0.0,
        }));
        assert_eq!(a.particles().len(), 70);
        assert!(a.particles().iter().all(|p| p.age <= 100));
    }

    #[test]
    fn defined_samples_advance_and_bucket() {
        let mut a = animator(uniform_field(VectorSample::Value {
            u: 0.25,
            v: -0.5,
            magnitude: 1.0,
        }));
        let before: Vec<(f64, f64, u32)> = a
            .particles()
            .iter()
            .map(|p| (p.x, p.y, p.age))
            .collect();
        a.evolve();
        let last = a.buckets().len() - 1;
        for (p, (x, y, age)) in a.particles().iter().zip(&before) {
            if *age > 100 {
                continue;
            }
            assert_eq!((p.x_next, p.y_next), (x + 0.25, y - 0.5));
            assert_eq!(p.age, age + 1);
        }
        assert_eq!(a.buckets().bucket(last).len(), 70);
    }

    #[test]
    fn holes_age_out_and_skip_drawing() {
        let mut a = animator(uniform_field(VectorSample::Hole));
        a.evolve();
        assert!(a.particles().iter().all(|p| p.age == 101));
        assert_eq!(a.buckets().assigned(), 0);

        let mut canvas = RecordingCanvas::new();
        a.draw(&mut canvas);
        assert_eq!(canvas.fades(), 1);
        assert_eq!(canvas.strokes(), 0);

        // Every particle is relocated on the next frame.
        a.evolve();
        assert!(a.particles().iter().all(|p| p.age == 101));
    }

    #[test]
    fn draw_strokes_one_path_per_bucket_and_commits() {
        let mut a = animator(uniform_field(VectorSample::Value {
            u: 1.0,
            v: 0.0,
            magnitude: 0.0,
        }));
        let mut canvas = RecordingCanvas::new();
        a.frame(&mut canvas);

        let ops = canvas.ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], CanvasOp::Fade { alpha, .. } if alpha == 0.97));
        let CanvasOp::Stroke { color, width, segments } = &ops[1] else {
            panic!("expected a stroke, got {:?}", ops[1]);
        };
        assert_eq!(color.0, [85, 85, 85, 255]);
        assert_eq!(*width, 2.0);
        assert_eq!(segments.len(), 70);
        for (p, s) in a.particles().iter().zip(segments) {
            assert_eq!((p.x, p.y), (s[2], s[3]));
            assert!((s[2] - s[0] - 1.0).abs() < 1e-12, "{s:?}");
        }
    }

    #[test]
    fn release_empties_shared_field() {
        let field = uniform_field(VectorSample::Hole);
        let a = animator(Rc::clone(&field));
        a.release_field();
        assert!(field.is_released());
    }
}
