use foundation::{IntensityColorScale, Rgba};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub x_next: f64,
    pub y_next: f64,
    pub age: u32,
}

impl Particle {
    pub fn new(x: f64, y: f64, age: u32) -> Self {
        Self {
            x,
            y,
            x_next: x,
            y_next: y,
            age,
        }
    }

    pub fn relocate(&mut self, (x, y): (f64, f64)) {
        self.x = x;
        self.y = y;
        self.x_next = x;
        self.y_next = y;
    }

    /// Moves the particle to the end of its last trail segment.
    pub fn commit(&mut self) {
        self.x = self.x_next;
        self.y = self.y_next;
    }

    pub fn segment(&self) -> [f64; 4] {
        [self.x, self.y, self.x_next, self.y_next]
    }
}

/// Particle indices grouped by trail color, one group per style of the
/// intensity scale.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityBuckets {
    scale: IntensityColorScale,
    buckets: Vec<Vec<usize>>,
}

impl IntensityBuckets {
    pub fn new(scale: IntensityColorScale) -> Self {
        let buckets = vec![Vec::new(); scale.len()];
        Self { scale, buckets }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Empties every bucket, keeping allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Files `particle` under the bucket for `magnitude`; returns the index.
    pub fn assign(&mut self, particle: usize, magnitude: f64) -> usize {
        let index = self.scale.index_for(magnitude);
        if let Some(bucket) = self.buckets.get_mut(index) {
            bucket.push(particle);
        }
        index
    }

    pub fn bucket(&self, index: usize) -> &[usize] {
        self.buckets.get(index).map_or(&[], Vec::as_slice)
    }

    /// Non-empty buckets with their color.
    pub fn occupied(&self) -> impl Iterator<Item = (Rgba, &[usize])> + '_ {
        self.scale
            .styles()
            .iter()
            .zip(&self.buckets)
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(color, bucket)| (*color, bucket.as_slice()))
    }

    pub fn assigned(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}
