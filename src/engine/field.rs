use std::f32::consts::TAU;

use crate::config::OrbitConfig;
use crate::error::EngineError;

/// A ring of points driven by one frequency band.
///
/// Points are laid out line-major: `lines` azimuthal divisions, each holding
/// `dots` radial layers. Buffers are sized once and only ever mutated in place.
#[derive(Debug, Clone)]
pub struct GeometryField {
    lines: usize,
    dots: usize,
    positions: Vec<f32>,
    scales: Vec<f32>,
}

impl GeometryField {
    /// Builds the orbit ring for `radius`.
    pub fn orbit(radius: f32, config: &OrbitConfig) -> Result<Self, EngineError> {
        let lines = config.lines;
        let dots = config.dots;
        let mut positions = Vec::with_capacity(lines * dots * 3);
        let mut scales = Vec::with_capacity(lines * dots);

        for ix in 0..lines {
            let turn = ix as f32 / lines as f32 * TAU;
            // The -45 offset is in radians; it only rotates where the seam sits.
            let theta = turn - 45.0;
            for iy in 0..dots {
                let reach = radius + config.spread * iy as f32 * 1.5;
                positions.push(theta.cos() * reach);
                positions.push(config.tilt * turn.cos() * 100.0);
                positions.push(theta.sin() * reach);
                scales.push(config.spread);
            }
        }

        Self::from_buffers(lines, dots, positions, scales)
    }

    /// Wraps existing buffers after checking they match the ring layout.
    pub fn from_buffers(
        lines: usize,
        dots: usize,
        positions: Vec<f32>,
        scales: Vec<f32>,
    ) -> Result<Self, EngineError> {
        let points = lines * dots;
        if points == 0 {
            return Err(EngineError::BufferSize {
                what: "field points",
                expected: 1,
                actual: 0,
            });
        }
        if positions.len() != points * 3 {
            return Err(EngineError::BufferSize {
                what: "field positions",
                expected: points * 3,
                actual: positions.len(),
            });
        }
        if scales.len() != points {
            return Err(EngineError::BufferSize {
                what: "field scales",
                expected: points,
                actual: scales.len(),
            });
        }

        Ok(Self {
            lines,
            dots,
            positions,
            scales,
        })
    }

    /// One step of the travelling wave.
    ///
    /// The first line eases toward `current_note`; every later line, walked
    /// from the outermost index down, eases toward its inner neighbour. A
    /// disturbance at the start therefore travels one line per frame while
    /// decaying by `smoothing` each hop.
    pub fn wave(&mut self, current_note: f32, smoothing: f32) {
        let stride = self.dots * 3;
        assert_eq!(self.positions.len(), self.lines * stride, "field buffer resized");

        for iy in 0..self.dots {
            let y = &mut self.positions[iy * 3 + 1];
            *y += (current_note - *y) * smoothing;
        }

        for ix in (1..self.lines).rev() {
            for iy in 0..self.dots {
                let now = ix * stride + iy * 3 + 1;
                let inner = self.positions[now - stride];
                self.positions[now] += (inner - self.positions[now]) * smoothing;
            }
        }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn dots(&self) -> usize {
        self.dots
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn point(&self, index: usize) -> [f32; 3] {
        let i = index * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }
}
