//! Vertical sampling windows and window-to-window resampling

/// A discretised 1-D sampling grid around a horizon position.
///
/// Two construction modes: [`VerticalWindow::squeezed`] snaps to the source
/// sample grid and pads each side with an interpolation margin, so window
/// samples coincide with source samples exactly; [`VerticalWindow::with_stepsize`]
/// builds the destination grid for super- or sub-sampled attributes, keeping
/// the reference position on a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalWindow {
    stepsize: f64,
    nsamples_above: usize,
    nsamples_below: usize,
    margin: usize,
    initial_skew: f64,
}

/// Samples of padding a squeezed window carries on each side for the
/// window-to-window interpolation
pub const INTERPOLATION_MARGIN: usize = 2;

const TOLERANCE: f64 = 1e-9;

impl VerticalWindow {
    /// A window on the source grid. `initial_skew` anchors the grid (the
    /// annotation value of the first source sample); extents are set per
    /// cell with [`VerticalWindow::fit`].
    pub fn squeezed(source_stepsize: f64, margin: usize, initial_skew: f64) -> Self {
        debug_assert!(source_stepsize > 0.0);
        Self {
            stepsize: source_stepsize,
            nsamples_above: margin,
            nsamples_below: margin,
            margin,
            initial_skew,
        }
    }

    /// Size the window to cover at least `above` and `below` distance from
    /// the reference, plus the margin. Snapping up to whole samples keeps
    /// the window on the source grid.
    pub fn fit(&mut self, above: f64, below: f64) {
        self.nsamples_above = Self::snap_up(above, self.stepsize) + self.margin;
        self.nsamples_below = Self::snap_up(below, self.stepsize) + self.margin;
    }

    /// A destination window with an explicit stepsize. The window covers
    /// whole steps that fit within `above`/`below`; the reference stays on a
    /// sample at offset [`VerticalWindow::reference_offset`].
    pub fn with_stepsize(stepsize: f64, above: f64, below: f64) -> Self {
        debug_assert!(stepsize > 0.0);
        Self {
            stepsize,
            nsamples_above: Self::snap_down(above, stepsize),
            nsamples_below: Self::snap_down(below, stepsize),
            margin: 0,
            initial_skew: 0.0,
        }
    }

    fn snap_up(distance: f64, stepsize: f64) -> usize {
        ((distance / stepsize) - TOLERANCE).ceil().max(0.0) as usize
    }

    fn snap_down(distance: f64, stepsize: f64) -> usize {
        ((distance / stepsize) + TOLERANCE).floor().max(0.0) as usize
    }

    pub fn stepsize(&self) -> f64 {
        self.stepsize
    }

    pub fn nsamples_above(&self) -> usize {
        self.nsamples_above
    }

    pub fn nsamples_below(&self) -> usize {
        self.nsamples_below
    }

    pub fn size(&self) -> usize {
        self.nsamples_above + 1 + self.nsamples_below
    }

    /// Index of the reference position within the window
    pub fn reference_offset(&self) -> usize {
        self.nsamples_above
    }

    /// Snap a vertical value to the window grid, half-way cases away from
    /// zero
    pub fn nearest(&self, value: f64) -> f64 {
        self.initial_skew + ((value - self.initial_skew) / self.stepsize).round() * self.stepsize
    }

    /// Position of window sample `index` for a window centered on
    /// `reference`
    pub fn at(&self, index: usize, reference: f64) -> f64 {
        reference + (index as f64 - self.nsamples_above as f64) * self.stepsize
    }
}

/// Resample one vertical window onto another with a modified Akima (makima)
/// cubic. Source samples sit at `src_start + i * src_step`; the spline is
/// exact at source samples and reproduces linear traces exactly. All
/// destination positions must lie within the source extent, which the
/// squeezed window's margin guarantees.
pub fn resample(
    src_values: &[f64],
    src_start: f64,
    src_step: f64,
    dst_positions: &[f64],
) -> Vec<f64> {
    let n = src_values.len();
    if n == 1 {
        return vec![src_values[0]; dst_positions.len()];
    }

    let slopes = makima_slopes(src_values, src_step);

    dst_positions
        .iter()
        .map(|&x| {
            let u = (x - src_start) / src_step;
            let cell = (u.floor() as isize).clamp(0, n as isize - 2) as usize;
            let t = u - cell as f64;
            let t2 = t * t;
            let t3 = t2 * t;

            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;

            h00 * src_values[cell]
                + h10 * src_step * slopes[cell]
                + h01 * src_values[cell + 1]
                + h11 * src_step * slopes[cell + 1]
        })
        .collect()
}

/// Node derivatives of the modified Akima spline over uniformly spaced
/// values
fn makima_slopes(values: &[f64], step: f64) -> Vec<f64> {
    let n = values.len();
    let nslopes = n - 1;

    // secant slopes, extended by two virtual slopes on each end
    let mut d = vec![0.0; nslopes + 4];
    for i in 0..nslopes {
        d[i + 2] = (values[i + 1] - values[i]) / step;
    }
    if nslopes == 1 {
        d[0] = d[2];
        d[1] = d[2];
        d[3] = d[2];
        d[4] = d[2];
    } else {
        d[1] = 2.0 * d[2] - d[3];
        d[0] = 2.0 * d[1] - d[2];
        d[nslopes + 2] = 2.0 * d[nslopes + 1] - d[nslopes];
        d[nslopes + 3] = 2.0 * d[nslopes + 2] - d[nslopes + 1];
    }

    (0..n)
        .map(|i| {
            // d[i + 2] is the secant slope to the right of node i
            let right = d[i + 2];
            let left = d[i + 1];
            let w1 = (d[i + 3] - right).abs() + (d[i + 3] + right).abs() / 2.0;
            let w2 = (left - d[i]).abs() + (left + d[i]).abs() / 2.0;
            if w1 + w2 < 1e-12 {
                0.0
            } else {
                (w1 * left + w2 * right) / (w1 + w2)
            }
        })
        .collect()
}
