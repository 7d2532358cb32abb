use ndarray::Array2;

/// Sub-pixel displacement of the Gaussian kernel from the ROI center,
/// in pixel units. `dx` runs along axis 0 of the ROI, `dy` along axis 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// A candidate bright spot produced by a peak locator: the integer pixel
/// position of the peak in the source frame and a fixed-size crop around it.
#[derive(Clone, Debug)]
pub struct PeakCandidate {
    /// Peak row (axis 0) in the source frame.
    pub x: usize,
    /// Peak column (axis 1) in the source frame.
    pub y: usize,
    /// Square crop centered near `(x, y)`, shape must match the fitter's
    /// configured model size.
    pub roi: Array2<f64>,
}

/// Final sub-pixel spot position in the source frame's coordinates,
/// together with the correlation score at the fitted offset.
#[derive(Clone, Copy, Debug)]
pub struct SpotLocation {
    pub x: f64,
    pub y: f64,
    pub score: f64,
}
