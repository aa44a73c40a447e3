/// Number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;
/// Index of the wrist landmark; every other landmark is expressed relative to it.
pub const WRIST: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

/// Landmark in normalized image coordinates (x, y in 0..1, z relative depth).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One detected hand. Discarded once features are extracted.
#[derive(Clone, Debug, PartialEq)]
pub struct HandObservation {
    /// Position of this hand in the landmarker's output.
    pub hand_index: usize,
    pub handedness: Handedness,
    pub landmarks: [Landmark; LANDMARK_COUNT],
}

/// Classifier output: an index into the label table and its confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub label_index: usize,
    pub confidence: f32,
}
