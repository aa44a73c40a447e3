pub mod linear;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use linear::LinearClassifier;
pub use stub::{canned_hand, StubClassifier, StubLandmarker};

#[cfg(feature = "backend-tract")]
pub use tract::TractLandmarker;
