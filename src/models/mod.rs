//! Process and observation model seams.

pub mod damped_body;
pub mod observation;
pub mod process;

pub use damped_body::DampedBodyProcess;
pub use observation::ObservationModel;
pub use process::{ObjectParameters, ProcessModel};
