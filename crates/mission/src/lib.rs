//! Mission layer: the alert pipeline and the patrol controller.

pub mod alerts;
pub mod error;
pub mod patrol;
pub mod transport;

pub use alerts::AlertPipeline;
pub use error::MissionError;
pub use patrol::{PatrolConfig, PatrolHandle, PatrolMission};
pub use transport::{AlertPayload, GeoPoint, StatusPayload, Transport};
