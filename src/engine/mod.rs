pub mod calendar;
pub mod geo;
pub mod gps_logger;
pub mod optimizer;
pub mod retry;
pub mod route_builder;
pub mod scheduler;
pub mod state_machine;

pub use geo::GeoPoint;
pub use optimizer::{AutoStrategy, ExactStrategy, NearestNeighborTwoOpt, RouteStrategy};
pub use retry::{RetryExecutor, RetryPolicy};
pub use scheduler::Scheduler;
pub use state_machine::TransitionPolicy;
