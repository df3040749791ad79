pub mod event;
pub mod gps_log;
pub mod route;

pub use event::{EventStatus, EventType, Priority, ScheduledEvent, StatusHistoryEntry};
pub use gps_log::{ActivityType, GpsActivityLog, NewGpsActivity};
pub use route::{OptimizationMethod, OptimizedRoute, RouteStop, RouteSummary};
