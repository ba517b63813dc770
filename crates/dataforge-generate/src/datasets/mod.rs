//! Record types and generators of the built-in dataset profiles.

pub mod events;
pub mod leaderboard;
pub mod structured;
pub mod tenants;
pub mod users;

pub use events::{EventRecord, EventsGenerator};
pub use leaderboard::{LeaderboardGenerator, LeaderboardRecord};
pub use structured::{StructuredEventRecord, StructuredEventsGenerator};
pub use tenants::{TenantActivityGenerator, TenantActivityRecord};
pub use users::{UserRecord, UsersGenerator};
