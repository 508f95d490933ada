mod auth;
mod checker;
mod clock;
mod command;
mod config;
mod constants;
mod errors;
mod metrics;
mod store;
mod supervisor;
mod tools;
mod topology;
pub mod utils;

pub use auth::*;
pub use checker::*;
pub use clock::*;
pub use command::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use store::*;
pub use supervisor::*;
pub use tools::*;
pub use topology::*;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms10, ObjectivePercentile::P99);
