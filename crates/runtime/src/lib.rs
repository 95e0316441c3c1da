pub mod agent;
pub mod budget;
pub mod cancel;
pub mod coalesce;
pub mod emitter;
pub mod error;
pub mod event_loop;
pub mod event_trace;
pub mod metrics;
pub mod timing;

pub use agent::*;
pub use budget::*;
pub use cancel::*;
pub use coalesce::*;
pub use emitter::*;
pub use error::*;
pub use event_loop::*;
pub use event_trace::*;
pub use metrics::*;
pub use timing::*;
