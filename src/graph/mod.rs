//! Audio-graph routing.
//!
//! - [`GraphRouter`]: one injected gain per page-created context; page
//!   connections to the real destination are redirected through it
//! - [`BoostContext`]: the engine's own context that boosts native media
//!   elements past unity

mod boost;
mod router;

pub(crate) use boost::{BoostContext, RouteOutcome};
pub(crate) use router::GraphRouter;
