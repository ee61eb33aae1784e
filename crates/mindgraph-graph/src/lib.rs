//! Visible projection, layout state and force simulation for the mind-map graph.
//!
//! One update cycle is `project` → [`Reconciler::reconcile`] → [`Simulation::restart`],
//! followed by [`Simulation::step`] once per frame until settled.

pub mod graph;
pub mod layout;
pub mod projection;
pub mod reconcile;
pub mod simulation;
pub mod snapshot;
pub mod style;
pub mod viewport;

pub use graph::{Bounds, ExitingNode, GraphState, LayoutNode, Vec2};
pub use layout::{
    CenterForce, CollideForce, Force, ForceConfig, ForceContext, ForceModel, LinkForce,
    ManyBodyForce,
};
pub use projection::{Projection, VisibleLink, VisibleNode, project};
pub use reconcile::{Reconciler, Reconciliation};
pub use simulation::{Simulation, SimulationConfig, TickOutcome};
pub use snapshot::GraphSnapshot;
pub use style::{NodeRole, NodeSizing};
pub use viewport::{Transform, Viewport, ZoomConfig};
