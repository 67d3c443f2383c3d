//! Keeps a Gantt chart's predecessor relations, step tree and arrow geometry
//! consistent while data changes, elements attach and detach, and the user
//! drags arrow endpoints.

pub mod arrow;
pub mod chart;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod layout;
pub mod ready_queue;
pub mod render_tree;
pub mod step;
pub mod svg;
pub mod sync;
pub mod views;

pub use arrow::{ArrowLink, Endpoint, LinkState};
pub use chart::{Chart, ElementOwner};
pub use config::SyncConfig;
pub use element::ElementId;
pub use error::{SyncError, SyncNotice};
pub use geometry::{ArrowGeometry, ArrowGeometryResolver, Orientation};
pub use hit::{HitResolver, PointerEvent, RelinkHandler, RelinkOutcome, RelinkProposal};
pub use layout::{Layout, LayoutSurface};
pub use ready_queue::ReadyQueue;
pub use render_tree::{ContentLayer, RenderTree};
pub use step::{BarChild, StepNode, SubStepNode};
pub use sync::{DeferredAction, RelationSyncController, SyncEvent};
