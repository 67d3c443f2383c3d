//! View transforms: turn a synchronized chart into render commands.

pub mod gantt;

pub use gantt::render_chart;
