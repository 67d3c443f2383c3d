pub mod chart;
pub mod commands;
pub mod theme;
pub mod types;

pub use chart::{ChartDocument, Step, StepId, SubStep};
pub use commands::{RenderCommand, TextAlign};
pub use theme::ThemeToken;
pub use types::{Point, Rect, Viewport};
