use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,
    RowStripe,

    // Step bars
    StepBar,
    StepBarReadOnly,
    StepBarBorder,
    SubStepBar,
    StepLabel,

    // Predecessor arrows
    ArrowLine,
    ArrowLineReadOnly,
    ArrowHandle,
    ArrowDragPreview,

    TextPrimary,
    TextMuted,
}
