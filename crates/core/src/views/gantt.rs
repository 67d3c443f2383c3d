use steplink_protocol::{Point, Rect, RenderCommand, TextAlign, ThemeToken, Viewport};

use crate::arrow::{ArrowLink, Endpoint};
use crate::chart::Chart;
use crate::layout::Layout;
use crate::step::StepNode;

const LABEL_FONT_SIZE: f64 = 11.0;
const ARROW_WIDTH: f64 = 1.5;
const HANDLE_RADIUS: f64 = 4.0;
/// Sub-step bars are inset vertically inside their parent.
const SUB_STEP_INSET: f64 = 3.0;

/// Render every measurable step bar and every linked arrow of `chart`.
///
/// Bars come first so arrows paint over them. Elements the layout cannot
/// measure yet are skipped, as is anything entirely outside `viewport`.
pub fn render_chart(chart: &Chart, layout: &impl Layout, viewport: &Viewport) -> Vec<RenderCommand> {
    let mut commands = Vec::with_capacity(chart.len() * 3 + 4);

    commands.push(RenderCommand::BeginGroup {
        id: "steps".to_string(),
        label: Some("Steps".to_string()),
    });
    for node in chart.steps() {
        let Some(rect) = layout.bounding_box(node.element()) else {
            continue;
        };
        if !rect.has_area() || !visible(&rect, viewport) {
            continue;
        }
        draw_step(&mut commands, node, rect);
    }
    commands.push(RenderCommand::EndGroup);

    commands.push(RenderCommand::BeginGroup {
        id: "arrows".to_string(),
        label: Some("Predecessors".to_string()),
    });
    for arrow in chart.steps().filter_map(StepNode::arrow) {
        draw_arrow(&mut commands, arrow, viewport);
    }
    commands.push(RenderCommand::EndGroup);

    commands
}

fn draw_step(commands: &mut Vec<RenderCommand>, node: &StepNode, rect: Rect) {
    let color = if node.is_read_only() {
        ThemeToken::StepBarReadOnly
    } else {
        ThemeToken::StepBar
    };
    commands.push(RenderCommand::DrawRect {
        rect,
        color,
        border_color: node
            .has_sub_steps_marker()
            .then_some(ThemeToken::StepBarBorder),
        label: Some(node.caption().to_string()),
        element_id: Some(node.element().raw()),
    });

    for sub in node.sub_steps() {
        if sub.width() <= 0.0 {
            continue;
        }
        let inset = SUB_STEP_INSET.min(rect.h / 4.0);
        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(rect.x + sub.left(), rect.y + inset, sub.width(), rect.h - 2.0 * inset),
            color: ThemeToken::SubStepBar,
            border_color: None,
            label: Some(sub.data().caption.clone()),
            element_id: Some(sub.element().raw()),
        });
    }

    commands.push(RenderCommand::DrawText {
        position: Point::new(rect.x - 4.0, rect.center_y()),
        text: node.uid().to_string(),
        color: ThemeToken::TextMuted,
        font_size: LABEL_FONT_SIZE,
        align: TextAlign::Right,
    });
}

fn draw_arrow(commands: &mut Vec<RenderCommand>, arrow: &ArrowLink, viewport: &Viewport) {
    if !arrow.is_linked() {
        return;
    }
    let Some(geometry) = arrow.geometry() else {
        return;
    };
    if !visible(&geometry.bounds(), viewport) {
        return;
    }

    commands.push(RenderCommand::DrawPolyline {
        points: geometry.absolute_path(),
        color: if arrow.is_read_only() {
            ThemeToken::ArrowLineReadOnly
        } else {
            ThemeToken::ArrowLine
        },
        width: ARROW_WIDTH,
        head: true,
    });

    if !arrow.is_interactive() {
        return;
    }
    for center in [geometry.absolute_start(), geometry.absolute_end()] {
        commands.push(RenderCommand::DrawHandle {
            center,
            radius: HANDLE_RADIUS,
            color: ThemeToken::ArrowHandle,
        });
    }

    // Rubber band from the fixed end to the pointer.
    if let Some(drag) = arrow.drag()
        && let Some(pointer) = drag.pointer
    {
        let points = match drag.endpoint {
            Endpoint::Start => vec![pointer, geometry.absolute_end()],
            Endpoint::End => vec![geometry.absolute_start(), pointer],
        };
        commands.push(RenderCommand::DrawPolyline {
            points,
            color: ThemeToken::ArrowDragPreview,
            width: ARROW_WIDTH,
            head: drag.endpoint == Endpoint::End,
        });
    }
}

fn visible(rect: &Rect, viewport: &Viewport) -> bool {
    rect.right() >= viewport.x
        && rect.x <= viewport.x + viewport.width
        && rect.bottom() >= viewport.y
        && rect.y <= viewport.y + viewport.height
}
