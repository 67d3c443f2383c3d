//! SVG renderer: converts `RenderCommand` lists into standalone SVG strings.

use std::fmt::Write as _;

use steplink_protocol::{Point, RenderCommand, TextAlign, ThemeToken};

const HEAD_LENGTH: f64 = 6.0;

/// Render a list of commands as an SVG document string.
///
/// `width` and `height` define the SVG viewBox dimensions.
pub fn render_svg(commands: &[RenderCommand], width: f64, height: f64) -> String {
    let mut svg = String::with_capacity(commands.len() * 160);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif;font-size:11px">"#,
    );
    let _ = write!(
        svg,
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        resolve_color(ThemeToken::Background),
    );

    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                label,
                element_id,
            } => {
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" rx="2""#,
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    resolve_color(*color),
                );
                if let Some(border) = border_color {
                    let _ = write!(svg, r#" stroke="{}""#, resolve_color(*border));
                }
                if let Some(id) = element_id {
                    let _ = write!(svg, r#" data-element="{id}""#);
                }
                svg.push('>');
                if let Some(label) = label {
                    let _ = write!(svg, "<title>{}</title>", escape_xml(label));
                }
                svg.push_str("</rect>");

                // Inline label when the bar is wide enough
                if let Some(label) = label
                    && rect.w > 30.0
                {
                    let max_chars = (rect.w / 7.0) as usize;
                    let text = if label.chars().count() > max_chars && max_chars > 2 {
                        let truncated: String = label.chars().take(max_chars - 1).collect();
                        format!("{truncated}…")
                    } else {
                        label.clone()
                    };
                    let _ = write!(
                        svg,
                        r#"<text x="{}" y="{}" fill="{}" style="pointer-events:none">{}</text>"#,
                        rect.x + 3.0,
                        rect.y + rect.h * 0.75,
                        resolve_color(ThemeToken::StepLabel),
                        escape_xml(&text),
                    );
                }
            }
            RenderCommand::DrawPolyline {
                points,
                color,
                width: line_width,
                head,
            } => {
                if points.len() < 2 {
                    continue;
                }
                let stroke = resolve_color(*color);
                let coords: Vec<String> = points.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
                let _ = write!(
                    svg,
                    r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-width="{line_width}"/>"#,
                    coords.join(" "),
                );
                if *head && let [.., from, to] = points.as_slice() {
                    let [a, b] = arrow_head(*from, *to);
                    let _ = write!(
                        svg,
                        r#"<polygon points="{},{} {},{} {},{}" fill="{stroke}"/>"#,
                        to.x, to.y, a.x, a.y, b.x, b.y,
                    );
                }
            }
            RenderCommand::DrawHandle {
                center,
                radius,
                color,
            } => {
                let _ = write!(
                    svg,
                    r#"<circle cx="{}" cy="{}" r="{radius}" fill="{}"/>"#,
                    center.x,
                    center.y,
                    resolve_color(*color),
                );
            }
            RenderCommand::DrawText {
                text,
                position,
                color,
                font_size,
                align,
            } => {
                let anchor = match align {
                    TextAlign::Left => "start",
                    TextAlign::Center => "middle",
                    TextAlign::Right => "end",
                };
                let _ = write!(
                    svg,
                    r#"<text x="{}" y="{}" fill="{}" font-size="{font_size}" text-anchor="{anchor}" dominant-baseline="middle">{}</text>"#,
                    position.x,
                    position.y,
                    resolve_color(*color),
                    escape_xml(text),
                );
            }
            RenderCommand::BeginGroup { id, .. } => {
                let _ = write!(svg, r#"<g id="{}">"#, escape_xml(id));
            }
            RenderCommand::EndGroup => svg.push_str("</g>"),
        }
    }

    svg.push_str("</svg>");
    svg
}

/// The two back corners of an arrow head pointing from `from` to `to`.
fn arrow_head(from: Point, to: Point) -> [Point; 2] {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = dx.hypot(dy);
    if len <= f64::EPSILON {
        return [to, to];
    }
    let (ux, uy) = (dx / len, dy / len);
    let back = Point::new(to.x - ux * HEAD_LENGTH, to.y - uy * HEAD_LENGTH);
    let half = HEAD_LENGTH / 2.0;
    [
        Point::new(back.x - uy * half, back.y + ux * half),
        Point::new(back.x + uy * half, back.y - ux * half),
    ]
}

fn resolve_color(token: ThemeToken) -> &'static str {
    match token {
        ThemeToken::Background => "#ffffff",
        ThemeToken::RowStripe => "#f5f6f8",
        ThemeToken::StepBar => "#5b8def",
        ThemeToken::StepBarReadOnly => "#adb5bd",
        ThemeToken::StepBarBorder => "#1d3f8f",
        ThemeToken::SubStepBar => "#9dbcf7",
        ThemeToken::StepLabel | ThemeToken::TextPrimary => "#1a1a2e",
        ThemeToken::ArrowLine => "#444455",
        ThemeToken::ArrowLineReadOnly => "#9e9e9e",
        ThemeToken::ArrowHandle => "#e67e22",
        ThemeToken::ArrowDragPreview => "#f4845f",
        ThemeToken::TextMuted => "#666677",
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use steplink_protocol::Rect;

    #[test]
    fn basic_svg_output() {
        let commands = vec![RenderCommand::DrawRect {
            rect: Rect::new(10.0, 20.0, 100.0, 18.0),
            color: ThemeToken::StepBar,
            border_color: Some(ThemeToken::StepBarBorder),
            label: Some("Design".into()),
            element_id: Some(1),
        }];
        let svg = render_svg(&commands, 800.0, 400.0);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Design"));
        assert!(svg.contains("#5b8def"));
        assert!(svg.contains(r##"stroke="#1d3f8f""##));
        assert!(svg.contains(r#"data-element="1""#));
    }

    #[test]
    fn escapes_xml_entities() {
        let commands = vec![RenderCommand::DrawRect {
            rect: Rect::new(0.0, 0.0, 200.0, 18.0),
            color: ThemeToken::StepBar,
            border_color: None,
            label: Some("a<b> & \"c\"".into()),
            element_id: None,
        }];
        let svg = render_svg(&commands, 400.0, 100.0);
        assert!(svg.contains("a&lt;b&gt; &amp; &quot;c&quot;"));
    }

    #[test]
    fn arrows_get_a_head() {
        let commands = vec![
            RenderCommand::BeginGroup {
                id: "arrows".into(),
                label: None,
            },
            RenderCommand::DrawPolyline {
                points: vec![Point::new(0.0, 5.0), Point::new(20.0, 5.0), Point::new(20.0, 30.0)],
                color: ThemeToken::ArrowLine,
                width: 1.5,
                head: true,
            },
            RenderCommand::EndGroup,
        ];
        let svg = render_svg(&commands, 100.0, 100.0);
        assert!(svg.contains(r#"<g id="arrows">"#));
        assert!(svg.contains(r#"points="0,5 20,5 20,30""#));
        assert!(svg.contains("<polygon points=\"20,30 "));
        assert!(svg.contains("</g>"));
    }

    #[test]
    fn head_points_back_along_the_last_segment() {
        let [a, b] = arrow_head(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((a.x - 4.0).abs() < 1e-9 && (b.x - 4.0).abs() < 1e-9);
        assert!((a.y + b.y).abs() < 1e-9);
        assert!((a.y - b.y).abs() > 0.0);
    }
}
