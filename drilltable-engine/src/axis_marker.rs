use drilltable_core::document::{DrawingSurface, LineRef, LineStyle};
use drilltable_core::errors::DocumentError;
use drilltable_core::geometry::{ArrowShape, Point2, Segment, Vector2, arrow_glyph, offset};
use tracing::{debug, warn};

/// 完整轴标记的线段数：两支箭头各 4 段，X 叉 2 段，Y 勾 2 段。
pub const SEGMENT_COUNT: usize = 12;

/// X 箭头指向 +X，箭杆沿局部 -Y。
const X_AXIS: Vector2 = Vector2::new(1.0, 0.0);
const X_PERP: Vector2 = Vector2::new(0.0, -1.0);
/// Y 箭头指向 +Y，箭杆沿局部 -X。
const Y_AXIS: Vector2 = Vector2::new(0.0, 1.0);
const Y_PERP: Vector2 = Vector2::new(-1.0, 0.0);

/// 一笔待绘制的修饰线。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphStroke {
    pub segment: Segment,
    pub style: LineStyle,
}

impl GlyphStroke {
    fn new(start: Point2, end: Point2, style: LineStyle) -> Self {
        Self {
            segment: Segment::new(start, end),
            style,
        }
    }
}

/// 以原点为中心生成双轴箭头标记。
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisMarkerBuilder {
    shape: ArrowShape,
}

impl AxisMarkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(shape: ArrowShape) -> Self {
        Self { shape }
    }

    /// 按绘制顺序返回全部笔画：X 箭头、Y 箭头、X 叉、Y 勾。
    pub fn strokes(&self, origin: Point2) -> Vec<GlyphStroke> {
        let mut strokes = Vec::with_capacity(SEGMENT_COUNT);
        for (axis, perp) in [(X_AXIS, X_PERP), (Y_AXIS, Y_PERP)] {
            strokes.extend(
                arrow_glyph(origin, axis, perp, &self.shape)
                    .into_iter()
                    .map(|segment| GlyphStroke {
                        segment,
                        style: LineStyle::Solid,
                    }),
            );
        }

        let x_mark = offset(
            offset(origin, self.shape.tip(X_AXIS, X_PERP)),
            Vector2::new(0.0, -3.0),
        );
        strokes.push(GlyphStroke::new(
            offset(x_mark, Vector2::new(2.0, 2.0)),
            offset(x_mark, Vector2::new(-2.0, -2.0)),
            LineStyle::HostDefault,
        ));
        strokes.push(GlyphStroke::new(
            offset(x_mark, Vector2::new(-2.0, 2.0)),
            offset(x_mark, Vector2::new(2.0, -2.0)),
            LineStyle::HostDefault,
        ));

        let y_mark = offset(
            offset(origin, self.shape.tip(Y_AXIS, Y_PERP)),
            Vector2::new(-3.0, 0.0),
        );
        strokes.push(GlyphStroke::new(
            offset(y_mark, Vector2::new(1.0, 1.0)),
            offset(y_mark, Vector2::new(-2.0, -2.0)),
            LineStyle::Solid,
        ));
        strokes.push(GlyphStroke::new(
            offset(y_mark, Vector2::new(-1.0, 1.0)),
            y_mark,
            LineStyle::HostDefault,
        ));

        strokes
    }

    /// 在绘图表面上绘制标记并返回线句柄。
    ///
    /// 任意一笔失败时，已绘制的线会被撤回，表面保持调用前的状态。
    pub fn build<S>(&self, origin: Point2, surface: &mut S) -> Result<Vec<LineRef>, DocumentError>
    where
        S: DrawingSurface + ?Sized,
    {
        let mut lines = Vec::with_capacity(SEGMENT_COUNT);
        for stroke in self.strokes(origin) {
            match surface.make_cosmetic_line(stroke.segment.start, stroke.segment.end, stroke.style)
            {
                Ok(line) => lines.push(line),
                Err(err) => {
                    for line in lines.drain(..) {
                        if let Err(cleanup) = surface.remove_cosmetic_edge(line) {
                            warn!(line = %line, error = %cleanup, "撤回轴标记线失败");
                        }
                    }
                    return Err(err);
                }
            }
        }
        debug!(
            x = origin.x(),
            y = origin.y(),
            count = lines.len(),
            "已绘制轴标记"
        );
        Ok(lines)
    }
}
