use drilltable_core::document::{
    Annotation, AnnotationPage, Document, ObjectId, SubElement, ViewPlacement,
};
use drilltable_core::geometry::{Point2, Vector2};
use tracing::{debug, info, warn};

use crate::errors::{EngineError, LookupFailure};
use crate::scene::Scene;

pub const DEFAULT_MARGIN_LEFT: f64 = 8.0;
pub const DEFAULT_TEXT_SIZE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrarOptions {
    pub margin_left: f64,
    pub text_size: f64,
}

impl Default for RegistrarOptions {
    fn default() -> Self {
        Self {
            margin_left: DEFAULT_MARGIN_LEFT,
            text_size: DEFAULT_TEXT_SIZE,
        }
    }
}

/// 原点、其宿主视图以及展示该视图的图纸页。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLocation {
    pub origin: ObjectId,
    pub view: ObjectId,
    pub page: ObjectId,
}

/// 已登记的一个孔位。
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredHole {
    pub view: ObjectId,
    pub edge: SubElement,
    pub tag: String,
    /// 台账存储中的行号（1 为表头）。
    pub row: u32,
    pub relative: Vector2,
    pub diameter: f64,
    pub annotation: ObjectId,
}

/// 一次批量登记的结果。失败的边不会撤销之前已登记的孔位。
#[derive(Debug, Default)]
pub struct HoleBatchReport {
    pub registered: Vec<RegisteredHole>,
    pub failures: Vec<EngineError>,
}

impl HoleBatchReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(|hole| hole.tag.as_str())
    }
}

/// 查找唯一的原点以及展示其视图的图纸页。
pub fn locate_page_view(document: &Document) -> Result<PageLocation, EngineError> {
    let origins: Vec<_> = document.drill_origins().collect();
    let (origin, frame) = match origins.as_slice() {
        [] => return Err(EngineError::Lookup(LookupFailure::NoOrigin)),
        [single] => *single,
        many => return Err(EngineError::Lookup(LookupFailure::AmbiguousOrigin(many.len()))),
    };
    let view = frame.host_view();
    if document.view(view).is_err() {
        return Err(EngineError::Lookup(LookupFailure::NoView));
    }
    let page = document
        .pages_showing(view)
        .next()
        .ok_or(EngineError::Lookup(LookupFailure::NoPage))?;
    Ok(PageLocation { origin, view, page })
}

/// "添加孔位"是否可用：唯一原点、其视图在某页上、且至少选中一条圆形边。
pub fn can_add_hole(scene: &Scene) -> bool {
    if locate_page_view(scene.document()).is_err() {
        return false;
    }
    scene
        .selected_edges()
        .into_iter()
        .any(|(view, edge)| scene.edge_circle(view, edge).is_some())
}

/// 注释位置：圆右侧外加左边距，按视图放置参数换算到页面坐标。
pub fn annotation_position(
    placement: ViewPlacement,
    center: Point2,
    radius: f64,
    margin_left: f64,
) -> Point2 {
    Point2::new(
        placement.x + (center.x() + radius) * placement.scale + margin_left,
        placement.y + center.y() * placement.scale,
    )
}

/// 为每条选中的圆形边追加台账行并在图纸页上放置标签注释。
///
/// 边按选择顺序处理；单条边失败只记录在报告中，不影响前后的边。
pub fn add_holes(
    scene: &mut Scene,
    options: &RegistrarOptions,
) -> Result<HoleBatchReport, EngineError> {
    let location = locate_page_view(scene.document()).inspect_err(|err| {
        warn!(error = %err, "无法定位原点或图纸页");
    })?;

    let edges = scene.selected_edges();
    if edges.is_empty() {
        return Err(EngineError::PreconditionUnmet(
            "no edge is selected".to_string(),
        ));
    }

    let mut report = HoleBatchReport::default();
    for (view, edge) in edges {
        let result = scene
            .edge_circle(view, edge)
            .ok_or(EngineError::GeometryRead {
                view: view.get(),
                element: edge,
            })
            .and_then(|circle| {
                if view == location.view {
                    Ok(circle)
                } else {
                    Err(EngineError::ForeignEdge {
                        view: view.get(),
                        element: edge,
                    })
                }
            })
            .and_then(|(center, radius)| {
                register_hole(scene.document_mut(), &location, options, view, edge, center, radius)
            });

        match result {
            Ok(hole) => {
                debug!(tag = %hole.tag, row = hole.row, edge = %edge, "已登记孔位");
                report.registered.push(hole);
            }
            Err(err) => {
                warn!(edge = %edge, error = %err, "跳过无法登记的边");
                report.failures.push(err);
            }
        }
    }

    scene.document_mut().recompute();
    info!(
        origin = location.origin.get(),
        registered = report.registered.len(),
        failed = report.failures.len(),
        "孔位登记完成"
    );
    Ok(report)
}

fn register_hole(
    document: &mut Document,
    location: &PageLocation,
    options: &RegistrarOptions,
    view: ObjectId,
    edge: SubElement,
    center: Point2,
    radius: f64,
) -> Result<RegisteredHole, EngineError> {
    let placement = document.view(location.view)?.placement;

    let (frame, store) = document.origin_with_store_mut(location.origin)?;
    let prefix = frame.label_prefix().to_string();
    let relative = frame.relative(center);
    let diameter = radius * 2.0;
    let ledger = frame.ledger_mut();
    let tag = ledger
        .append(&prefix, store, relative.x(), relative.y(), diameter)?
        .tag
        .clone();
    let row = ledger.last_row_index();

    let annotation = document.add_annotation(Annotation {
        text: tag.clone(),
        text_size: options.text_size,
        position: annotation_position(placement, center, radius, options.margin_left),
    });
    document.page_mut(location.page)?.add_view(annotation);

    Ok(RegisteredHole {
        view,
        edge,
        tag,
        row,
        relative,
        diameter,
        annotation,
    })
}
