pub mod axis_marker;
pub mod command;
pub mod lifecycle;
pub mod origin;
pub mod registrar;

pub mod errors {
    use std::fmt;

    use drilltable_core::document::SubElement;
    use drilltable_core::errors::DocumentError;
    use thiserror::Error;

    /// 查找失败的具体对象。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LookupFailure {
        NoOrigin,
        AmbiguousOrigin(usize),
        NoView,
        NoPage,
    }

    impl fmt::Display for LookupFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                LookupFailure::NoOrigin => f.write_str("no drill origin in document"),
                LookupFailure::AmbiguousOrigin(count) => {
                    write!(f, "expected one drill origin, found {count}")
                }
                LookupFailure::NoView => f.write_str("origin view is missing"),
                LookupFailure::NoPage => f.write_str("no page shows the origin view"),
            }
        }
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("precondition unmet: {0}")]
        PreconditionUnmet(String),
        #[error("origin construction failed: {reason}")]
        Construction {
            reason: String,
            #[source]
            source: Option<DocumentError>,
        },
        #[error("edge {element} on view {view} has no circular geometry")]
        GeometryRead { view: u64, element: SubElement },
        #[error("edge {element} belongs to view {view}, not the origin view")]
        ForeignEdge { view: u64, element: SubElement },
        #[error("lookup failed: {0}")]
        Lookup(LookupFailure),
        #[error(transparent)]
        Document(#[from] DocumentError),
    }

    impl EngineError {
        pub(crate) fn construction(reason: impl Into<String>) -> Self {
            EngineError::Construction {
                reason: reason.into(),
                source: None,
            }
        }
    }
}

pub mod scene {
    use drilltable_core::document::{
        AnnotationPage, Curve, Document, DocumentObject, DrawPage, DrawView, ObjectId, SubElement,
        ViewPlacement,
    };
    use drilltable_core::errors::DocumentError;
    use drilltable_core::geometry::Point2;
    use tracing::debug;

    use crate::errors::EngineError;
    use crate::lifecycle;

    /// 选中项：文档对象，以及可选的子元素（顶点或边）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SelectionItem {
        pub object: ObjectId,
        pub sub_element: Option<SubElement>,
    }

    impl SelectionItem {
        #[inline]
        pub fn object(object: ObjectId) -> Self {
            Self {
                object,
                sub_element: None,
            }
        }

        #[inline]
        pub fn sub_element(object: ObjectId, element: SubElement) -> Self {
            Self {
                object,
                sub_element: Some(element),
            }
        }
    }

    /// 解析后的选中顶点。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SelectedVertex {
        pub view: ObjectId,
        pub element: SubElement,
        pub point: Point2,
    }

    /// 引擎层负责维护 `Document` 和运行时选中集。
    ///
    /// 选中集保持选择顺序且不含重复项，批量登记孔位时按此顺序分配标签。
    #[derive(Debug)]
    pub struct Scene {
        document: Document,
        selected: Vec<SelectionItem>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DemoEntities {
        pub page: ObjectId,
        pub view: ObjectId,
        pub origin_vertex: SubElement,
        pub corner_vertex: SubElement,
        pub outline: SubElement,
        pub holes: [SubElement; 3],
    }

    impl Scene {
        pub fn new() -> Self {
            Self {
                document: Document::new(),
                selected: Vec::new(),
            }
        }

        /// 使用现有文档初始化场景。
        pub fn with_document(document: Document) -> Self {
            let mut scene = Self::new();
            scene.load_document(document);
            scene
        }

        /// 清空文档和选中状态。
        pub fn reset(&mut self) {
            self.document = Document::new();
            self.selected.clear();
        }

        /// 替换当前文档并重置选中集；载入的原点重新登记清理订阅并校正台账。
        pub fn load_document(&mut self, document: Document) {
            self.document = document;
            self.selected.clear();
            lifecycle::attach_loaded_origins(&mut self.document);
        }

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selected.len()
        }

        #[inline]
        pub fn is_selected(&self, item: SelectionItem) -> bool {
            self.selected.contains(&item)
        }

        fn validate(&self, item: SelectionItem) -> Result<(), EngineError> {
            let Some(object) = self.document.object(item.object) else {
                return Err(EngineError::EntityNotFound(item.object.get()));
            };
            if let Some(element) = item.sub_element {
                let found = match object {
                    DocumentObject::View(view) => view.has_sub_element(element),
                    _ => false,
                };
                if !found {
                    return Err(DocumentError::SubElementNotFound {
                        view: item.object.get(),
                        element,
                    }
                    .into());
                }
            }
            Ok(())
        }

        /// 选中整个对象。若对象不存在则返回错误。
        pub fn select(&mut self, id: ObjectId) -> Result<(), EngineError> {
            self.select_item(SelectionItem::object(id))
        }

        /// 选中视图上的顶点或边。
        pub fn select_sub_element(
            &mut self,
            view: ObjectId,
            element: SubElement,
        ) -> Result<(), EngineError> {
            self.select_item(SelectionItem::sub_element(view, element))
        }

        pub fn select_item(&mut self, item: SelectionItem) -> Result<(), EngineError> {
            self.validate(item)?;
            if !self.selected.contains(&item) {
                self.selected.push(item);
            }
            Ok(())
        }

        /// 取消选中，返回之前是否处于选中状态。
        pub fn deselect(&mut self, item: SelectionItem) -> bool {
            let before = self.selected.len();
            self.selected.retain(|existing| *existing != item);
            before != self.selected.len()
        }

        /// 切换选中状态，返回切换后的状态。
        pub fn toggle_selection(&mut self, item: SelectionItem) -> Result<bool, EngineError> {
            self.validate(item)?;
            if self.deselect(item) {
                Ok(false)
            } else {
                self.selected.push(item);
                Ok(true)
            }
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected.clear();
        }

        /// 按选择顺序返回选中项。
        #[inline]
        pub fn selection(&self) -> impl Iterator<Item = SelectionItem> + '_ {
            self.selected.iter().copied()
        }

        /// 选中的顶点子元素个数（不论能否解析为坐标）。
        pub fn selected_vertex_count(&self) -> usize {
            self.selected
                .iter()
                .filter(|item| item.sub_element.is_some_and(SubElement::is_vertex))
                .count()
        }

        /// 解析所有选中顶点的坐标。
        pub fn selected_vertices(&self) -> Result<Vec<SelectedVertex>, EngineError> {
            let mut vertices = Vec::new();
            for item in &self.selected {
                let Some(element @ SubElement::Vertex(index)) = item.sub_element else {
                    continue;
                };
                let view = self.document.view(item.object)?;
                let point = view.vertex(index).ok_or(DocumentError::SubElementNotFound {
                    view: item.object.get(),
                    element,
                })?;
                vertices.push(SelectedVertex {
                    view: item.object,
                    element,
                    point,
                });
            }
            Ok(vertices)
        }

        /// 按选择顺序返回选中的边。
        pub fn selected_edges(&self) -> Vec<(ObjectId, SubElement)> {
            self.selected
                .iter()
                .filter_map(|item| match item.sub_element {
                    Some(element) if element.is_edge() => Some((item.object, element)),
                    _ => None,
                })
                .collect()
        }

        /// 当前选中的绘图表面：第一个属于视图的选中项。
        pub fn selected_view(&self) -> Option<ObjectId> {
            self.selected.iter().map(|item| item.object).find(|id| {
                matches!(self.document.object(*id), Some(DocumentObject::View(_)))
            })
        }

        /// 若选中边可解析为圆，返回圆心与半径。
        pub fn edge_circle(&self, view: ObjectId, element: SubElement) -> Option<(Point2, f64)> {
            let SubElement::Edge(index) = element else {
                return None;
            };
            self.document
                .view(view)
                .ok()
                .and_then(|view| view.edge(index))
                .and_then(|edge| edge.curve.circle())
        }

        /// 从文档中删除对象，同时清理引用它的选中项。
        pub fn remove_object(&mut self, id: ObjectId) -> Result<DocumentObject, EngineError> {
            let object = self.document.remove_object(id)?;
            self.selected.retain(|item| item.object != id);
            debug!(object = id.get(), kind = %object.kind(), "已删除文档对象");
            Ok(object)
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn document_mut(&mut self) -> &mut Document {
            &mut self.document
        }

        /// 为 CLI / 快速验证填充一张带孔零件视图，返回关键对象。
        pub fn populate_demo(&mut self) -> DemoEntities {
            use std::f64::consts::PI;

            self.clear_selection();

            let mut front = DrawView::new("Front", ViewPlacement::new(120.0, 160.0, 0.5));
            let corner_vertex = front.add_vertex(Point2::new(0.0, 0.0));
            let origin_vertex = front.add_vertex(Point2::new(100.0, 50.0));
            let outline = front.add_edge(Curve::Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(200.0, 0.0),
            });
            let holes = [
                front.add_edge(Curve::Circle {
                    center: Point2::new(130.0, 80.0),
                    radius: 5.0,
                }),
                front.add_edge(Curve::Circle {
                    center: Point2::new(160.0, 80.0),
                    radius: 5.0,
                }),
                front.add_edge(Curve::Arc {
                    center: Point2::new(145.0, 120.0),
                    radius: 3.25,
                    start_angle: 0.0,
                    end_angle: PI,
                }),
            ];
            let view = self.document.add_object(DocumentObject::View(front));

            let mut drawing = DrawPage::new("Page");
            drawing.add_view(view);
            let page = self.document.add_object(DocumentObject::Page(drawing));

            let ids = DemoEntities {
                page,
                view,
                origin_vertex,
                corner_vertex,
                outline,
                holes,
            };

            debug!(
                page = ids.page.get(),
                view = ids.view.get(),
                origin_vertex = %ids.origin_vertex,
                "已创建演示视图"
            );

            ids
        }
    }

    impl Default for Scene {
        fn default() -> Self {
            Self::new()
        }
    }

}
