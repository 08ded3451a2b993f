use drilltable_core::document::{
    Document, DocumentObject, DocumentObserver, DrawingSurface, ObjectId, OriginFrame,
};
use drilltable_core::errors::DocumentError;
use drilltable_core::ledger::Ledger;
use tracing::{debug, info, warn};

/// 原点被删除时清除其在视图上绘制的轴标记。
///
/// 只处理修饰线；台账行与孔位注释保持不动。
#[derive(Debug, Default)]
pub struct OriginCleanup;

impl DocumentObserver for OriginCleanup {
    fn slot_deleted_object(
        &mut self,
        document: &mut Document,
        id: ObjectId,
        object: &DocumentObject,
    ) {
        let DocumentObject::DrillOrigin(frame) = object else {
            return;
        };
        match remove_glyph(document, frame) {
            Ok(removed) => debug!(origin = id.get(), removed, "已清除原点轴标记"),
            Err(err) => warn!(origin = id.get(), error = %err, "无法清除原点轴标记"),
        }
    }
}

/// 为原点登记删除订阅，生命周期与该原点一致。
pub fn watch_origin(document: &mut Document, origin: ObjectId) {
    document.subscribe(origin, Box::new(OriginCleanup));
}

/// 文档载入后恢复运行时状态：为尚未订阅的原点补登清理订阅，并按台账存储校正计数器。
///
/// 订阅不随文档持久化，因此每次载入都要调用。返回补登订阅的原点数量。
pub fn attach_loaded_origins(document: &mut Document) -> usize {
    let origins: Vec<ObjectId> = document.drill_origins().map(|(id, _)| id).collect();
    let mut attached = 0;
    for origin in origins {
        if document.subscription_count(origin) == 0 {
            watch_origin(document, origin);
            attached += 1;
        }
        if let Err(err) = reconcile_ledger(document, origin) {
            warn!(origin = origin.get(), error = %err, "无法校正原点台账");
        }
    }
    if attached > 0 {
        info!(attached, "已恢复原点清理订阅");
    }
    attached
}

/// 以台账存储为准重建计数器。存储中的行号或标签编号领先时（旧文档、外部编辑）采用重建结果，
/// 否则保留原台账。返回是否发生替换。
pub fn reconcile_ledger(
    document: &mut Document,
    origin: ObjectId,
) -> Result<bool, DocumentError> {
    let (frame, store) = document.origin_with_store_mut(origin)?;
    let rebuilt = Ledger::from_store(frame.ledger().store_id(), frame.label_prefix(), &*store);
    if rebuilt.next_index() <= frame.ledger().next_index() {
        return Ok(false);
    }
    debug!(
        origin = origin.get(),
        from = frame.ledger().next_index(),
        to = rebuilt.next_index(),
        "台账计数器落后于存储，已按存储重建"
    );
    *frame.ledger_mut() = rebuilt;
    Ok(true)
}

/// 从宿主视图移除原点拥有的全部修饰线，返回实际移除的数量。
pub fn remove_glyph(document: &mut Document, frame: &OriginFrame) -> Result<usize, DocumentError> {
    let view = document.view_mut(frame.host_view())?;
    let mut removed = 0;
    for line in frame.glyph_segments() {
        match view.remove_cosmetic_edge(*line) {
            Ok(()) => removed += 1,
            Err(err) => warn!(line = %line, error = %err, "修饰线已不存在"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use drilltable_core::document::{LineStyle, ViewPlacement};
    use drilltable_core::geometry::Point2;
    use drilltable_core::sheet::{CellAddress, LedgerStore};

    use super::*;
    use crate::axis_marker::{AxisMarkerBuilder, SEGMENT_COUNT};

    fn origin_with_glyph(document: &mut Document) -> (ObjectId, ObjectId, ObjectId) {
        let view = document.add_view("Front", ViewPlacement::default());
        let sheet = document.add_sheet("DrillTable");
        let Ok(surface) = document.view_mut(view) else {
            panic!("view missing");
        };
        let lines = AxisMarkerBuilder::new()
            .build(Point2::new(10.0, 10.0), surface)
            .expect("build marker");
        let origin = document.add_drill_origin(OriginFrame::new(
            "A",
            Point2::new(10.0, 10.0),
            view,
            lines,
            Ledger::new(sheet),
        ));
        (view, sheet, origin)
    }

    #[test]
    fn deleting_origin_removes_only_its_lines() {
        let mut document = Document::new();
        let (view, _, origin) = origin_with_glyph(&mut document);
        let unrelated = document
            .view_mut(view)
            .unwrap()
            .make_cosmetic_line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), LineStyle::Solid)
            .unwrap();
        watch_origin(&mut document, origin);
        assert_eq!(document.view(view).unwrap().cosmetic_len(), SEGMENT_COUNT + 1);

        document.remove_object(origin).unwrap();
        let view = document.view(view).unwrap();
        assert_eq!(view.cosmetic_len(), 1);
        assert!(view.cosmetic_line(unrelated).is_some());
        assert_eq!(document.subscription_count(origin), 0);
    }

    #[test]
    fn unwatched_origin_keeps_lines() {
        let mut document = Document::new();
        let (view, _, origin) = origin_with_glyph(&mut document);
        document.remove_object(origin).unwrap();
        assert_eq!(document.view(view).unwrap().cosmetic_len(), SEGMENT_COUNT);
    }

    #[test]
    fn observer_ignores_other_objects() {
        let mut document = Document::new();
        let (view, sheet, _) = origin_with_glyph(&mut document);
        document.subscribe(sheet, Box::new(OriginCleanup));
        document.remove_object(sheet).unwrap();
        assert_eq!(document.view(view).unwrap().cosmetic_len(), SEGMENT_COUNT);
    }

    #[test]
    fn missing_view_is_reported() {
        let mut document = Document::new();
        let (view, _, origin) = origin_with_glyph(&mut document);
        document.remove_object(view).unwrap();
        let frame = document.drill_origin(origin).unwrap().clone();
        let err = remove_glyph(&mut document, &frame).unwrap_err();
        assert_eq!(err, DocumentError::ObjectNotFound(view.get()));
    }

    #[test]
    fn reloaded_origin_is_watched_again() {
        let mut document = Document::new();
        let (view, _, origin) = origin_with_glyph(&mut document);
        watch_origin(&mut document, origin);

        let json = serde_json::to_string(&document).expect("serialize document");
        let mut restored: Document = serde_json::from_str(&json).expect("deserialize document");
        assert_eq!(restored.subscription_count(origin), 0);

        assert_eq!(attach_loaded_origins(&mut restored), 1);
        assert_eq!(attach_loaded_origins(&mut restored), 0);
        assert_eq!(restored.subscription_count(origin), 1);

        restored.remove_object(origin).unwrap();
        assert_eq!(restored.view(view).unwrap().cosmetic_len(), 0);
    }

    #[test]
    fn ledger_behind_its_store_is_rebuilt() {
        let mut document = Document::new();
        let (_, sheet, origin) = origin_with_glyph(&mut document);
        {
            let store = document.sheet_mut(sheet).unwrap();
            Ledger::write_header(store);
            for (column, value) in ["A1", "3", "4", "5"].iter().enumerate() {
                store.set(CellAddress::new(column as u32, 2), value);
            }
        }

        assert!(reconcile_ledger(&mut document, origin).unwrap());
        let ledger = document.drill_origin(origin).unwrap().ledger();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.next_tag("A"), "A2");

        assert!(!reconcile_ledger(&mut document, origin).unwrap());
    }
}
