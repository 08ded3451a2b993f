pub mod geometry {
    use std::ops::{Add, Mul, Neg};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。图纸坐标为双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub const fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    /// 二维向量。箭头构造中作为"预缩放"的偏移量使用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub const fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl Add for Vector2 {
        type Output = Vector2;

        fn add(self, rhs: Vector2) -> Vector2 {
            Vector2(self.0 + rhs.0)
        }
    }

    impl Mul<f64> for Vector2 {
        type Output = Vector2;

        fn mul(self, rhs: f64) -> Vector2 {
            Vector2(self.0 * rhs)
        }
    }

    impl Neg for Vector2 {
        type Output = Vector2;

        fn neg(self) -> Vector2 {
            Vector2(-self.0)
        }
    }

    /// 有向线段。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Segment {
        pub start: Point2,
        pub end: Point2,
    }

    impl Segment {
        #[inline]
        pub fn new(start: Point2, end: Point2) -> Self {
            Self { start, end }
        }
    }

    /// 点偏移：向量加法。
    #[inline]
    pub fn offset(origin: Point2, delta: Vector2) -> Point2 {
        origin.translate(delta)
    }

    /// 箭头字形的固定比例。
    ///
    /// 箭杆沿 `perp` 方向从原点伸出；箭头从箭杆中部（`opening`）沿 `axis` 方向指出，
    /// 两根倒刺在 `barb_reach` 处向两侧各张开 `barb_spread`。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ArrowShape {
        pub shaft_length: f64,
        pub opening: f64,
        pub tip_reach: f64,
        pub barb_reach: f64,
        pub barb_spread: f64,
    }

    impl ArrowShape {
        /// 既有图纸使用的字形尺寸，需逐位复现才能与旧图纸视觉一致。
        pub const REFERENCE: ArrowShape = ArrowShape {
            shaft_length: 10.0,
            opening: 5.0,
            tip_reach: 10.0,
            barb_reach: 7.0,
            barb_spread: 1.0,
        };

        /// 箭头尖端相对原点的偏移。
        #[inline]
        pub fn tip(&self, axis: Vector2, perp: Vector2) -> Vector2 {
            perp * self.opening + axis * self.tip_reach
        }
    }

    impl Default for ArrowShape {
        fn default() -> Self {
            Self::REFERENCE
        }
    }

    /// 构造一支箭头的四段线：箭杆、箭身，以及两根倒刺。
    ///
    /// `axis` 为箭头指向，`perp` 为箭杆方向，二者均为调用方给出的偏移向量，
    /// 实际长度由 `shape` 中的倍数决定。
    pub fn arrow_glyph(
        origin: Point2,
        axis: Vector2,
        perp: Vector2,
        shape: &ArrowShape,
    ) -> [Segment; 4] {
        let shaft_end = offset(origin, perp * shape.shaft_length);
        let opening = offset(origin, perp * shape.opening);
        let tip = offset(origin, shape.tip(axis, perp));
        let barb_near = offset(
            origin,
            perp * (shape.opening - shape.barb_spread) + axis * shape.barb_reach,
        );
        let barb_far = offset(
            origin,
            perp * (shape.opening + shape.barb_spread) + axis * shape.barb_reach,
        );
        [
            Segment::new(origin, shaft_end),
            Segment::new(opening, tip),
            Segment::new(tip, barb_near),
            Segment::new(tip, barb_far),
        ]
    }

}

pub mod errors {
    use thiserror::Error;

    use crate::document::{LineRef, ObjectKind, SubElement};

    #[derive(Debug, Error, PartialEq)]
    pub enum DocumentError {
        #[error("object with id {0} not found")]
        ObjectNotFound(u64),
        #[error("object {id} is a {actual}, expected a {expected}")]
        UnexpectedKind {
            id: u64,
            expected: ObjectKind,
            actual: ObjectKind,
        },
        #[error("sub-element {element} not found on view {view}")]
        SubElementNotFound { view: u64, element: SubElement },
        #[error("cosmetic line {0} not found")]
        CosmeticLineNotFound(LineRef),
        #[error("cosmetic line has non-finite coordinates")]
        NonFiniteGeometry,
        #[error("invalid cell address `{0}`")]
        InvalidCellAddress(String),
        #[error("invalid sub-element name `{0}`")]
        InvalidSubElement(String),
        #[error("ledger row counter exhausted at {0}")]
        LedgerExhausted(u32),
    }
}

pub mod sheet {
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};

    use crate::errors::DocumentError;

    /// 单元格地址：字母列 + 从 1 开始的行号，例如 `D7`。
    ///
    /// 排序按先行后列，便于取"最后使用的行"。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(into = "String", try_from = "String")]
    pub struct CellAddress {
        row: u32,
        column: u32,
    }

    impl CellAddress {
        /// `column` 从 0 开始（0 = A），`row` 从 1 开始。
        #[inline]
        pub const fn new(column: u32, row: u32) -> Self {
            Self { row, column }
        }

        #[inline]
        pub fn row(self) -> u32 {
            self.row
        }

        #[inline]
        pub fn column(self) -> u32 {
            self.column
        }

        pub fn column_letters(self) -> String {
            let mut letters = Vec::new();
            let mut remaining = self.column + 1;
            while remaining > 0 {
                let rem = (remaining - 1) % 26;
                letters.push(char::from(b'A' + rem as u8));
                remaining = (remaining - 1) / 26;
            }
            letters.iter().rev().collect()
        }
    }

    impl fmt::Display for CellAddress {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}{}", self.column_letters(), self.row)
        }
    }

    impl FromStr for CellAddress {
        type Err = DocumentError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let invalid = || DocumentError::InvalidCellAddress(s.to_string());
            let split = s
                .find(|c: char| c.is_ascii_digit())
                .ok_or_else(invalid)?;
            let (letters, digits) = s.split_at(split);
            if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(invalid());
            }
            let row: u32 = digits.parse().map_err(|_| invalid())?;
            if row == 0 {
                return Err(invalid());
            }
            let mut column: u32 = 0;
            for byte in letters.bytes() {
                column = column
                    .checked_mul(26)
                    .and_then(|value| value.checked_add(u32::from(byte - b'A') + 1))
                    .ok_or_else(invalid)?;
            }
            Ok(Self::new(column - 1, row))
        }
    }

    impl From<CellAddress> for String {
        fn from(value: CellAddress) -> Self {
            value.to_string()
        }
    }

    impl TryFrom<String> for CellAddress {
        type Error = DocumentError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    /// 台账存储接口（表格式），仅建模按地址读写的约定。
    pub trait LedgerStore {
        fn set(&mut self, cell: CellAddress, value: &str);
        fn get(&self, cell: CellAddress) -> Option<&str>;
        /// 按先行后列排序返回所有非空单元格。
        fn used_cells(&self) -> Vec<CellAddress>;
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Spreadsheet {
        pub label: String,
        cells: BTreeMap<CellAddress, String>,
    }

    impl Spreadsheet {
        pub fn new(label: impl Into<String>) -> Self {
            Self {
                label: label.into(),
                cells: BTreeMap::new(),
            }
        }

        /// 返回最后一个非空单元格所在行；空表返回 `None`。
        pub fn last_used_row(&self) -> Option<u32> {
            self.cells.keys().next_back().map(|cell| cell.row())
        }
    }

    impl LedgerStore for Spreadsheet {
        /// 写入空字符串等同于清除单元格。
        fn set(&mut self, cell: CellAddress, value: &str) {
            if value.is_empty() {
                self.cells.remove(&cell);
            } else {
                self.cells.insert(cell, value.to_string());
            }
        }

        fn get(&self, cell: CellAddress) -> Option<&str> {
            self.cells.get(&cell).map(String::as_str)
        }

        fn used_cells(&self) -> Vec<CellAddress> {
            self.cells.keys().copied().collect()
        }
    }

}

pub mod ledger {
    use serde::{Deserialize, Serialize};

    use std::collections::BTreeSet;

    use crate::document::ObjectId;
    use crate::errors::DocumentError;
    use crate::sheet::{CellAddress, LedgerStore};

    pub const TAG_COLUMN: u32 = 0;
    pub const X_COLUMN: u32 = 1;
    pub const Y_COLUMN: u32 = 2;
    pub const SIZE_COLUMN: u32 = 3;
    pub const HEADER_ROW: u32 = 1;
    pub const HEADER: [&str; 4] = ["TAG", "X LOC", "Y LOC", "SIZE"];

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LedgerRow {
        pub tag: String,
        pub rel_x: f64,
        pub rel_y: f64,
        pub diameter: f64,
    }

    /// 某一原点下的孔位台账，只追加不删除。
    ///
    /// `next_index` 为下一个标签的数字部分（从 1 开始）；标签 `n` 写在存储的第 `n + 1` 行，
    /// 第 1 行为表头。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ledger {
        store: ObjectId,
        rows: Vec<LedgerRow>,
        next_index: u32,
    }

    impl Ledger {
        pub fn new(store: ObjectId) -> Self {
            Self {
                store,
                rows: Vec::new(),
                next_index: 1,
            }
        }

        /// 在新建的存储上写入四列表头。
        pub fn write_header<S>(store: &mut S)
        where
            S: LedgerStore + ?Sized,
        {
            for (column, title) in HEADER.iter().enumerate() {
                store.set(CellAddress::new(column as u32, HEADER_ROW), title);
            }
        }

        /// 从既有存储重建台账。
        ///
        /// 计数器取"最后使用行号"与"同前缀标签最大编号 + 1"中的较大者，到 `u32::MAX` 为止。
        /// 只遍历实际有内容的行。
        pub fn from_store<S>(store_id: ObjectId, label_prefix: &str, store: &S) -> Self
        where
            S: LedgerStore + ?Sized,
        {
            let used_rows: BTreeSet<u32> = store
                .used_cells()
                .into_iter()
                .map(|cell| cell.row())
                .collect();
            let last_row = used_rows
                .last()
                .copied()
                .unwrap_or(HEADER_ROW)
                .max(HEADER_ROW);

            let mut rows = Vec::new();
            let mut max_suffix: u32 = 0;
            for row in used_rows.range((HEADER_ROW + 1)..) {
                let row = *row;
                let Some(tag) = store.get(CellAddress::new(TAG_COLUMN, row)) else {
                    continue;
                };
                if let Some(suffix) = tag
                    .strip_prefix(label_prefix)
                    .and_then(|rest| rest.parse::<u32>().ok())
                {
                    max_suffix = max_suffix.max(suffix);
                }
                let number = |column| {
                    store
                        .get(CellAddress::new(column, row))
                        .and_then(|value| value.trim().parse::<f64>().ok())
                };
                if let (Some(rel_x), Some(rel_y), Some(diameter)) =
                    (number(X_COLUMN), number(Y_COLUMN), number(SIZE_COLUMN))
                {
                    rows.push(LedgerRow {
                        tag: tag.to_string(),
                        rel_x,
                        rel_y,
                        diameter,
                    });
                }
            }

            Self {
                store: store_id,
                rows,
                next_index: last_row.max(max_suffix.saturating_add(1)),
            }
        }

        #[inline]
        pub fn store_id(&self) -> ObjectId {
            self.store
        }

        #[inline]
        pub fn rows(&self) -> &[LedgerRow] {
            &self.rows
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.rows.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.rows.is_empty()
        }

        #[inline]
        pub fn next_index(&self) -> u32 {
            self.next_index
        }

        /// 最后一个已用行号（只有表头时为 1），只读不改变状态。
        #[inline]
        pub fn last_row_index(&self) -> u32 {
            self.next_index
        }

        pub fn next_tag(&self, label_prefix: &str) -> String {
            format!("{label_prefix}{}", self.next_index)
        }

        /// 追加一行并写入存储的 A–D 列，返回新行。
        ///
        /// 行号无法再增加时返回错误，存储保持不变。
        pub fn append<S>(
            &mut self,
            label_prefix: &str,
            store: &mut S,
            rel_x: f64,
            rel_y: f64,
            diameter: f64,
        ) -> Result<&LedgerRow, DocumentError>
        where
            S: LedgerStore + ?Sized,
        {
            let row = self
                .next_index
                .checked_add(1)
                .ok_or(DocumentError::LedgerExhausted(self.next_index))?;
            let tag = self.next_tag(label_prefix);
            store.set(CellAddress::new(TAG_COLUMN, row), &tag);
            store.set(CellAddress::new(X_COLUMN, row), &format_number(rel_x));
            store.set(CellAddress::new(Y_COLUMN, row), &format_number(rel_y));
            store.set(CellAddress::new(SIZE_COLUMN, row), &format_number(diameter));

            self.next_index = row;
            self.rows.push(LedgerRow {
                tag,
                rel_x,
                rel_y,
                diameter,
            });
            Ok(&self.rows[self.rows.len() - 1])
        }
    }

    /// 数值写入单元格时使用最短往返十进制表示。
    #[inline]
    pub fn format_number(value: f64) -> String {
        format!("{value}")
    }

}

pub mod document {
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};

    use crate::errors::DocumentError;
    use crate::geometry::{Point2, Segment, Vector2};
    use crate::ledger::Ledger;
    use crate::sheet::Spreadsheet;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ObjectId(u64);

    impl ObjectId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for ObjectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    /// 修饰线句柄，由所在视图分配。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct LineRef(u64);

    impl LineRef {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for LineRef {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "CE{}", self.0)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum LineStyle {
        /// 实线。
        Solid,
        /// 沿用宿主的默认修饰线样式。
        #[default]
        HostDefault,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct CosmeticLine {
        pub segment: Segment,
        pub style: LineStyle,
    }

    /// 视图在图纸页上的放置位置与缩放。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct ViewPlacement {
        pub x: f64,
        pub y: f64,
        pub scale: f64,
    }

    impl ViewPlacement {
        #[inline]
        pub fn new(x: f64, y: f64, scale: f64) -> Self {
            Self { x, y, scale }
        }
    }

    impl Default for ViewPlacement {
        fn default() -> Self {
            Self {
                x: 0.0,
                y: 0.0,
                scale: 1.0,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum Curve {
        Line {
            start: Point2,
            end: Point2,
        },
        Circle {
            center: Point2,
            radius: f64,
        },
        /// 圆弧的底层曲线仍是圆，角度以弧度储存。
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        },
    }

    impl Curve {
        /// 圆与圆弧返回 `(圆心, 半径)`，其他曲线返回 `None`。
        pub fn circle(&self) -> Option<(Point2, f64)> {
            match *self {
                Curve::Circle { center, radius } | Curve::Arc { center, radius, .. } => {
                    Some((center, radius))
                }
                Curve::Line { .. } => None,
            }
        }

        #[inline]
        pub fn is_circular(&self) -> bool {
            self.circle().is_some()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Edge {
        pub curve: Curve,
    }

    /// 视图内的子元素，按宿主惯例以 1 起编号（`Vertex1`、`Edge3`）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum SubElement {
        Vertex(usize),
        Edge(usize),
    }

    impl SubElement {
        #[inline]
        pub fn is_vertex(self) -> bool {
            matches!(self, SubElement::Vertex(_))
        }

        #[inline]
        pub fn is_edge(self) -> bool {
            matches!(self, SubElement::Edge(_))
        }
    }

    impl fmt::Display for SubElement {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                SubElement::Vertex(index) => write!(f, "Vertex{index}"),
                SubElement::Edge(index) => write!(f, "Edge{index}"),
            }
        }
    }

    impl FromStr for SubElement {
        type Err = DocumentError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let invalid = || DocumentError::InvalidSubElement(s.to_string());
            let (kind, digits): (fn(usize) -> SubElement, &str) =
                if let Some(rest) = s.strip_prefix("Vertex") {
                    (SubElement::Vertex, rest)
                } else if let Some(rest) = s.strip_prefix("Edge") {
                    (SubElement::Edge, rest)
                } else {
                    return Err(invalid());
                };
            match digits.parse::<usize>() {
                Ok(index) if index > 0 => Ok(kind(index)),
                _ => Err(invalid()),
            }
        }
    }

    /// 绘图表面：读取放置参数，创建与移除修饰线。
    pub trait DrawingSurface {
        fn placement(&self) -> ViewPlacement;
        fn make_cosmetic_line(
            &mut self,
            start: Point2,
            end: Point2,
            style: LineStyle,
        ) -> Result<LineRef, DocumentError>;
        fn remove_cosmetic_edge(&mut self, line: LineRef) -> Result<(), DocumentError>;
    }

    /// 图纸页：承载视图与注释。
    pub trait AnnotationPage {
        fn add_view(&mut self, view: ObjectId);
        fn contains_view(&self, view: ObjectId) -> bool;
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct DrawView {
        pub label: String,
        pub placement: ViewPlacement,
        vertices: Vec<Point2>,
        edges: Vec<Edge>,
        cosmetic: Vec<(LineRef, CosmeticLine)>,
        next_line: u64,
    }

    impl DrawView {
        pub fn new(label: impl Into<String>, placement: ViewPlacement) -> Self {
            Self {
                label: label.into(),
                placement,
                ..Self::default()
            }
        }

        pub fn add_vertex(&mut self, point: Point2) -> SubElement {
            self.vertices.push(point);
            SubElement::Vertex(self.vertices.len())
        }

        pub fn add_edge(&mut self, curve: Curve) -> SubElement {
            self.edges.push(Edge { curve });
            SubElement::Edge(self.edges.len())
        }

        pub fn vertex(&self, index: usize) -> Option<Point2> {
            index
                .checked_sub(1)
                .and_then(|slot| self.vertices.get(slot))
                .copied()
        }

        pub fn edge(&self, index: usize) -> Option<&Edge> {
            index.checked_sub(1).and_then(|slot| self.edges.get(slot))
        }

        pub fn has_sub_element(&self, element: SubElement) -> bool {
            match element {
                SubElement::Vertex(index) => self.vertex(index).is_some(),
                SubElement::Edge(index) => self.edge(index).is_some(),
            }
        }

        pub fn cosmetic_line(&self, line: LineRef) -> Option<&CosmeticLine> {
            self.cosmetic
                .iter()
                .find_map(|(id, cosmetic)| (*id == line).then_some(cosmetic))
        }

        /// 按创建顺序遍历修饰线。
        pub fn cosmetic_lines(&self) -> impl Iterator<Item = &(LineRef, CosmeticLine)> {
            self.cosmetic.iter()
        }

        #[inline]
        pub fn cosmetic_len(&self) -> usize {
            self.cosmetic.len()
        }
    }

    impl DrawingSurface for DrawView {
        fn placement(&self) -> ViewPlacement {
            self.placement
        }

        fn make_cosmetic_line(
            &mut self,
            start: Point2,
            end: Point2,
            style: LineStyle,
        ) -> Result<LineRef, DocumentError> {
            if !start.is_finite() || !end.is_finite() {
                return Err(DocumentError::NonFiniteGeometry);
            }
            let line = LineRef::new(self.next_line);
            self.next_line += 1;
            self.cosmetic.push((
                line,
                CosmeticLine {
                    segment: Segment::new(start, end),
                    style,
                },
            ));
            Ok(line)
        }

        fn remove_cosmetic_edge(&mut self, line: LineRef) -> Result<(), DocumentError> {
            let position = self
                .cosmetic
                .iter()
                .position(|(id, _)| *id == line)
                .ok_or(DocumentError::CosmeticLineNotFound(line))?;
            self.cosmetic.remove(position);
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct DrawPage {
        pub label: String,
        views: Vec<ObjectId>,
    }

    impl DrawPage {
        pub fn new(label: impl Into<String>) -> Self {
            Self {
                label: label.into(),
                views: Vec::new(),
            }
        }

        pub fn views(&self) -> &[ObjectId] {
            &self.views
        }
    }

    impl AnnotationPage for DrawPage {
        fn add_view(&mut self, view: ObjectId) {
            if !self.views.contains(&view) {
                self.views.push(view);
            }
        }

        fn contains_view(&self, view: ObjectId) -> bool {
            self.views.contains(&view)
        }
    }

    /// 放置在图纸页上的文字注释。与台账行之间没有反向引用。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Annotation {
        pub text: String,
        pub text_size: f64,
        pub position: Point2,
    }

    /// 钻孔表的坐标原点。
    ///
    /// 原点坐标与宿主视图在构造后不可变；`glyph_segments` 是该原点在图纸上拥有的全部修饰线。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct OriginFrame {
        label_prefix: String,
        origin: Point2,
        host_view: ObjectId,
        glyph_segments: Vec<LineRef>,
        ledger: Ledger,
    }

    impl OriginFrame {
        pub fn new(
            label_prefix: impl Into<String>,
            origin: Point2,
            host_view: ObjectId,
            glyph_segments: Vec<LineRef>,
            ledger: Ledger,
        ) -> Self {
            Self {
                label_prefix: label_prefix.into(),
                origin,
                host_view,
                glyph_segments,
                ledger,
            }
        }

        #[inline]
        pub fn label_prefix(&self) -> &str {
            &self.label_prefix
        }

        #[inline]
        pub fn origin(&self) -> Point2 {
            self.origin
        }

        #[inline]
        pub fn host_view(&self) -> ObjectId {
            self.host_view
        }

        #[inline]
        pub fn glyph_segments(&self) -> &[LineRef] {
            &self.glyph_segments
        }

        #[inline]
        pub fn ledger(&self) -> &Ledger {
            &self.ledger
        }

        #[inline]
        pub fn ledger_mut(&mut self) -> &mut Ledger {
            &mut self.ledger
        }

        /// 图纸坐标转换为相对原点的坐标。
        #[inline]
        pub fn relative(&self, point: Point2) -> Vector2 {
            self.origin.vector_to(point)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ObjectKind {
        View,
        Page,
        Sheet,
        Annotation,
        DrillOrigin,
    }

    impl fmt::Display for ObjectKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                ObjectKind::View => "view",
                ObjectKind::Page => "page",
                ObjectKind::Sheet => "sheet",
                ObjectKind::Annotation => "annotation",
                ObjectKind::DrillOrigin => "drill origin",
            };
            f.write_str(name)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum DocumentObject {
        View(DrawView),
        Page(DrawPage),
        Sheet(Spreadsheet),
        Annotation(Annotation),
        DrillOrigin(OriginFrame),
    }

    impl DocumentObject {
        pub fn kind(&self) -> ObjectKind {
            match self {
                DocumentObject::View(_) => ObjectKind::View,
                DocumentObject::Page(_) => ObjectKind::Page,
                DocumentObject::Sheet(_) => ObjectKind::Sheet,
                DocumentObject::Annotation(_) => ObjectKind::Annotation,
                DocumentObject::DrillOrigin(_) => ObjectKind::DrillOrigin,
            }
        }
    }

    /// 文档删除通知的接收者。
    pub trait DocumentObserver {
        fn slot_deleted_object(
            &mut self,
            document: &mut Document,
            id: ObjectId,
            object: &DocumentObject,
        );
    }

    struct Subscription {
        target: ObjectId,
        observer: Box<dyn DocumentObserver>,
    }

    /// 按对象登记的删除订阅，仅存在于运行时；对象删除时随之注销。
    #[derive(Default)]
    struct Subscriptions {
        entries: Vec<Subscription>,
    }

    impl fmt::Debug for Subscriptions {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Subscriptions")
                .field("count", &self.entries.len())
                .finish()
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Document {
        objects: Vec<(ObjectId, DocumentObject)>,
        next_object_id: u64,
        generation: u64,
        #[serde(skip)]
        subscriptions: Subscriptions,
    }

    macro_rules! typed_lookup {
        ($get:ident, $get_mut:ident, $variant:ident, $ty:ty, $kind:expr) => {
            pub fn $get(&self, id: ObjectId) -> Result<&$ty, DocumentError> {
                match self.object(id) {
                    Some(DocumentObject::$variant(inner)) => Ok(inner),
                    Some(other) => Err(DocumentError::UnexpectedKind {
                        id: id.get(),
                        expected: $kind,
                        actual: other.kind(),
                    }),
                    None => Err(DocumentError::ObjectNotFound(id.get())),
                }
            }

            pub fn $get_mut(&mut self, id: ObjectId) -> Result<&mut $ty, DocumentError> {
                match self.object_mut(id) {
                    Some(DocumentObject::$variant(inner)) => Ok(inner),
                    Some(other) => Err(DocumentError::UnexpectedKind {
                        id: id.get(),
                        expected: $kind,
                        actual: other.kind(),
                    }),
                    None => Err(DocumentError::ObjectNotFound(id.get())),
                }
            }
        };
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        fn next_id(&mut self) -> ObjectId {
            let id = ObjectId::new(self.next_object_id);
            self.next_object_id += 1;
            id
        }

        pub fn add_object(&mut self, object: DocumentObject) -> ObjectId {
            let id = self.next_id();
            self.objects.push((id, object));
            id
        }

        pub fn add_view(&mut self, label: impl Into<String>, placement: ViewPlacement) -> ObjectId {
            self.add_object(DocumentObject::View(DrawView::new(label, placement)))
        }

        pub fn add_page(&mut self, label: impl Into<String>) -> ObjectId {
            self.add_object(DocumentObject::Page(DrawPage::new(label)))
        }

        pub fn add_sheet(&mut self, label: impl Into<String>) -> ObjectId {
            self.add_object(DocumentObject::Sheet(Spreadsheet::new(label)))
        }

        pub fn add_annotation(&mut self, annotation: Annotation) -> ObjectId {
            self.add_object(DocumentObject::Annotation(annotation))
        }

        pub fn add_drill_origin(&mut self, frame: OriginFrame) -> ObjectId {
            self.add_object(DocumentObject::DrillOrigin(frame))
        }

        pub fn object(&self, id: ObjectId) -> Option<&DocumentObject> {
            self.objects
                .iter()
                .find_map(|(object_id, object)| (*object_id == id).then_some(object))
        }

        pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut DocumentObject> {
            self.objects
                .iter_mut()
                .find_map(|(object_id, object)| (*object_id == id).then_some(object))
        }

        #[inline]
        pub fn contains(&self, id: ObjectId) -> bool {
            self.object(id).is_some()
        }

        #[inline]
        pub fn objects(&self) -> impl Iterator<Item = &(ObjectId, DocumentObject)> {
            self.objects.iter()
        }

        typed_lookup!(view, view_mut, View, DrawView, ObjectKind::View);
        typed_lookup!(page, page_mut, Page, DrawPage, ObjectKind::Page);
        typed_lookup!(sheet, sheet_mut, Sheet, Spreadsheet, ObjectKind::Sheet);
        typed_lookup!(
            annotation,
            annotation_mut,
            Annotation,
            Annotation,
            ObjectKind::Annotation
        );
        typed_lookup!(
            drill_origin,
            drill_origin_mut,
            DrillOrigin,
            OriginFrame,
            ObjectKind::DrillOrigin
        );

        pub fn drill_origins(&self) -> impl Iterator<Item = (ObjectId, &OriginFrame)> {
            self.objects.iter().filter_map(|(id, object)| match object {
                DocumentObject::DrillOrigin(frame) => Some((*id, frame)),
                _ => None,
            })
        }

        pub fn annotations(&self) -> impl Iterator<Item = (ObjectId, &Annotation)> {
            self.objects.iter().filter_map(|(id, object)| match object {
                DocumentObject::Annotation(annotation) => Some((*id, annotation)),
                _ => None,
            })
        }

        /// 返回展示指定视图的所有图纸页。
        pub fn pages_showing(&self, view: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
            self.objects
                .iter()
                .filter_map(move |(id, object)| match object {
                    DocumentObject::Page(page) if page.contains_view(view) => Some(*id),
                    _ => None,
                })
        }

        /// 同时借出原点与其台账存储，供追加行时使用。
        pub fn origin_with_store_mut(
            &mut self,
            origin: ObjectId,
        ) -> Result<(&mut OriginFrame, &mut Spreadsheet), DocumentError> {
            let store = self.drill_origin(origin)?.ledger().store_id();
            // 确认存储存在且类型正确
            self.sheet(store)?;

            let mut frame = None;
            let mut sheet = None;
            for (id, object) in self.objects.iter_mut() {
                match object {
                    DocumentObject::DrillOrigin(inner) if *id == origin => frame = Some(inner),
                    DocumentObject::Sheet(inner) if *id == store => sheet = Some(inner),
                    _ => {}
                }
            }
            match (frame, sheet) {
                (Some(frame), Some(sheet)) => Ok((frame, sheet)),
                (None, _) => Err(DocumentError::ObjectNotFound(origin.get())),
                (_, None) => Err(DocumentError::ObjectNotFound(store.get())),
            }
        }

        /// 登记针对某个对象的删除通知，订阅在该对象被删除后自动注销。
        pub fn subscribe(&mut self, target: ObjectId, observer: Box<dyn DocumentObserver>) {
            self.subscriptions
                .entries
                .push(Subscription { target, observer });
        }

        pub fn subscription_count(&self, target: ObjectId) -> usize {
            self.subscriptions
                .entries
                .iter()
                .filter(|entry| entry.target == target)
                .count()
        }

        /// 从文档中移除对象，随后通知并注销针对该对象的订阅。
        pub fn remove_object(&mut self, id: ObjectId) -> Result<DocumentObject, DocumentError> {
            let position = self
                .objects
                .iter()
                .position(|(object_id, _)| *object_id == id)
                .ok_or(DocumentError::ObjectNotFound(id.get()))?;
            let (_, object) = self.objects.remove(position);

            let (notified, remaining): (Vec<_>, Vec<_>) = std::mem::take(
                &mut self.subscriptions.entries,
            )
            .into_iter()
            .partition(|entry| entry.target == id);
            self.subscriptions.entries = remaining;

            for mut entry in notified {
                entry.observer.slot_deleted_object(self, id, &object);
            }
            Ok(object)
        }

        /// 请求重算，返回新的代数。
        pub fn recompute(&mut self) -> u64 {
            self.generation += 1;
            self.generation
        }

        #[inline]
        pub fn generation(&self) -> u64 {
            self.generation
        }
    }

    #[cfg(test)]
    mod tests {
        use std::cell::RefCell;
        use std::rc::Rc;

        use super::*;
        use crate::ledger::Ledger;

        #[test]
        fn document_stores_objects() {
            let mut doc = Document::new();
            let view = doc.add_view("Front", ViewPlacement::new(100.0, 150.0, 0.5));
            let page = doc.add_page("Page");
            let sheet = doc.add_sheet("DrillTable");

            assert_eq!(view.get(), 0);
            assert_eq!(page.get(), 1);
            assert_eq!(sheet.get(), 2);
            assert_eq!(doc.objects().count(), 3);
            assert_eq!(doc.view(view).unwrap().placement.scale, 0.5);

            let err = doc.page(view).unwrap_err();
            assert_eq!(
                err,
                DocumentError::UnexpectedKind {
                    id: view.get(),
                    expected: ObjectKind::Page,
                    actual: ObjectKind::View,
                }
            );
            assert_eq!(
                doc.sheet(ObjectId::new(99)).unwrap_err(),
                DocumentError::ObjectNotFound(99)
            );
        }

        #[test]
        fn pages_showing_lists_hosts() {
            let mut doc = Document::new();
            let view = doc.add_view("Front", ViewPlacement::default());
            let page = doc.add_page("Page");
            let other = doc.add_page("Other");
            doc.page_mut(page).unwrap().add_view(view);

            let pages: Vec<_> = doc.pages_showing(view).collect();
            assert_eq!(pages, vec![page]);
            assert!(!doc.page(other).unwrap().contains_view(view));
        }

        #[test]
        fn sub_elements_parse_and_resolve() {
            let mut view = DrawView::new("Front", ViewPlacement::default());
            let vertex = view.add_vertex(Point2::new(1.0, 2.0));
            let edge = view.add_edge(Curve::Circle {
                center: Point2::new(3.0, 4.0),
                radius: 1.5,
            });
            assert_eq!(vertex, SubElement::Vertex(1));
            assert_eq!(edge.to_string(), "Edge1");
            assert_eq!("Vertex1".parse::<SubElement>().unwrap(), vertex);
            assert!("Vertex0".parse::<SubElement>().is_err());
            assert!("Face1".parse::<SubElement>().is_err());

            assert_eq!(view.vertex(1), Some(Point2::new(1.0, 2.0)));
            assert!(view.vertex(0).is_none());
            assert!(view.has_sub_element(edge));
            assert!(!view.has_sub_element(SubElement::Edge(2)));
            let (center, radius) = view.edge(1).unwrap().curve.circle().unwrap();
            assert_eq!(center, Point2::new(3.0, 4.0));
            assert_eq!(radius, 1.5);
        }

        #[test]
        fn line_curves_are_not_circular() {
            let line = Curve::Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(1.0, 0.0),
            };
            let arc = Curve::Arc {
                center: Point2::new(0.0, 0.0),
                radius: 2.0,
                start_angle: 0.0,
                end_angle: 1.0,
            };
            assert!(!line.is_circular());
            assert_eq!(arc.circle(), Some((Point2::new(0.0, 0.0), 2.0)));
        }

        #[test]
        fn cosmetic_lines_are_created_and_removed() {
            let mut view = DrawView::new("Front", ViewPlacement::default());
            let first = view
                .make_cosmetic_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), LineStyle::Solid)
                .unwrap();
            let second = view
                .make_cosmetic_line(
                    Point2::new(0.0, 0.0),
                    Point2::new(0.0, 1.0),
                    LineStyle::HostDefault,
                )
                .unwrap();
            assert_ne!(first, second);
            assert_eq!(view.cosmetic_len(), 2);

            view.remove_cosmetic_edge(first).unwrap();
            assert!(view.cosmetic_line(first).is_none());
            assert!(view.cosmetic_line(second).is_some());
            assert_eq!(
                view.remove_cosmetic_edge(first).unwrap_err(),
                DocumentError::CosmeticLineNotFound(first)
            );

            let err = view
                .make_cosmetic_line(Point2::new(f64::NAN, 0.0), Point2::new(0.0, 0.0), LineStyle::Solid)
                .unwrap_err();
            assert_eq!(err, DocumentError::NonFiniteGeometry);
        }

        struct Recorder(Rc<RefCell<Vec<(ObjectId, ObjectKind)>>>);

        impl DocumentObserver for Recorder {
            fn slot_deleted_object(
                &mut self,
                _document: &mut Document,
                id: ObjectId,
                object: &DocumentObject,
            ) {
                self.0.borrow_mut().push((id, object.kind()));
            }
        }

        #[test]
        fn removal_notifies_only_matching_subscriptions() {
            let mut doc = Document::new();
            let page = doc.add_page("Page");
            let sheet = doc.add_sheet("DrillTable");
            let log = Rc::new(RefCell::new(Vec::new()));
            doc.subscribe(page, Box::new(Recorder(log.clone())));

            doc.remove_object(sheet).unwrap();
            assert!(log.borrow().is_empty());

            assert_eq!(doc.subscription_count(page), 1);
            doc.remove_object(page).unwrap();
            assert_eq!(*log.borrow(), vec![(page, ObjectKind::Page)]);
            assert_eq!(doc.subscription_count(page), 0);
            assert!(doc.remove_object(page).is_err());
        }

        #[test]
        fn origin_and_store_are_borrowed_together() {
            let mut doc = Document::new();
            let view = doc.add_view("Front", ViewPlacement::default());
            let sheet = doc.add_sheet("DrillTable");
            let origin = doc.add_drill_origin(OriginFrame::new(
                "A",
                Point2::new(100.0, 50.0),
                view,
                Vec::new(),
                Ledger::new(sheet),
            ));

            let (frame, store) = doc.origin_with_store_mut(origin).unwrap();
            frame.ledger_mut().append("A", store, 1.0, 2.0, 3.0).unwrap();
            assert_eq!(doc.drill_origin(origin).unwrap().ledger().len(), 1);
            assert_eq!(doc.sheet(sheet).unwrap().last_used_row(), Some(2));
        }

        #[test]
        fn recompute_advances_generation() {
            let mut doc = Document::new();
            assert_eq!(doc.generation(), 0);
            assert_eq!(doc.recompute(), 1);
            assert_eq!(doc.generation(), 1);
        }

        #[test]
        fn document_state_serializes_without_subscriptions() {
            let mut doc = Document::new();
            let view = doc.add_view("Front", ViewPlacement::default());
            let sheet = doc.add_sheet("DrillTable");
            let origin = doc.add_drill_origin(OriginFrame::new(
                "A",
                Point2::new(1.0, 1.0),
                view,
                Vec::new(),
                Ledger::new(sheet),
            ));
            {
                let (frame, store) = doc.origin_with_store_mut(origin).unwrap();
                crate::ledger::Ledger::write_header(store);
                frame.ledger_mut().append("A", store, 5.0, 6.0, 2.0).unwrap();
            }
            doc.subscribe(origin, Box::new(Recorder(Rc::new(RefCell::new(Vec::new())))));

            let json = serde_json::to_string(&doc).expect("serialize document");
            assert!(json.contains("\"D2\""));
            let restored: Document = serde_json::from_str(&json).expect("deserialize document");
            assert_eq!(restored.subscription_count(origin), 0);
            let frame = restored.drill_origin(origin).unwrap();
            assert_eq!(frame.ledger().next_tag(frame.label_prefix()), "A2");

            let rebuilt = Ledger::from_store(sheet, "A", restored.sheet(sheet).unwrap());
            assert_eq!(rebuilt.next_index(), frame.ledger().next_index());
        }
    }
}
