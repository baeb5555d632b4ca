//! Geometry produced by the renderer: shape bounds per node and connectors per edge.

use std::collections::HashMap;

use serde::Deserialize;

use crate::flow_graph::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of a shape
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned box whose top-left corner is at (x, y)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(at: Point, size: Size) -> Self {
        Self {
            x: at.x,
            y: at.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn left_center(&self) -> Point {
        Point::new(self.x, self.y + self.height / 2.0)
    }

    pub fn right_center(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height / 2.0)
    }
}

/// A polyline drawn for the edge at `edge` in the graph's edge list
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub edge: usize,
    pub waypoints: Vec<Point>,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub shapes: HashMap<NodeId, Bounds, ahash::RandomState>,
    pub connectors: Vec<Connector>,
}

impl Layout {
    pub fn bounds(&self, node: NodeId) -> Option<&Bounds> {
        self.shapes.get(&node)
    }
}

/// Shape sizes and spacing used when placing a tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Where the first node of the tree is placed
    pub origin: Point,
    pub task: Size,
    pub event: Size,
    pub gateway: Size,
    pub null: Size,
    /// Horizontal advance after each child of a sequence
    pub pitch: f64,
    /// Horizontal distance from a split to its branches
    pub branch_offset: f64,
    /// Vertical distance between neighbouring branches
    pub branch_spacing: f64,
    /// Horizontal distance from a split to its join
    pub join_offset: f64,
    /// Offset of a loop body from its condition
    pub loop_body_offset: Point,
    /// Cursor advance after a loop
    pub loop_advance: Point,
    pub max_depth: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin: Point::new(100.0, 100.0),
            task: Size::new(100.0, 80.0),
            event: Size::new(36.0, 36.0),
            gateway: Size::new(50.0, 50.0),
            null: Size::new(80.0, 60.0),
            pitch: 200.0,
            branch_offset: 250.0,
            branch_spacing: 200.0,
            join_offset: 500.0,
            loop_body_offset: Point::new(200.0, 100.0),
            loop_advance: Point::new(400.0, 200.0),
            max_depth: 256,
        }
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Point { x, y })
    }
}
