use glam::{ivec2, IVec2, Vec2};

/// Integer pixel rectangle, `min` inclusive and `max` exclusive.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl IRect {
    pub const fn new(min: IVec2, max: IVec2) -> IRect {
        IRect { min, max }
    }

    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> IRect {
        IRect {
            min: ivec2(x, y),
            max: ivec2(x + width, y + height),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn contains(&self, p: IVec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }

    pub fn intersect(&self, other: &IRect) -> IRect {
        IRect {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }
}

/// Signed double area of the triangle `a`, `b`, `c`. Positive when the three
/// points wind clockwise on a y-down screen.
#[inline(always)]
pub fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    ((b.x - a.x) * (c.y - a.y)) - ((b.y - a.y) * (c.x - a.x))
}
