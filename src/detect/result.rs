/// COCO class index the YOLO family uses for people.
pub const COCO_PERSON_CLASS: u32 = 0;

/// Axis-aligned box in source-image pixel coordinates, `x1 <= x2`, `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Corners truncated toward zero, the pixel grid the counter and annotator work on.
    pub fn pixel_corners(&self) -> (i32, i32, i32, i32) {
        (
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        )
    }

    /// Integer center using floor division of the truncated corners.
    pub fn pixel_center(&self) -> (i32, i32) {
        let (x1, y1, x2, y2) = self.pixel_corners();
        let mid = |a: i32, b: i32| (i64::from(a) + i64::from(b)).div_euclid(2) as i32;
        (mid(x1, x2), mid(y1, y2))
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Person,
    /// Any other detector class, by its raw index.
    Other(u32),
}

impl ObjectClass {
    pub fn from_coco_index(index: u32) -> Self {
        if index == COCO_PERSON_CLASS {
            ObjectClass::Person
        } else {
            ObjectClass::Other(index)
        }
    }

    pub fn is_person(self) -> bool {
        matches!(self, ObjectClass::Person)
    }
}

/// One object reported by a detector backend. Ephemeral; never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bbox,
        }
    }

    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(ObjectClass::Person, 1.0, BoundingBox::new(x1, y1, x2, y2))
    }
}
