//! Zone membership: which person detections have their box center inside a
//! caller-supplied rectangle.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::error::{GuestCounterError, Result};

/// Rectangle of interest in image pixel coordinates.
///
/// Corners may arrive in any order; membership always works on the
/// normalized rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Zone {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Parse the four form fields of a processing request.
    pub fn parse(x1: &str, y1: &str, x2: &str, y2: &str) -> Result<Self> {
        Ok(Self {
            x1: parse_coord("x1", x1)?,
            y1: parse_coord("y1", y1)?,
            x2: parse_coord("x2", x2)?,
            y2: parse_coord("y2", y2)?,
        })
    }

    /// Same rectangle with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Zone {
        Zone {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Inclusive containment test against the normalized rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let z = self.normalized();
        z.x1 <= x && x <= z.x2 && z.y1 <= y && y <= z.y2
    }
}

fn parse_coord(field: &str, raw: &str) -> Result<i32> {
    raw.trim().parse::<i32>().map_err(|_| {
        GuestCounterError::InvalidZone(format!("{field} must be an integer, got '{raw}'"))
    })
}

/// One person detection together with its integer center and membership flag.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonMark {
    pub detection: Detection,
    pub center: (i32, i32),
    pub inside: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneCountResult {
    /// Number of members; always `members.len()`.
    pub count: usize,
    /// Person detections whose center lies in the zone, in detector order.
    pub members: Vec<Detection>,
    /// Every person detection, in detector order, flagged with membership.
    pub persons: Vec<PersonMark>,
}

/// Count person detections whose box center falls inside `zone`.
///
/// Overlapping boxes for the same physical person are not merged; each
/// qualifying detection counts once.
pub fn count_in_zone(detections: &[Detection], zone: &Zone) -> ZoneCountResult {
    let persons: Vec<PersonMark> = detections
        .iter()
        .filter(|d| d.class.is_person())
        .map(|d| {
            let center = d.bbox.pixel_center();
            PersonMark {
                detection: d.clone(),
                center,
                inside: zone.contains(center.0, center.1),
            }
        })
        .collect();

    let members: Vec<Detection> = persons
        .iter()
        .filter(|p| p.inside)
        .map(|p| p.detection.clone())
        .collect();

    ZoneCountResult {
        count: members.len(),
        members,
        persons,
    }
}
