use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::{PaneRect, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            "up" | "u" => Ok(Self::Up),
            "down" | "d" => Ok(Self::Down),
            _ => Err(format!("Unknown direction: {s}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        };
        f.write_str(s)
    }
}

impl Direction {
    /// Whether `candidate` lies strictly past `current` in this direction and
    /// overlaps it on the perpendicular axis.
    fn admits(self, current: &PaneRect, candidate: &PaneRect) -> bool {
        match self {
            Self::Left => {
                candidate.right() <= u32::from(current.x)
                    && candidate.overlaps_vertically(current)
            }
            Self::Right => {
                u32::from(candidate.x) >= current.right()
                    && candidate.overlaps_vertically(current)
            }
            Self::Up => {
                candidate.bottom() <= u32::from(current.y)
                    && candidate.overlaps_horizontally(current)
            }
            Self::Down => {
                u32::from(candidate.y) >= current.bottom()
                    && candidate.overlaps_horizontally(current)
            }
        }
    }
}

/// Squared distance between doubled centers. Monotonic in the true distance.
fn center_distance(a: &PaneRect, b: &PaneRect) -> i64 {
    let (ax, ay) = a.doubled_center();
    let (bx, by) = b.doubled_center();
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}

/// Best neighbour of `current` in `direction` among `panes`.
///
/// `panes` must include `current` itself; an id missing from the list yields
/// `None`. Ties on center distance go to the lowest id in natural order.
pub fn adjacent(
    current: &SessionId,
    direction: Direction,
    panes: &[(SessionId, PaneRect)],
) -> Option<SessionId> {
    let (_, current_rect) = panes.iter().find(|(id, _)| id == current)?;

    panes
        .iter()
        .filter(|(id, _)| id != current)
        .filter(|(_, rect)| direction.admits(current_rect, rect))
        .min_by(|(a_id, a_rect), (b_id, b_rect)| {
            center_distance(current_rect, a_rect)
                .cmp(&center_distance(current_rect, b_rect))
                .then_with(|| a_id.cmp(b_id))
        })
        .map(|(id, _)| id.clone())
}
