use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PositionError;
use crate::models::Side;

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Order side that opens a position in this direction
    pub fn entry_side(self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Order side that closes a position in this direction
    pub fn exit_side(self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported side including the flat state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

/// What the strategy believes it holds
///
/// Fills are never confirmed, so this is a belief set when an order is
/// acknowledged, not an exchange fact.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Direction,
    pub entry_price: f64,
    pub size: f64,
}

/// Strategy-local position state for one instrument
///
/// Owned by one strategy instance and passed by `&mut` into each evaluation.
/// Not persisted: a restart begins flat.
#[derive(Debug, Default)]
pub struct PositionTracker {
    position: Option<Position>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn side(&self) -> PositionSide {
        match self.position.as_ref().map(|p| p.side) {
            None => PositionSide::Flat,
            Some(Direction::Long) => PositionSide::Long,
            Some(Direction::Short) => PositionSide::Short,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Record a new position
    ///
    /// Fails if any position is already held, including the same direction.
    pub fn open(
        &mut self,
        side: Direction,
        entry_price: f64,
        size: f64,
    ) -> Result<(), PositionError> {
        if let Some(held) = &self.position {
            return Err(PositionError::Conflict {
                held: held.side.as_str(),
                requested: side.as_str(),
            });
        }

        tracing::info!(side = %side, entry_price, size, "Position opened");
        self.position = Some(Position {
            side,
            entry_price,
            size,
        });
        Ok(())
    }

    /// Reset to flat, returning what was held
    pub fn close(&mut self) -> Option<Position> {
        let closed = self.position.take();
        if let Some(position) = &closed {
            tracing::info!(
                side = %position.side,
                entry_price = position.entry_price,
                size = position.size,
                "Position closed"
            );
        }
        closed
    }
}
