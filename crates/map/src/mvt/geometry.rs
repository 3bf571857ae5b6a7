//! Vector tile geometry command streams.
//!
//! A stream is a sequence of command integers (`id | count << 3`) each followed
//! by `count` zigzag-encoded `(dx, dy)` pairs. The cursor carries over from one
//! command to the next, so every coordinate is relative to the previous one.

use glam::IVec2;

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("command stream ends inside a command")]
    Truncated,

    #[error("unknown geometry command {0}")]
    UnknownCommand(u32),

    #[error("LineTo or ClosePath before any MoveTo")]
    NoCurrentRing,

    #[error("coordinate overflows the tile pixel space")]
    Overflow,
}

/// Splits a command stream into rings, one per `MoveTo` point.
///
/// `ClosePath` repeats the ring's first point so the ring reads as a closed
/// polyline.
pub fn decode_rings(commands: &[u32]) -> Result<Vec<Vec<IVec2>>, GeometryError> {
    let mut rings: Vec<Vec<IVec2>> = Vec::new();
    let mut cursor = IVec2::ZERO;
    let mut stream = commands.iter().copied();

    while let Some(command) = stream.next() {
        let id = command & 0x7;
        let count = command >> 3;

        match id {
            MOVE_TO | LINE_TO => {
                for _ in 0..count {
                    let dx = stream.next().ok_or(GeometryError::Truncated)?;
                    let dy = stream.next().ok_or(GeometryError::Truncated)?;
                    cursor = IVec2::new(
                        cursor.x.checked_add(unzigzag(dx)).ok_or(GeometryError::Overflow)?,
                        cursor.y.checked_add(unzigzag(dy)).ok_or(GeometryError::Overflow)?,
                    );

                    if id == MOVE_TO {
                        rings.push(vec![cursor]);
                    } else {
                        rings
                            .last_mut()
                            .ok_or(GeometryError::NoCurrentRing)?
                            .push(cursor);
                    }
                }
            }
            CLOSE_PATH => {
                let ring = rings.last_mut().ok_or(GeometryError::NoCurrentRing)?;
                if let Some(&first) = ring.first() {
                    ring.push(first);
                }
            }
            other => return Err(GeometryError::UnknownCommand(other)),
        }
    }

    Ok(rings)
}

fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[cfg(test)]
pub(crate) fn encode_line(points: &[(i32, i32)]) -> Vec<u32> {
    fn zigzag(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }

    let mut commands = Vec::new();
    let mut cursor = (0, 0);
    for (i, &(x, y)) in points.iter().enumerate() {
        match i {
            0 => commands.push(MOVE_TO | 1 << 3),
            1 => commands.push(LINE_TO | ((points.len() as u32 - 1) << 3)),
            _ => {}
        }
        commands.push(zigzag(x - cursor.0));
        commands.push(zigzag(y - cursor.1));
        cursor = (x, y);
    }
    commands
}
