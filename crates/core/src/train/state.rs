use std::fmt;

/// Lifecycle of a train inside a session.
///
/// Geometry and occupancy arrive independently; only a train holding both is
/// rendered. Any failure, or the end of the session, discards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainState {
    Created,
    PathLoading,
    GeometryReady,
    OccupancyReady,
    Rendered,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainEvent {
    PathRequested,
    GeometryLoaded,
    OccupancyLoaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("train cannot go from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: TrainState,
    pub event: TrainEvent,
}

impl TrainState {
    pub fn advance(self, event: TrainEvent) -> Result<TrainState, InvalidTransition> {
        use TrainEvent::*;
        use TrainState::*;

        let next = match (self, event) {
            (Created, PathRequested) => PathLoading,
            (PathLoading, GeometryLoaded) => GeometryReady,
            (PathLoading, OccupancyLoaded) => OccupancyReady,
            (GeometryReady, OccupancyLoaded) | (OccupancyReady, GeometryLoaded) => Rendered,
            (Discarded, _) => return Err(InvalidTransition { from: self, event }),
            (_, Failed) => Discarded,
            _ => return Err(InvalidTransition { from: self, event }),
        };

        Ok(next)
    }

    pub fn is_renderable(self) -> bool {
        self == TrainState::Rendered
    }

    pub fn is_pending(self) -> bool {
        !matches!(self, TrainState::Rendered | TrainState::Discarded)
    }
}

impl fmt::Display for TrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainState::Created => "created",
            TrainState::PathLoading => "path loading",
            TrainState::GeometryReady => "geometry ready",
            TrainState::OccupancyReady => "occupancy ready",
            TrainState::Rendered => "rendered",
            TrainState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[TrainEvent]) -> Result<TrainState, InvalidTransition> {
        events
            .iter()
            .try_fold(TrainState::Created, |state, &event| state.advance(event))
    }

    #[test]
    fn test_both_orders_render() {
        use TrainEvent::*;

        let geometry_first = run(&[PathRequested, GeometryLoaded, OccupancyLoaded]).unwrap();
        let occupancy_first = run(&[PathRequested, OccupancyLoaded, GeometryLoaded]).unwrap();

        assert!(geometry_first.is_renderable());
        assert!(occupancy_first.is_renderable());
    }

    #[test]
    fn test_partial_is_not_renderable() {
        use TrainEvent::*;

        let state = run(&[PathRequested, GeometryLoaded]).unwrap();
        assert_eq!(state, TrainState::GeometryReady);
        assert!(!state.is_renderable());
        assert!(state.is_pending());
    }

    #[test]
    fn test_failure_discards() {
        use TrainEvent::*;

        let prefixes: [&[TrainEvent]; 3] = [&[], &[PathRequested], &[PathRequested, OccupancyLoaded]];
        for prefix in prefixes {
            let mut events = prefix.to_vec();
            events.push(Failed);
            assert_eq!(run(&events).unwrap(), TrainState::Discarded);
        }

        let rendered = run(&[PathRequested, GeometryLoaded, OccupancyLoaded]).unwrap();
        assert_eq!(rendered.advance(Failed).unwrap(), TrainState::Discarded);
    }

    #[test]
    fn test_illegal_transitions() {
        use TrainEvent::*;

        assert!(TrainState::Created.advance(GeometryLoaded).is_err());
        assert!(TrainState::GeometryReady.advance(GeometryLoaded).is_err());
        assert!(TrainState::Rendered.advance(PathRequested).is_err());

        let err = TrainState::Discarded.advance(Failed).unwrap_err();
        assert_eq!(err.from, TrainState::Discarded);
    }
}
