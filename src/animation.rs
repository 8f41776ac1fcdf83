//! Marker transitions between two cluster snapshots.
//!
//! [`ClusterAnimator`] does no spatial work of its own. It interpolates queued markers
//! toward their targets on a frame clock and reports each intermediate position through
//! an externally supplied callback.

use crate::camera::ZoomDirection;
use crate::cluster::ClusterItem;
use crate::config::AnimationConfig;
use crate::error::Result;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Moves a rendered marker to a new position.
pub type MarkerMover<M> = Arc<dyn Fn(&M, Point) + Send + Sync>;

/// Shape of the progress curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    Accelerate,
    #[default]
    Decelerate,
    AccelerateDecelerate,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` to eased progress in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Accelerate => t * t,
            Easing::Decelerate => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::AccelerateDecelerate => ((t + 1.0) * PI).cos() / 2.0 + 0.5,
        }
    }
}

/// Position `fraction` of the way from `from` to `to`.
///
/// Longitude travels the short way round, crossing the antimeridian when that is shorter.
pub fn interpolate(from: Point, to: Point, fraction: f64) -> Point {
    let lat = from.y() + (to.y() - from.y()) * fraction;

    let mut delta = to.x() - from.x();
    if delta.abs() > 180.0 {
        delta -= 360.0 * delta.signum();
    }
    let mut lng = from.x() + delta * fraction;
    if lng > 180.0 {
        lng -= 360.0;
    } else if lng < -180.0 {
        lng += 360.0;
    }

    Point::new(lng, lat)
}

struct Transition<M> {
    marker: M,
    from: Point,
    to: Point,
}

/// Animates markers from where they are to where the new clusters put them.
///
/// ```rust
/// use geocluster::animation::{ClusterAnimator, MarkerMover};
/// use geocluster::camera::ZoomDirection;
/// use geocluster::cluster::Marker;
/// use geo::Point;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let mover: MarkerMover<Marker> = Arc::new(|marker: &Marker, at: Point| {
///     println!("marker {} -> {:?}", marker.id, at);
/// });
/// let mut animator = ClusterAnimator::new(mover);
/// animator.add_marker(Marker::new(1, Point::new(0.0, 0.0)), Point::new(1.0, 1.0));
/// animator.animate(ZoomDirection::In, &CancellationToken::new()).await;
/// # });
/// ```
pub struct ClusterAnimator<M> {
    config: AnimationConfig,
    mover: MarkerMover<M>,
    transitions: Vec<Transition<M>>,
}

impl<M> fmt::Debug for ClusterAnimator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterAnimator")
            .field("config", &self.config)
            .field("pending", &self.transitions.len())
            .finish_non_exhaustive()
    }
}

impl<M: ClusterItem> ClusterAnimator<M> {
    pub fn new(mover: MarkerMover<M>) -> Self {
        Self {
            config: AnimationConfig::default(),
            mover,
            transitions: Vec::new(),
        }
    }

    pub fn with_config(config: AnimationConfig, mover: MarkerMover<M>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mover,
            transitions: Vec::new(),
        })
    }

    /// Queue `marker` to move from its current position to `target`.
    ///
    /// Queuing the same marker again replaces its target.
    pub fn add_marker(&mut self, marker: M, target: Point) {
        let from = marker.position();
        if let Some(existing) = self.transitions.iter_mut().find(|t| t.marker == marker) {
            existing.to = target;
            return;
        }
        self.transitions.push(Transition {
            marker,
            from,
            to: target,
        });
    }

    pub fn pending(&self) -> usize {
        self.transitions.len()
    }

    /// Run every queued transition to completion, or until `cancel` fires.
    ///
    /// On cancellation all markers are placed directly at their targets. The queue is
    /// empty afterwards either way.
    pub async fn animate(&mut self, direction: ZoomDirection, cancel: &CancellationToken) {
        let transitions = std::mem::take(&mut self.transitions);
        if transitions.is_empty() {
            return;
        }

        let (duration_ms, easing) = match direction {
            ZoomDirection::In => (self.config.zoom_in_duration_ms, self.config.zoom_in_easing),
            ZoomDirection::Out => (self.config.zoom_out_duration_ms, self.config.zoom_out_easing),
        };
        let duration = Duration::from_millis(duration_ms);
        if duration.is_zero() || cancel.is_cancelled() {
            self.finish(&transitions);
            return;
        }

        log::debug!(
            "Animating {} markers over {:?} ({:?})",
            transitions.len(),
            duration,
            direction
        );

        let mut frames = tokio::time::interval(Duration::from_millis(self.config.frame_interval_ms));
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let start = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Marker animation cancelled; snapping to targets");
                    self.finish(&transitions);
                    return;
                }
                _ = frames.tick() => {}
            }

            let progress = start.elapsed().as_secs_f64() / duration.as_secs_f64();
            if progress >= 1.0 {
                self.finish(&transitions);
                return;
            }

            let fraction = easing.apply(progress);
            for transition in &transitions {
                (self.mover)(
                    &transition.marker,
                    interpolate(transition.from, transition.to, fraction),
                );
            }
        }
    }

    fn finish(&self, transitions: &[Transition<M>]) {
        for transition in transitions {
            (self.mover)(&transition.marker, transition.to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Marker;
    use parking_lot::Mutex;

    type Recorded = Arc<Mutex<Vec<(u64, Point)>>>;

    fn recorder() -> (MarkerMover<Marker>, Recorded) {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        let mover: MarkerMover<Marker> =
            Arc::new(move |marker: &Marker, at: Point| sink.lock().push((marker.id, at)));
        (mover, recorded)
    }

    fn last_position(recorded: &Recorded, id: u64) -> Option<Point> {
        recorded
            .lock()
            .iter()
            .rev()
            .find(|(marker, _)| *marker == id)
            .map(|(_, at)| *at)
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::Accelerate,
            Easing::Decelerate,
            Easing::AccelerateDecelerate,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-12, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12, "{easing:?}");
        }
        assert!(Easing::Decelerate.apply(0.5) > 0.5);
        assert!(Easing::Accelerate.apply(0.5) < 0.5);
    }

    #[test]
    fn test_interpolate_takes_short_way() {
        let mid = interpolate(Point::new(170.0, 0.0), Point::new(-170.0, 10.0), 0.5);
        assert!((mid.x().abs() - 180.0).abs() < 1e-9);
        assert!((mid.y() - 5.0).abs() < 1e-9);

        let quarter = interpolate(Point::new(-170.0, 0.0), Point::new(170.0, 0.0), 0.25);
        assert!((quarter.x() + 175.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_markers_reach_targets() {
        let (mover, recorded) = recorder();
        let mut animator = ClusterAnimator::new(mover);
        animator.add_marker(Marker::new(1, Point::new(0.0, 0.0)), Point::new(10.0, 10.0));
        animator.add_marker(Marker::new(2, Point::new(5.0, 5.0)), Point::new(0.0, 0.0));
        assert_eq!(animator.pending(), 2);

        animator
            .animate(ZoomDirection::Out, &CancellationToken::new())
            .await;

        assert_eq!(animator.pending(), 0);
        assert_eq!(last_position(&recorded, 1), Some(Point::new(10.0, 10.0)));
        assert_eq!(last_position(&recorded, 2), Some(Point::new(0.0, 0.0)));
        // 300ms at 16ms per frame, plus the final snap.
        assert!(recorded.lock().len() > 2 * 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_snaps_to_target() {
        let (mover, recorded) = recorder();
        let config = AnimationConfig::default().with_durations_ms(1000, 1000);
        let mut animator = ClusterAnimator::with_config(config, mover).unwrap();
        animator.add_marker(Marker::new(1, Point::new(0.0, 0.0)), Point::new(20.0, 0.0));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        animator.animate(ZoomDirection::In, &cancel).await;

        let frames = recorded.lock().len();
        assert!(frames < 1000 / 16, "ran {frames} frames");
        assert_eq!(last_position(&recorded, 1), Some(Point::new(20.0, 0.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_moves_once() {
        let (mover, recorded) = recorder();
        let mut animator = ClusterAnimator::new(mover);
        animator.add_marker(Marker::new(3, Point::new(0.0, 0.0)), Point::new(1.0, 1.0));
        animator.add_marker(Marker::new(3, Point::new(0.0, 0.0)), Point::new(2.0, 2.0));

        let cancel = CancellationToken::new();
        cancel.cancel();
        animator.animate(ZoomDirection::In, &cancel).await;

        assert_eq!(*recorded.lock(), vec![(3, Point::new(2.0, 2.0))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_crosses_antimeridian() {
        let (mover, recorded) = recorder();
        let config = AnimationConfig::default().with_easing(Easing::Linear, Easing::Linear);
        let mut animator = ClusterAnimator::with_config(config, mover).unwrap();
        animator.add_marker(Marker::new(1, Point::new(175.0, 0.0)), Point::new(-175.0, 0.0));

        animator
            .animate(ZoomDirection::In, &CancellationToken::new())
            .await;

        assert!(recorded.lock().iter().all(|(_, at)| at.x().abs() >= 175.0));
    }
}
