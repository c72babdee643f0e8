use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Interval between intermediate pointer moves while tweening
const STEP_INTERVAL: Duration = Duration::from_millis(50);

/// Screen pixels per unit of gaze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    High,
    Medium,
    Low,
}

impl Precision {
    pub fn pixels(self) -> f32 {
        match self {
            Precision::High => 100.0,
            Precision::Medium => 500.0,
            Precision::Low => 1000.0,
        }
    }
}

/// How long one gaze-driven move takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Medium,
    Slow,
    Instant,
}

impl Speed {
    pub fn duration(self) -> Duration {
        match self {
            Speed::Fast => Duration::from_secs(1),
            Speed::Medium => Duration::from_secs(5),
            Speed::Slow => Duration::from_secs(10),
            Speed::Instant => Duration::ZERO,
        }
    }
}

/// Platform pointer access
pub trait PointerBackend {
    fn screen_size(&mut self) -> Result<(i32, i32)>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()>;
}

pub struct MouseController<B: PointerBackend> {
    backend: B,
    precision: Precision,
    speed: Speed,
}

impl<B: PointerBackend> MouseController<B> {
    pub fn new(backend: B, precision: Precision, speed: Speed) -> Self {
        Self {
            backend,
            precision,
            speed,
        }
    }

    pub fn get_screen_size(&mut self) -> Result<(i32, i32)> {
        self.backend.screen_size()
    }

    pub fn move_to_center(&mut self) -> Result<()> {
        let (w, h) = self.backend.screen_size()?;
        self.backend.move_to(w / 2, h / 2)
    }

    /// Moves the pointer relative to its current position. Blocks for the
    /// configured speed's duration.
    pub fn move_by_gaze(&mut self, x: f32, y: f32, invert_x: bool) -> Result<()> {
        let (dx, dy) = displacement(x, y, self.precision, invert_x);
        let duration = self.speed.duration();
        let steps = (duration.as_millis() / STEP_INTERVAL.as_millis()).max(1) as usize;
        debug!("Pointer move ({}, {}) in {} steps", dx, dy, steps);

        for (i, (sx, sy)) in split_steps(dx, steps)
            .into_iter()
            .zip(split_steps(dy, steps))
            .enumerate()
        {
            if i > 0 {
                thread::sleep(duration / steps as u32);
            }
            if sx != 0 || sy != 0 {
                self.backend.move_by(sx, sy)?;
            }
        }
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Pixel displacement for a gaze vector. Screen y grows downwards.
pub fn displacement(x: f32, y: f32, precision: Precision, invert_x: bool) -> (i32, i32) {
    let scale = precision.pixels();
    let dx = if invert_x { -x * scale } else { x * scale };
    let dy = -y * scale;
    (dx.round() as i32, dy.round() as i32)
}

/// Splits `total` into `steps` integers that sum to `total`
pub fn split_steps(total: i32, steps: usize) -> Vec<i32> {
    let steps = steps.max(1) as i64;
    let total = total as i64;
    (0..steps)
        .map(|i| (total * (i + 1) / steps - total * i / steps) as i32)
        .collect()
}

/// Tracks a virtual pointer and logs moves instead of performing them
pub struct DryRunBackend {
    screen: (i32, i32),
    position: (i32, i32),
}

impl DryRunBackend {
    pub fn new(screen: (i32, i32)) -> Self {
        Self {
            screen,
            position: (screen.0 / 2, screen.1 / 2),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }
}

impl PointerBackend for DryRunBackend {
    fn screen_size(&mut self) -> Result<(i32, i32)> {
        Ok(self.screen)
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.position = (x, y);
        debug!("Pointer (dry run) at ({}, {})", x, y);
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.position = (self.position.0 + dx, self.position.1 + dy);
        debug!("Pointer (dry run) at ({}, {})", self.position.0, self.position.1);
        Ok(())
    }
}

#[cfg(feature = "pointer")]
pub use native::EnigoBackend;

#[cfg(feature = "pointer")]
mod native {
    use anyhow::{anyhow, Result};
    use enigo::{Coordinate, Enigo, Mouse, Settings};

    use super::PointerBackend;

    pub struct EnigoBackend {
        enigo: Enigo,
    }

    impl EnigoBackend {
        pub fn new() -> Result<Self> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| anyhow!("Failed to connect to the display server: {e}"))?;
            Ok(Self { enigo })
        }
    }

    impl PointerBackend for EnigoBackend {
        fn screen_size(&mut self) -> Result<(i32, i32)> {
            self.enigo
                .main_display()
                .map_err(|e| anyhow!("Failed to query screen size: {e}"))
        }

        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            self.enigo
                .move_mouse(x, y, Coordinate::Abs)
                .map_err(|e| anyhow!("Failed to move pointer: {e}"))
        }

        fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
            self.enigo
                .move_mouse(dx, dy, Coordinate::Rel)
                .map_err(|e| anyhow!("Failed to move pointer: {e}"))
        }
    }
}

/// Picks the platform backend, or the dry-run one when disabled or unavailable
pub fn default_backend(dry_run: bool, screen: (i32, i32)) -> Result<Box<dyn PointerBackend>> {
    if dry_run {
        info!("Pointer control disabled, logging moves only");
        return Ok(Box::new(DryRunBackend::new(screen)));
    }
    #[cfg(feature = "pointer")]
    {
        Ok(Box::new(EnigoBackend::new()?))
    }
    #[cfg(not(feature = "pointer"))]
    {
        info!("Built without the `pointer` feature, logging moves only");
        Ok(Box::new(DryRunBackend::new(screen)))
    }
}

impl<B: PointerBackend + ?Sized> PointerBackend for Box<B> {
    fn screen_size(&mut self) -> Result<(i32, i32)> {
        (**self).screen_size()
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }

    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        (**self).move_by(dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        moves: Vec<(i32, i32)>,
        absolute: Vec<(i32, i32)>,
    }

    impl PointerBackend for Recorder {
        fn screen_size(&mut self) -> Result<(i32, i32)> {
            Ok((1920, 1080))
        }
        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            self.absolute.push((x, y));
            Ok(())
        }
        fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
            self.moves.push((dx, dy));
            Ok(())
        }
    }

    #[test]
    fn test_displacement_profiles() {
        assert_eq!(displacement(0.5, 0.25, Precision::High, false), (50, -25));
        assert_eq!(displacement(0.5, 0.25, Precision::Medium, false), (250, -125));
        assert_eq!(displacement(0.5, -0.25, Precision::Low, true), (-500, 250));
    }

    #[test]
    fn test_split_steps_sums_to_total() {
        for (total, steps) in [(250, 20), (-125, 20), (7, 3), (0, 5), (3, 100)] {
            let parts = split_steps(total, steps);
            assert_eq!(parts.len(), steps);
            assert_eq!(parts.iter().sum::<i32>(), total);
        }
        assert_eq!(split_steps(10, 0), vec![10]);
    }

    #[test]
    fn test_speed_durations() {
        assert_eq!(Speed::Fast.duration(), Duration::from_secs(1));
        assert_eq!(Speed::Slow.duration(), Duration::from_secs(10));
        assert_eq!(Speed::Instant.duration(), Duration::ZERO);
    }

    #[test]
    fn test_move_by_gaze_instant() {
        let mut mouse = MouseController::new(Recorder::default(), Precision::Medium, Speed::Instant);
        mouse.move_by_gaze(0.2, 0.1, false).unwrap();
        assert_eq!(mouse.backend().moves, vec![(100, -50)]);
    }

    #[test]
    fn test_zero_gaze_does_not_move() {
        let mut mouse = MouseController::new(Recorder::default(), Precision::High, Speed::Instant);
        mouse.move_by_gaze(0.0, 0.0, false).unwrap();
        assert!(mouse.backend().moves.is_empty());
    }

    #[test]
    fn test_move_to_center() {
        let mut mouse = MouseController::new(Recorder::default(), Precision::High, Speed::Instant);
        assert_eq!(mouse.get_screen_size().unwrap(), (1920, 1080));
        mouse.move_to_center().unwrap();
        assert_eq!(mouse.backend().absolute, vec![(960, 540)]);
    }

    #[test]
    fn test_dry_run_tracks_position() {
        let mut mouse = MouseController::new(DryRunBackend::new((800, 600)), Precision::High, Speed::Instant);
        mouse.move_by_gaze(0.5, 0.5, true).unwrap();
        assert_eq!(mouse.backend().position(), (350, 250));
    }
}
