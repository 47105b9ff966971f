use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    env::{ContinuousActionSpace, Environment, Report, Step},
    error::{Error, Result},
    observation::{Image, Observation},
};

/// Side length of the rendered frame
pub const FRAME_SIZE: usize = 96;

/// Default episode length
pub const DOT_RACER_MAX_STEPS: usize = 1000;

const ACCELERATION: f32 = 0.4;
const BRAKING: f32 = 0.8;
const DRAG: f32 = 0.05;
const MAX_SPEED: f32 = 4.0;
const TURN_RATE: f32 = 0.2;
const REACH_RADIUS: f32 = 4.0;
const REACH_BONUS: f32 = 10.0;
const STEP_COST: f32 = 0.1;
const MARGIN: f32 = 8.0;

const BACKGROUND: [f32; 3] = [102.0, 204.0, 102.0];
const CAR: [f32; 3] = [204.0, 0.0, 0.0];
const TARGET: [f32; 3] = [255.0, 255.0, 0.0];

/// A top-down pixel racing task
///
/// A car drives on a `96 × 96` field and must reach a target dot; reaching it
/// pays a bonus and spawns a new target. Observations are RGB frames in
/// channels-last layout with values in `[0, 255]`.
///
/// The action is `[steer, brake, gas]`: steering in `[-1, 1]`, brake and gas
/// in `[0, 1]`. Leaving the field ends the episode.
#[derive(Debug, Clone)]
pub struct DotRacer {
    x: f32,
    y: f32,
    heading: f32,
    speed: f32,
    target: (f32, f32),
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl DotRacer {
    pub fn new(max_steps: usize) -> Self {
        let center = FRAME_SIZE as f32 / 2.0;
        Self {
            x: center,
            y: center,
            heading: 0.0,
            speed: 0.0,
            target: (center, center),
            steps: 0,
            max_steps,
            rng: StdRng::from_entropy(),
        }
    }

    fn spawn_target(&mut self) {
        let hi = FRAME_SIZE as f32 - MARGIN;
        self.target = (self.rng.gen_range(MARGIN..hi), self.rng.gen_range(MARGIN..hi));
    }

    fn distance_to_target(&self) -> f32 {
        ((self.x - self.target.0).powi(2) + (self.y - self.target.1).powi(2)).sqrt()
    }

    fn on_field(&self) -> bool {
        let size = FRAME_SIZE as f32;
        (0.0..size).contains(&self.x) && (0.0..size).contains(&self.y)
    }

    fn render(&self) -> Observation {
        let mut data = Vec::with_capacity(FRAME_SIZE * FRAME_SIZE * 3);
        for _ in 0..FRAME_SIZE * FRAME_SIZE {
            data.extend_from_slice(&BACKGROUND);
        }

        paint(&mut data, self.target, 2, TARGET);
        paint(&mut data, (self.x, self.y), 1, CAR);

        let image = Image::channels_last(FRAME_SIZE, FRAME_SIZE, 3, data)
            .expect("frame buffer matches the frame size");
        Observation::Image(image)
    }
}

/// Fill a square of half-width `radius` centred on `at`, clipped to the frame
fn paint(data: &mut [f32], at: (f32, f32), radius: i64, color: [f32; 3]) {
    let (cx, cy) = (at.0.floor() as i64, at.1.floor() as i64);
    let size = FRAME_SIZE as i64;
    for y in (cy - radius).max(0)..=(cy + radius).min(size - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(size - 1) {
            let offset = ((y * size + x) * 3) as usize;
            data[offset..offset + 3].copy_from_slice(&color);
        }
    }
}

impl Environment for DotRacer {
    fn reset(&mut self) -> Observation {
        let center = FRAME_SIZE as f32 / 2.0;
        self.x = center;
        self.y = center;
        self.heading = self.rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        self.speed = 0.0;
        self.steps = 0;
        self.spawn_target();
        self.render()
    }

    fn step(&mut self, action: &[f32]) -> Result<Step> {
        let &[steer, brake, gas] = action else {
            return Err(Error::ActionDim {
                expected: 3,
                actual: action.len(),
            });
        };
        let steer = steer.clamp(-1.0, 1.0);
        let brake = brake.clamp(0.0, 1.0);
        let gas = gas.clamp(0.0, 1.0);

        let before = self.distance_to_target();

        self.heading += steer * TURN_RATE;
        self.speed = (self.speed + gas * ACCELERATION - brake * BRAKING - DRAG).clamp(0.0, MAX_SPEED);
        self.x += self.speed * self.heading.cos();
        self.y += self.speed * self.heading.sin();
        self.steps += 1;

        let mut reward = before - self.distance_to_target() - STEP_COST;
        let mut reached = 0.0;
        if self.distance_to_target() <= REACH_RADIUS {
            reward += REACH_BONUS;
            reached = 1.0;
            self.spawn_target();
        }

        let crashed = !self.on_field();
        if crashed {
            self.x = self.x.clamp(0.0, FRAME_SIZE as f32 - 1.0);
            self.y = self.y.clamp(0.0, FRAME_SIZE as f32 - 1.0);
        }

        let mut info = Report::new(vec!["speed", "reached_target", "crashed"]);
        info.insert("speed", self.speed as f64);
        info.insert("reached_target", reached);
        info.insert("crashed", if crashed { 1.0 } else { 0.0 });

        Ok(Step {
            observation: self.render(),
            reward,
            done: crashed || self.steps >= self.max_steps,
            info,
        })
    }

    fn observation_shape(&self) -> Vec<usize> {
        vec![FRAME_SIZE, FRAME_SIZE, 3]
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl ContinuousActionSpace for DotRacer {
    fn action_dim(&self) -> usize {
        3
    }

    fn action_bounds(&self) -> Option<(Vec<f32>, Vec<f32>)> {
        Some((vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]))
    }
}
