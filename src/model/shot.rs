//! Shot state: energy charged while the trigger is held, and the camera kick that follows a shot.

use crate::config::RecoilConfig;

/// Energy accumulated while the trigger is held. Zero means not charging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Charge {
    energy: u32,
}

impl Charge {
    pub fn energy(&self) -> u32 {
        self.energy
    }

    pub fn is_charging(&self) -> bool {
        self.energy > 0
    }

    /// The press itself counts as the first unit. Pressing again while charging changes nothing.
    pub fn begin(&mut self) -> bool {
        if self.is_charging() {
            return false;
        }
        self.energy = 1;
        true
    }

    /// One simulation step of charging. Returns whether the charge is live.
    pub fn tick(&mut self) -> bool {
        if self.is_charging() {
            self.energy += 1;
            true
        } else {
            false
        }
    }

    /// Takes the accumulated energy, leaving the charge empty
    pub fn release(&mut self) -> Option<u32> {
        match std::mem::take(&mut self.energy) {
            0 => None,
            energy => Some(energy),
        }
    }
}

/// Camera kick after a shot: decays toward zero, overshoots once in the opposite
/// direction, then settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Recoil {
    #[default]
    Idle,
    Recoiling { remaining: i32, shot: i32 },
    Rebounding { remaining: i32 },
}

impl Recoil {
    pub fn start(shot: i32) -> Self {
        if shot == 0 {
            Recoil::Idle
        } else {
            Recoil::Recoiling { remaining: shot, shot }
        }
    }

    pub fn remaining(&self) -> i32 {
        match *self {
            Recoil::Idle => 0,
            Recoil::Recoiling { remaining, .. } | Recoil::Rebounding { remaining } => remaining,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Recoil::Idle)
    }

    /// Advance one step and return the units consumed (the pitch kick to apply).
    pub fn advance(&mut self, config: &RecoilConfig) -> i32 {
        match *self {
            Recoil::Idle => 0,
            Recoil::Recoiling { remaining, shot } => {
                let up = decay_step(remaining, config.divisor);
                let remaining = remaining - up;
                *self = if remaining != 0 {
                    Recoil::Recoiling { remaining, shot }
                } else {
                    match rebound(shot, config.rebound) {
                        0 => Recoil::Idle,
                        remaining => Recoil::Rebounding { remaining },
                    }
                };
                up
            }
            Recoil::Rebounding { remaining } => {
                let up = decay_step(remaining, config.divisor);
                let remaining = remaining - up;
                *self = if remaining != 0 {
                    Recoil::Rebounding { remaining }
                } else {
                    Recoil::Idle
                };
                up
            }
        }
    }
}

/// ceil(r / d) above zero, floor(r / d) below; never zero for r != 0, so decay always terminates
fn decay_step(remaining: i32, divisor: i32) -> i32 {
    let divisor = divisor.max(1);
    if remaining > 0 {
        (remaining + divisor - 1) / divisor
    } else {
        remaining.div_euclid(divisor)
    }
}

fn rebound(shot: i32, coefficient: f32) -> i32 {
    (shot as f64 * coefficient as f64).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_idle(recoil: &mut Recoil, config: &RecoilConfig) -> Vec<i32> {
        let mut trace = Vec::new();
        for _ in 0..100 {
            if recoil.is_idle() {
                return trace;
            }
            recoil.advance(config);
            trace.push(recoil.remaining());
        }
        panic!("recoil did not settle: {trace:?}");
    }

    #[test]
    fn test_charge_counts_steps_not_presses() {
        let mut charge = Charge::default();
        assert!(!charge.tick());
        assert!(charge.begin());
        for _ in 0..5 {
            charge.begin();
            charge.tick();
        }
        assert_eq!(charge.energy(), 6);
        assert_eq!(charge.release(), Some(6));
        assert_eq!(charge.energy(), 0);
        assert_eq!(charge.release(), None);
    }

    #[test]
    fn test_recoil_decays_then_rebounds() {
        let config = RecoilConfig::default();
        let mut recoil = Recoil::start(10);
        let ups: Vec<i32> = (0..5).map(|_| recoil.advance(&config)).collect();
        assert_eq!(ups, vec![4, 2, 2, 1, 1]);
        assert_eq!(recoil, Recoil::Rebounding { remaining: -9 });

        let trace = run_to_idle(&mut recoil, &config);
        assert_eq!(trace, vec![-6, -4, -2, -1, 0]);
        assert!(recoil.is_idle());
    }

    #[test]
    fn test_rebound_floors_toward_negative() {
        let config = RecoilConfig::default();
        let mut recoil = Recoil::start(15);
        while matches!(recoil, Recoil::Recoiling { .. }) {
            recoil.advance(&config);
        }
        // 15 * -0.9 = -13.5
        assert_eq!(recoil.remaining(), -14);
    }

    #[test]
    fn test_net_pitch_is_shot_minus_rebound() {
        let config = RecoilConfig::default();
        for shot in [1, 2, 7, 30, 250] {
            let mut recoil = Recoil::start(shot);
            let mut total = 0;
            while !recoil.is_idle() {
                total += recoil.advance(&config);
            }
            assert_eq!(total, shot + rebound(shot, config.rebound), "shot {shot}");
        }
    }

    #[test]
    fn test_idle_does_nothing() {
        let config = RecoilConfig::default();
        let mut recoil = Recoil::start(0);
        assert!(recoil.is_idle());
        assert_eq!(recoil.advance(&config), 0);
    }
}
