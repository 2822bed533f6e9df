// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::sync::Mutex;

use crate::{
    config::{DriveConfig, TurnRadius},
    device::{DeviceError, MotorDriver, Track},
    Error, Result,
};

use super::timer::TimedAction;

/// Drive controller shared between the control surface, the roving loop
/// and the turn timer. The mutex is the single point of serialization for
/// every state transition.
pub type SharedDrive<M> = Arc<Mutex<DriveController<M>>>;

/// Commanded robot state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RobotState {
    /// Last commanded base speed.
    pub drive_speed: i16,
    /// Both tracks commanded to zero and released.
    pub stopped: bool,
    pub driving_forward: bool,
    pub driving_backward: bool,
    /// Autonomous loop is active.
    pub is_roving: bool,
    /// Evasive maneuver owns the motors.
    pub is_evading: bool,
}

/// Per track speeds of a turn.
///
/// Returns the inner and outer track speeds. The inner track never drops
/// below `min_speed`. Each step rounds toward zero.
pub fn track_speeds(drive_speed: i16, min_speed: i16, radius: TurnRadius) -> (i16, i16) {
    let inner = ((drive_speed as f64 * radius.inner()) as i16).max(min_speed);
    let outer = (inner as f64 / radius.inner() * radius.outer()) as i16;

    (inner, outer)
}

/// Owns the motor driver and the commanded motion state.
///
/// Every operation first cancels a pending timed stop. Since all operations
/// run under the lock of `SharedDrive`, a timer can never fire in between
/// the cancellation and the new command.
pub struct DriveController<M> {
    driver: M,
    state: RobotState,
    min_turn_speed: i16,
    turn_radius: TurnRadius,
    timer: TimedAction,
    rover_session: u64,
    this: Weak<Mutex<DriveController<M>>>,
}

impl<M: MotorDriver + 'static> DriveController<M> {
    /// Construct a new shared drive controller.
    ///
    /// The robot is assumed to be at rest. Call `halt` to make sure it is.
    pub fn new(driver: M, config: &DriveConfig) -> SharedDrive<M> {
        Arc::new_cyclic(|this| {
            Mutex::new(Self {
                driver,
                state: RobotState {
                    drive_speed: config.initial_speed,
                    stopped: true,
                    driving_forward: false,
                    driving_backward: false,
                    is_roving: false,
                    is_evading: false,
                },
                min_turn_speed: config.min_turn_speed,
                turn_radius: config.turn_radius,
                timer: TimedAction::new(),
                rover_session: 0,
                this: this.clone(),
            })
        })
    }

    #[inline]
    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// Radius used for manual turns.
    #[inline]
    pub fn turn_radius(&self) -> TurnRadius {
        self.turn_radius
    }

    /// Whether a timed stop is pending.
    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_armed()
    }

    /// Record a driver failure. The commanded state is unknown from here on.
    fn fault(&mut self, error: DeviceError) -> Error {
        error!("Motor driver failure: {}", error);

        self.state.stopped = false;
        self.state.driving_forward = false;
        self.state.driving_backward = false;

        error.into()
    }

    async fn drive(&mut self, speed: i16) -> Result {
        self.timer.cancel();

        self.driver
            .set_speed(speed)
            .await
            .map_err(|e| self.fault(e))?;

        self.state.stopped = false;

        Ok(())
    }

    /// Drive both tracks forward at the base speed.
    pub async fn drive_forward(&mut self) -> Result {
        debug!("Drive forward at {}", self.state.drive_speed);

        self.drive(self.state.drive_speed).await?;
        self.state.driving_forward = true;
        self.state.driving_backward = false;

        Ok(())
    }

    /// Drive both tracks backward at the base speed.
    pub async fn drive_backward(&mut self) -> Result {
        debug!("Drive backward at {}", self.state.drive_speed);

        self.drive(self.state.drive_speed.saturating_neg()).await?;
        self.state.driving_forward = false;
        self.state.driving_backward = true;

        Ok(())
    }

    /// Change the base speed.
    ///
    /// Straight line motion is re-issued at the new speed. A turn in progress
    /// keeps its track speeds until the next turn. While evading the motion
    /// and its timed stop belong to the maneuver and are left untouched.
    pub async fn set_speed(&mut self, speed: i16) -> Result {
        debug!("Set drive speed to {}", speed);

        self.state.drive_speed = speed;

        if self.state.is_evading {
            Ok(())
        } else if self.state.driving_forward {
            self.drive_forward().await
        } else if self.state.driving_backward {
            self.drive_backward().await
        } else {
            Ok(())
        }
    }

    /// Turn right, M0 is the inner track.
    ///
    /// With a non zero `duration` the robot stops by itself once the
    /// duration elapses, otherwise it keeps turning until stopped.
    pub async fn turn_right(&mut self, duration: Duration, radius: TurnRadius) -> Result {
        self.turn(Track::M0, duration, radius).await
    }

    /// Turn left, M1 is the inner track.
    pub async fn turn_left(&mut self, duration: Duration, radius: TurnRadius) -> Result {
        self.turn(Track::M1, duration, radius).await
    }

    async fn turn(&mut self, inner_track: Track, duration: Duration, radius: TurnRadius) -> Result {
        self.timer.cancel();

        let (inner, outer) = track_speeds(self.state.drive_speed, self.min_turn_speed, radius);
        let (m0, m1) = match inner_track {
            Track::M0 => (inner, outer),
            Track::M1 => (outer, inner),
        };

        debug!(
            "Turn {} for {:?}: M0 {} M1 {}",
            if inner_track == Track::M0 { "right" } else { "left" },
            duration,
            m0,
            m1
        );

        self.driver
            .set_m0_speed(m0)
            .await
            .map_err(|e| self.fault(e))?;
        self.driver
            .set_m1_speed(m1)
            .await
            .map_err(|e| self.fault(e))?;

        self.state.stopped = false;
        self.state.driving_forward = false;
        self.state.driving_backward = false;

        self.schedule_stop(duration);

        Ok(())
    }

    /// Stop both tracks and release them.
    ///
    /// Does nothing if the robot is already stopped.
    pub async fn stop(&mut self) -> Result {
        self.timer.cancel();

        if self.state.stopped {
            return Ok(());
        }

        debug!("Stop");

        self.halt().await
    }

    /// Unconditionally stop both tracks and release them.
    pub async fn halt(&mut self) -> Result {
        self.timer.cancel();

        self.state.driving_forward = false;
        self.state.driving_backward = false;

        self.driver.set_speed(0).await.map_err(|e| self.fault(e))?;
        self.driver.coast().await.map_err(|e| self.fault(e))?;

        self.state.stopped = true;

        Ok(())
    }

    /// Arm the timer to stop the robot after `duration`.
    ///
    /// On expiry the timer takes the drive lock and only stops the robot if
    /// no other command has been issued in the meantime.
    pub(crate) fn schedule_stop(&mut self, duration: Duration) {
        let this = self.this.clone();

        self.timer.schedule(duration, move |token| async move {
            let Some(drive) = this.upgrade() else {
                return;
            };

            let mut drive = drive.lock().await;
            if drive.timer.complete(&token) {
                debug!("Timed stop expired");

                if let Err(e) = drive.stop().await {
                    error!("Timed stop failed: {}", e);
                }
            }
        });
    }

    pub(crate) fn set_evading(&mut self, evading: bool) {
        self.state.is_evading = evading;
    }

    /// Enter roving mode and return the new session.
    pub(crate) fn begin_roving(&mut self) -> u64 {
        self.rover_session = self.rover_session.wrapping_add(1);
        self.state.is_roving = true;
        self.state.is_evading = false;
        self.rover_session
    }

    pub(crate) fn end_roving(&mut self) {
        self.state.is_roving = false;
        self.state.is_evading = false;
    }

    /// Whether `session` is the active roving session.
    pub(crate) fn is_roving_session(&self, session: u64) -> bool {
        self.state.is_roving && self.rover_session == session
    }
}
