//! Flocking rules evaluated on the CPU.
//!
//! This is the same per-agent update the WGSL kernel performs, written
//! against `glam` so it can run without a GPU. [`CpuBackend`](crate::backend::CpuBackend)
//! dispatches it, and the pure helpers here are what the tests pin down.
//!
//! For each agent:
//!
//! 1. Scan all other agents. Those within `perception_radius.x` feed
//!    alignment, within `.y` cohesion, within `.z` separation.
//! 2. Turn each rule into a Reynolds steering vector, weight it by
//!    `force_weight`, and clamp the sum to `max_steer_force`.
//! 3. Add the target seek force, whose magnitude stops growing past
//!    `target_clamp_distance`.
//! 4. Integrate velocity, clamp speed into `speed_range`, integrate position.
//! 5. Blend the smoothed copies toward the new state.

use glam::{Vec2, Vec3};

use crate::shader::FlockParams;

/// Rate of the exponential filter applied to the smoothed buffers (1/s).
pub const SMOOTHING_RATE: f32 = 10.0;

const EPSILON: f32 = 1e-6;

/// One agent's raw state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentState {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Scale `v` down to `max_len` if it is longer.
#[inline]
pub fn clamp_length(v: Vec3, max_len: f32) -> Vec3 {
    let len = v.length();
    if len > max_len && len > EPSILON {
        v * (max_len / len)
    } else {
        v
    }
}

/// Reynolds steering toward `desired` at full speed.
#[inline]
pub fn steer(desired: Vec3, velocity: Vec3, max_speed: f32, max_steer: f32) -> Vec3 {
    let len = desired.length();
    if len < EPSILON {
        return Vec3::ZERO;
    }
    let wanted = desired / len * max_speed;
    clamp_length(wanted - velocity, max_steer)
}

/// Attraction toward `target`.
///
/// Grows linearly with distance up to `clamp_distance` and stays constant
/// beyond it. A non-positive `clamp_distance` leaves the growth unbounded.
pub fn seek_force(position: Vec3, target: Vec3, strength: f32, clamp_distance: f32) -> Vec3 {
    let to_target = target - position;
    let dist = to_target.length();
    if dist < EPSILON {
        return Vec3::ZERO;
    }
    let reach = if clamp_distance > 0.0 {
        dist.min(clamp_distance)
    } else {
        dist
    };
    to_target / dist * strength * reach
}

/// Clamp the speed of `velocity` into `speed_range` keeping its direction.
/// A zero velocity has no direction and is returned unchanged.
#[inline]
pub fn limit_speed(velocity: Vec3, speed_range: Vec2) -> Vec3 {
    let speed = velocity.length();
    if speed < EPSILON {
        return velocity;
    }
    // Inverted ranges are read as (max, min); NaN bounds are ignored
    let lo = speed_range.x.min(speed_range.y);
    let hi = speed_range.x.max(speed_range.y);
    let limited = speed.max(lo).min(hi);
    velocity * (limited / speed)
}

/// Blend factor of the smoothing filter for a timestep.
#[inline]
pub fn smoothing_blend(delta_time: f32) -> f32 {
    1.0 - (-SMOOTHING_RATE * delta_time).exp()
}

/// Combined flocking steering force for agent `index` against `agents`.
///
/// Already weighted and clamped to `max_steer_force`; the seek force is
/// not included.
pub fn flocking_force(index: usize, agents: &[AgentState], params: &FlockParams) -> Vec3 {
    let me = agents[index];
    let radius = Vec3::from_array(params.perception_radius);
    let weight = Vec3::from_array(params.force_weight);
    let max_speed = params.speed_range[1];
    let max_steer = params.max_steer_force;

    let mut alignment_sum = Vec3::ZERO;
    let mut alignment_count = 0u32;
    let mut cohesion_sum = Vec3::ZERO;
    let mut cohesion_count = 0u32;
    let mut separation_sum = Vec3::ZERO;
    let mut separation_count = 0u32;

    for (j, other) in agents.iter().enumerate() {
        if j == index {
            continue;
        }
        let offset = me.position - other.position;
        let dist = offset.length();

        if dist <= radius.x {
            alignment_sum += other.velocity;
            alignment_count += 1;
        }
        if dist <= radius.y {
            cohesion_sum += other.position;
            cohesion_count += 1;
        }
        if dist > EPSILON && dist <= radius.z {
            separation_sum += offset / (dist * dist);
            separation_count += 1;
        }
    }

    let mut force = Vec3::ZERO;
    if alignment_count > 0 {
        let heading = alignment_sum / alignment_count as f32;
        force += steer(heading, me.velocity, max_speed, max_steer) * weight.x;
    }
    if cohesion_count > 0 {
        let centroid = cohesion_sum / cohesion_count as f32;
        force += steer(centroid - me.position, me.velocity, max_speed, max_steer) * weight.y;
    }
    if separation_count > 0 {
        let away = separation_sum / separation_count as f32;
        force += steer(away, me.velocity, max_speed, max_steer) * weight.z;
    }
    clamp_length(force, max_steer)
}

/// New raw state of agent `index` after one timestep.
pub fn update_agent(index: usize, agents: &[AgentState], params: &FlockParams) -> AgentState {
    let me = agents[index];
    let target = Vec3::from_array(params.target_position);

    let force = flocking_force(index, agents, params)
        + seek_force(
            me.position,
            target,
            params.target_seek_force,
            params.target_clamp_distance,
        );

    let dt = params.delta_time;
    let velocity = limit_speed(me.velocity + force * dt, Vec2::from_array(params.speed_range));
    AgentState {
        position: me.position + velocity * dt,
        velocity,
    }
}
