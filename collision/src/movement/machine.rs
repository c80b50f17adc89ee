//! The per-pass movement state machine.
//!
//! Each intra-tick pass runs three steps per agent:
//! 1. `snap_to_floor_or_fall`: classify ground contact and hold the hover window.
//! 2. `compute_velocity`: turn input, gravity and contact into a pending displacement.
//! 3. `apply_move`: consume the pending displacement against the sweep result.
//!
//! The orchestrator sweeps every agent between steps 2 and 3 so that moving agents see
//! each other.

use log::{debug, trace};

use crate::constants::{FLOOR_CHECK_DIST, KINDA_SMALL_NUMBER, MAX_FLOOR_DIST, MIN_FLOOR_DIST};
use crate::movement::ramp::{ramp_vector, slide_down_vector, slide_vector};
use crate::movement::resolve::{CornerSlide, find_floor, resolve_hit, step_up};
use crate::movement::state::{AgentMoveData, GroundState};
use crate::query::{ShapeQuery, SweepHit};
use crate::types::{Delta, Vec3, up};

/// Re-acquire the floor and keep the base inside the hover window.
///
/// A walkable wall contact from the previous move counts as floor without probing. A
/// rising airborne agent skips the probe so jumps are not snapped back down.
pub fn snap_to_floor_or_fall<Q: ShapeQuery + ?Sized>(md: &mut AgentMoveData, query: &Q) {
    md.was_grounded_last_tick = md.ground_state.is_grounded();

    if md.wall_normal != Vec3::zeros() && md.is_walkable(&md.wall_normal) {
        md.floor_normal = md.wall_normal;
        land(md);
        return;
    }

    if md.ground_state == GroundState::Airborne && md.velocity.y > 0.0 {
        return;
    }

    let floor = find_floor(
        query,
        &md.capsule,
        md.position,
        FLOOR_CHECK_DIST,
        md.config.collision_mask,
    );
    let Some(floor) = floor else {
        if md.ground_state != GroundState::Airborne {
            trace!("lost floor at {:?}", md.position);
        }
        md.ground_state = GroundState::Airborne;
        md.floor_normal = Vec3::zeros();
        return;
    };

    let gap = floor.distance;
    if !(MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&gap) {
        md.position += up() * (gap.clamp(MIN_FLOOR_DIST, MAX_FLOOR_DIST) - gap);
    }

    md.floor_normal = floor.normal;
    if md.is_walkable(&floor.normal) {
        land(md);
    } else {
        md.ground_state = GroundState::SlidingDown;
    }
}

fn land(md: &mut AgentMoveData) {
    md.ground_state = GroundState::Grounded;
    md.jump_count = 0;
    if md.velocity.y < 0.0 {
        md.velocity.y = 0.0;
    }
}

/// Move `current` toward `target` by at most `max_step`.
fn approach(current: Vec3, target: Vec3, max_step: f32) -> Vec3 {
    let diff = target - current;
    let dist = diff.norm();
    if dist <= max_step || dist <= KINDA_SMALL_NUMBER {
        target
    } else {
        current + diff * (max_step / dist)
    }
}

fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Plan this pass's displacement from the state, the input and the remaining time.
///
/// `first_pass` gates one-shot effects (the jump impulse).
pub fn compute_velocity(md: &mut AgentMoveData, first_pass: bool) {
    md.pending = Delta::zero();
    md.slide_normal = None;
    let dt = md.dt;
    if dt < KINDA_SMALL_NUMBER {
        return;
    }
    let cfg = md.config;

    if first_pass && md.jump_requested {
        md.jump_requested = false;
        // The first jump needs ground; extra jumps need a jump already in progress.
        let can_jump = if md.ground_state.is_grounded() {
            cfg.max_jumps > 0
        } else {
            md.jump_count > 0 && md.jump_count < cfg.max_jumps
        };
        if can_jump {
            md.velocity.y = cfg.jump_speed;
            md.jump_count += 1;
            md.ground_state = GroundState::Airborne;
        }
    }

    match md.ground_state {
        GroundState::Grounded => {
            let target = md.move_direction * cfg.max_ground_speed;
            let planar = if cfg.ground_acceleration.is_infinite() {
                target
            } else {
                approach(horizontal(md.velocity), target, cfg.ground_acceleration * dt)
            };
            let delta = planar * dt;
            let wall = md.wall_normal;
            let into_wall = wall != Vec3::zeros()
                && !md.is_walkable(&wall)
                && delta.dot(&wall) < 0.0;

            let moved = if into_wall {
                let slid = slide_vector(delta, wall, cfg.min_walkable_y, true);
                md.slide_normal = Some(wall);
                slid
            } else {
                ramp_vector(delta, md.floor_normal)
            };
            md.velocity = moved / dt;
            md.pending = Delta::from_vector(moved);
        }
        GroundState::Airborne => {
            let target = md.move_direction * cfg.max_air_speed;
            let planar = approach(horizontal(md.velocity), target, cfg.air_acceleration * dt);
            let vy = (md.velocity.y - cfg.gravity * dt).max(-cfg.terminal_fall_speed);
            let mut v = Vec3::new(planar.x, vy, planar.z);

            // Falling along a wall keeps the tangential part only.
            let wall = md.wall_normal;
            if wall != Vec3::zeros() && v.dot(&wall) < 0.0 {
                v -= wall * v.dot(&wall);
                md.slide_normal = Some(wall);
            }
            md.velocity = v;
            md.pending = Delta::from_vector(v * dt);
        }
        GroundState::SlidingDown => {
            let vy = (md.velocity.y - cfg.gravity * dt).max(-cfg.terminal_fall_speed);
            let v = slide_down_vector(Vec3::new(md.velocity.x, vy, md.velocity.z), md.floor_normal);
            md.velocity = v;
            md.slide_normal = Some(md.floor_normal);
            md.pending = Delta::from_vector(v * dt);
        }
    }
}

/// Consume the pending displacement given this pass's nearest sweep hit.
///
/// Unobstructed moves use up the whole remaining time. Blocked moves stop at the hit,
/// record the surface as the wall normal and keep the unused fraction of the time for the
/// next pass. A blocked slide redirects into the second surface once; a blocked grounded
/// walk may step up onto a low ledge.
pub fn apply_move<Q: ShapeQuery + ?Sized>(
    md: &mut AgentMoveData,
    hit: Option<SweepHit>,
    query: &Q,
) {
    let delta = md.pending;
    md.pending = Delta::zero();
    if md.dt < KINDA_SMALL_NUMBER || delta.is_zero() {
        md.dt = 0.0;
        md.wall_normal = Vec3::zeros();
        return;
    }

    let mask = md.config.collision_mask;
    let start = md.position;
    let result = resolve_hit(query, &md.capsule, start, delta, hit, mask);
    result.placement.record(&mut md.events);
    md.position = result.position;

    let Some(hit) = result.hit else {
        md.dt = 0.0;
        md.wall_normal = Vec3::zeros();
        return;
    };

    md.wall_normal = hit.normal;
    md.dt *= 1.0 - result.time;

    // Stop pushing into whatever we hit.
    let into = md.velocity.dot(&hit.normal);
    if into < 0.0 {
        md.velocity -= hit.normal * into;
    }

    let on_floor = md.ground_state.is_grounded();
    let walkable = md.is_walkable(&hit.normal);

    if let Some(sliding) = md.slide_normal {
        if md.dt >= KINDA_SMALL_NUMBER && !walkable {
            let corner = CornerSlide {
                remaining: delta * (1.0 - result.time),
                struck: hit.normal,
                sliding,
                forward: delta.dir,
                on_floor,
                min_walkable_y: md.config.min_walkable_y,
            };
            if let Some(second) =
                corner.apply(query, &md.capsule, md.position, mask, &mut md.events)
            {
                md.position = second.position;
                if let Some(h) = second.hit {
                    md.wall_normal = h.normal;
                }
                md.dt = 0.0;
            }
        }
        return;
    }

    if on_floor && !walkable && md.config.step_height > 0.0 {
        if let Some(p) = step_up(
            query,
            &md.capsule,
            md.position,
            delta.dir,
            md.config.step_height,
            md.config.min_walkable_y,
            mask,
        ) {
            debug!("stepped up from {:?} to {p:?}", md.position);
            md.position = p;
            md.wall_normal = Vec3::zeros();
            md.events.step_ups += 1;
        }
    }
}
