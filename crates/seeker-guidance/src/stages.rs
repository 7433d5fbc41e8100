//! Flight stage state machine.
//!
//! Pure functions that compute stage transitions for one projectile from a
//! snapshot of its situation. Evaluated on the medium pass; the caller applies
//! the returned update and any side effects it requests.

use seeker_core::enums::Stage;

/// Input to the stage machine for a single projectile.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub stage: Stage,
    /// Round is laser guided.
    pub semi_active: bool,
    /// Configured boost distance (m); zero skips boost.
    pub boost_distance: f64,
    /// A gravity field was found at launch.
    pub has_gravity: bool,
    /// Distance travelled along the rail since launch (m).
    pub rail_travel: f64,
    /// Rail exit distance, twice the projectile's own diagonal (m).
    pub arming_distance: f64,
    /// Straight-line distance from the launch point (m).
    pub distance_from_launch: f64,
    /// Distance to the current target, if one is held (m).
    pub distance_to_target: Option<f64>,
    /// Current simulation time (s).
    pub now: f64,
    /// Time at which guidance expires, once the countdown has started.
    pub guidance_expires_at: Option<f64>,
}

/// Output from the stage machine.
#[derive(Debug, Clone, PartialEq)]
pub struct StageUpdate {
    pub new_stage: Stage,
    pub stage_changed: bool,
    /// Caller should start the guidance countdown now.
    pub start_guidance_timer: bool,
    /// Caller should drop gravity data.
    pub clear_gravity: bool,
    /// Caller should drop rail data.
    pub clear_rail: bool,
}

impl StageUpdate {
    fn unchanged(stage: Stage) -> Self {
        Self {
            new_stage: stage,
            stage_changed: false,
            start_guidance_timer: false,
            clear_gravity: false,
            clear_rail: false,
        }
    }

    fn to(stage: Stage) -> Self {
        Self {
            new_stage: stage,
            stage_changed: true,
            start_guidance_timer: stage.has_guidance_timer(),
            clear_gravity: false,
            clear_rail: false,
        }
    }
}

/// The stage a projectile enters on leaving the rail (or immediately, for
/// rounds fired from a slewing mount).
///
/// Boost without a gravity field cannot be flown and terminates the round.
pub fn stage_after_rail(semi_active: bool, boost_distance: f64, has_gravity: bool) -> Stage {
    if semi_active {
        Stage::SemiActive
    } else if boost_distance > 0.0 {
        if has_gravity {
            Stage::Boost
        } else {
            Stage::Terminated
        }
    } else {
        Stage::Guided
    }
}

/// Evaluate the stage machine for one projectile.
pub fn evaluate(ctx: &StageContext) -> StageUpdate {
    match ctx.stage {
        Stage::Rail => evaluate_rail(ctx),
        Stage::Boost => evaluate_boost(ctx),
        Stage::MidCourse => evaluate_midcourse(ctx),
        Stage::SemiActive | Stage::Guided => evaluate_guidance_timer(ctx),
        Stage::Ballistic | Stage::Terminated | Stage::Exploded => StageUpdate::unchanged(ctx.stage),
    }
}

fn evaluate_rail(ctx: &StageContext) -> StageUpdate {
    if ctx.rail_travel < ctx.arming_distance {
        return StageUpdate::unchanged(ctx.stage);
    }
    let next = stage_after_rail(ctx.semi_active, ctx.boost_distance, ctx.has_gravity);
    StageUpdate {
        clear_rail: true,
        ..StageUpdate::to(next)
    }
}

fn evaluate_boost(ctx: &StageContext) -> StageUpdate {
    if !ctx.has_gravity {
        return StageUpdate::to(Stage::Terminated);
    }
    if ctx.distance_from_launch >= ctx.boost_distance {
        return StageUpdate::to(Stage::MidCourse);
    }
    StageUpdate::unchanged(ctx.stage)
}

fn evaluate_midcourse(ctx: &StageContext) -> StageUpdate {
    match ctx.distance_to_target {
        Some(to_target) if to_target < ctx.distance_from_launch => StageUpdate {
            clear_gravity: true,
            ..StageUpdate::to(Stage::Guided)
        },
        _ => StageUpdate::unchanged(ctx.stage),
    }
}

fn evaluate_guidance_timer(ctx: &StageContext) -> StageUpdate {
    match ctx.guidance_expires_at {
        Some(expires) if ctx.now >= expires => StageUpdate::to(Stage::Ballistic),
        _ => StageUpdate::unchanged(ctx.stage),
    }
}
