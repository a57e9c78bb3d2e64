//! Route ordering within a direction
//!
//! Routes of one direction carry dense ranks `0..n-1`. A move takes a route
//! out of the ranked list and reinserts it at the target position; the
//! routes in between shift by one. Targets past the end are clamped.

use smsgate_shared::{Direction, Route};

/// A move that changes the ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub route_id: String,
    pub direction: Direction,
    pub from: u32,
    pub to: u32,
}

/// One position up or down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

/// Routes of `direction`, in evaluation order
pub fn ranked(routes: &[Route], direction: Direction) -> Vec<&Route> {
    let mut ranked: Vec<&Route> = routes.iter().filter(|r| r.direction == direction).collect();
    ranked.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    ranked
}

/// Plan moving `route_id` to `target`; `None` if the route is unknown or
/// the move would not change anything
pub fn plan_move(routes: &[Route], route_id: &str, target: u32) -> Option<MovePlan> {
    let direction = routes.iter().find(|r| r.id == route_id)?.direction;
    let ranked = ranked(routes, direction);
    let from = ranked.iter().position(|r| r.id == route_id)?;
    let to = (target as usize).min(ranked.len().saturating_sub(1));
    if from == to {
        return None;
    }
    Some(MovePlan {
        route_id: route_id.to_string(),
        direction,
        from: from as u32,
        to: to as u32,
    })
}

/// Plan a single step; moving the first route up or the last one down is a no-op
pub fn plan_step(routes: &[Route], route_id: &str, step: Step) -> Option<MovePlan> {
    let direction = routes.iter().find(|r| r.id == route_id)?.direction;
    let position = ranked(routes, direction).iter().position(|r| r.id == route_id)? as u32;
    let target = match step {
        Step::Up => position.checked_sub(1)?,
        Step::Down => position + 1,
    };
    plan_move(routes, route_id, target)
}

/// Apply an accepted move and renumber the direction densely
pub fn apply_move(routes: &mut [Route], plan: &MovePlan) {
    let mut ids: Vec<String> = ranked(routes, plan.direction)
        .into_iter()
        .map(|r| r.id.clone())
        .collect();
    let Some(from) = ids.iter().position(|id| *id == plan.route_id) else {
        return;
    };
    let moved = ids.remove(from);
    let to = (plan.to as usize).min(ids.len());
    ids.insert(to, moved);
    assign_ranks(routes, plan.direction, &ids);
}

/// Close gaps left by deletions, keeping the relative order
pub fn renumber(routes: &mut [Route], direction: Direction) {
    let ids: Vec<String> = ranked(routes, direction)
        .into_iter()
        .map(|r| r.id.clone())
        .collect();
    assign_ranks(routes, direction, &ids);
}

fn assign_ranks(routes: &mut [Route], direction: Direction, ids: &[String]) {
    for route in routes.iter_mut().filter(|r| r.direction == direction) {
        if let Some(rank) = ids.iter().position(|id| *id == route.id) {
            route.order = rank as u32;
        }
    }
}
