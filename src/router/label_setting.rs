// Multi-criteria label setting.
//
// A lexicographic binary heap of open labels and a Pareto front per node.
// Labels live in an arena and point at their predecessor by index; the
// whole arena is dropped at the end of the query. A popped label is final
// for its criterion vector; dominated insertions are no-ops and dominated
// front entries are evicted, leaving their queue entries to be skipped as
// stale when popped.
//
// Criteria: time (negated under reverse), transfer count (unless the
// request ignores transfers), walk meters on the current leg, transfer
// walk meters on the current leg, and under profile queries the instant of
// the first boarding, compared so that a later departure is better.
// Distinct departures in a profile query differ in that last dimension;
// labels tying on the complete vector are duplicates and collapse onto
// the first.

use ahash::AHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{EdgeId, NodeId};
use crate::router::explorer::GraphExplorer;

pub const DEFAULT_MAX_VISITED_NODES: usize = 1_000_000;

#[derive(Clone, Copy)]
pub struct SearchParams {
    pub reverse: bool,
    /// When false, transfer count drops out of the dominance comparison.
    pub transfer_criterion: bool,
    pub profile_query: bool,
    pub max_walk_meters_per_leg: Option<u32>,
    pub max_transfer_meters_per_leg: Option<u32>,
    pub max_visited_nodes: usize,
    pub limit_solutions: usize,
    /// Consistent lower bound on the remaining seconds to the target, used
    /// to order the queue. Zero when absent.
    pub remaining_estimate: Option<fn(NodeId) -> i64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            reverse: false,
            transfer_criterion: true,
            profile_query: false,
            max_walk_meters_per_leg: None,
            max_transfer_meters_per_leg: None,
            max_visited_nodes: DEFAULT_MAX_VISITED_NODES,
            limit_solutions: usize::MAX,
            remaining_estimate: None,
        }
    }
}

/// One state of the search. `edge` is the edge consumed to reach `node`
/// (`None` on the start label), `parent` the arena index of the
/// predecessor.
#[derive(Clone, Debug)]
pub struct Label {
    pub time: i64,
    pub node: NodeId,
    pub edge: Option<EdgeId>,
    pub n_transfers: u32,
    pub walk_distance_on_leg: u32,
    pub transfer_distance_on_leg: u32,
    pub first_pt_departure_time: Option<i64>,
    pub residual_cost_underestimate: i64,
    pub parent: Option<u32>,
}

pub struct SearchOutcome {
    pub arena: Vec<Label>,
    /// Arena indices of destination labels, in emission order.
    pub solutions: Vec<u32>,
    /// Pareto fronts by node, for callers that harvest non-destination
    /// labels (the station-access pass).
    pub fronts: AHashMap<NodeId, Vec<u32>>,
    pub visited_nodes: usize,
    pub exhausted: bool,
}

struct OpenEntry {
    key: i64,
    transfers: u32,
    seq: u64,
    label: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

// Flipped so the max-heap pops the lexicographically smallest
// (key, transfers, insertion seq).
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.transfers.cmp(&self.transfers))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `a` dominates `b` at the same node: weakly better on every active
/// criterion. A tie on the complete vector counts as domination, so the
/// first label wins deterministically; under profile queries alternative
/// departures differ in the boarding-instant dimension and survive on
/// their own.
fn dominates(params: &SearchParams, a: &Label, b: &Label) -> bool {
    let dir = if params.reverse { -1 } else { 1 };

    if dir * a.time > dir * b.time {
        return false;
    }
    if params.transfer_criterion && a.n_transfers > b.n_transfers {
        return false;
    }
    if a.walk_distance_on_leg > b.walk_distance_on_leg {
        return false;
    }
    if a.transfer_distance_on_leg > b.transfer_distance_on_leg {
        return false;
    }
    if params.profile_query {
        // Later (in the traversal direction) first boarding is better;
        // unboarded labels are bounded by their current time.
        let ea = -dir * a.first_pt_departure_time.unwrap_or(a.time);
        let eb = -dir * b.first_pt_departure_time.unwrap_or(b.time);
        if ea > eb {
            return false;
        }
    }
    true
}

pub struct MultiCriteriaLabelSetting<'a, 'b> {
    pub explorer: &'a GraphExplorer<'b>,
    pub params: SearchParams,
}

impl<'a, 'b> MultiCriteriaLabelSetting<'a, 'b> {
    pub fn new(explorer: &'a GraphExplorer<'b>, params: SearchParams) -> Self {
        MultiCriteriaLabelSetting { explorer, params }
    }

    /// Runs the search from `start` at `start_time`. With a destination the
    /// loop emits settled destination labels until the solution limit; with
    /// `None` it settles the whole reachable Pareto set (the access pass).
    pub fn run(
        &self,
        start: NodeId,
        start_time: i64,
        destination: Option<NodeId>,
        mut visitor: Option<&mut dyn FnMut(&Label)>,
    ) -> SearchOutcome {
        let params = &self.params;
        let dir: i64 = if params.reverse { -1 } else { 1 };

        let mut arena: Vec<Label> = Vec::new();
        let mut fronts: AHashMap<NodeId, Vec<u32>> = AHashMap::new();
        let mut queue: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut solutions: Vec<u32> = Vec::new();
        let mut seq: u64 = 0;
        let mut visited_nodes = 0usize;
        let mut exhausted = false;
        // Profile departure window, closed by the first destination arrival.
        let mut window_end: Option<i64> = None;

        let start_label = Label {
            time: start_time,
            node: start,
            edge: None,
            n_transfers: 0,
            walk_distance_on_leg: 0,
            transfer_distance_on_leg: 0,
            first_pt_departure_time: None,
            residual_cost_underestimate: params
                .remaining_estimate
                .map(|estimate| estimate(start))
                .unwrap_or(0),
            parent: None,
        };
        insert(params, &mut arena, &mut fronts, &mut queue, &mut seq, dir, start_label);

        while let Some(entry) = queue.pop() {
            // Evicted by a dominating sibling after being queued.
            let settled = fronts
                .get(&arena[entry.label as usize].node)
                .map_or(false, |front| front.contains(&entry.label));
            if !settled {
                continue;
            }

            if visited_nodes >= params.max_visited_nodes {
                exhausted = true;
                log::debug!(
                    "visit budget of {} exhausted, returning best-so-far",
                    params.max_visited_nodes
                );
                break;
            }
            visited_nodes += 1;

            let label = arena[entry.label as usize].clone();
            if let Some(v) = visitor.as_mut() {
                v(&label);
            }

            if let Some(end) = window_end {
                let bound = label.first_pt_departure_time.unwrap_or(label.time);
                if dir * bound > dir * end {
                    continue;
                }
            }

            if destination == Some(label.node) {
                solutions.push(entry.label);
                if params.profile_query && window_end.is_none() {
                    window_end = Some(label.time);
                }
                if solutions.len() >= params.limit_solutions {
                    break;
                }
                continue;
            }

            self.explorer.for_each_edge(label.node, label.time, &mut |explored| {
                let successor_time = label.time + dir * explored.cost.seconds;

                let (mut walk, mut transfer_walk) = if explored.kind.resets_leg() {
                    (0, 0)
                } else {
                    (label.walk_distance_on_leg, label.transfer_distance_on_leg)
                };
                walk += explored.cost.walk_meters;
                transfer_walk += explored.cost.transfer_meters;
                if params.max_walk_meters_per_leg.is_some_and(|max| walk > max) {
                    return;
                }
                if params
                    .max_transfer_meters_per_leg
                    .is_some_and(|max| transfer_walk > max)
                {
                    return;
                }

                let first_pt_departure_time = label.first_pt_departure_time.or_else(|| {
                    if explored.cost.boards > 0 {
                        // The boarding instant: in reverse traversal the
                        // label side of the Board edge is the departure.
                        Some(if params.reverse { label.time } else { successor_time })
                    } else {
                        None
                    }
                });

                if params.profile_query {
                    if let Some(end) = window_end {
                        let bound = first_pt_departure_time.unwrap_or(successor_time);
                        if dir * bound > dir * end {
                            return;
                        }
                    }
                }

                let successor = Label {
                    time: successor_time,
                    node: explored.neighbor,
                    edge: Some(explored.edge),
                    n_transfers: label.n_transfers + explored.cost.boards as u32,
                    walk_distance_on_leg: walk,
                    transfer_distance_on_leg: transfer_walk,
                    first_pt_departure_time,
                    residual_cost_underestimate: params
                        .remaining_estimate
                        .map(|estimate| estimate(explored.neighbor))
                        .unwrap_or(0),
                    parent: Some(entry.label),
                };
                insert(params, &mut arena, &mut fronts, &mut queue, &mut seq, dir, successor);
            });
        }

        SearchOutcome {
            arena,
            solutions,
            fronts,
            visited_nodes,
            exhausted,
        }
    }
}

/// Pareto insertion: drop the candidate if dominated, otherwise evict what
/// it dominates and queue it.
fn insert(
    params: &SearchParams,
    arena: &mut Vec<Label>,
    fronts: &mut AHashMap<NodeId, Vec<u32>>,
    queue: &mut BinaryHeap<OpenEntry>,
    seq: &mut u64,
    dir: i64,
    candidate: Label,
) {
    let front = fronts.entry(candidate.node).or_default();
    for &existing in front.iter() {
        if dominates(params, &arena[existing as usize], &candidate) {
            return;
        }
    }
    front.retain(|&existing| !dominates(params, &candidate, &arena[existing as usize]));

    let idx = arena.len() as u32;
    front.push(idx);
    queue.push(OpenEntry {
        key: dir * candidate.time + candidate.residual_cost_underestimate,
        transfers: candidate.n_transfers,
        seq: *seq,
        label: idx,
    });
    *seq += 1;
    arena.push(candidate);
}
