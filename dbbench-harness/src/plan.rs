//! Suite plans.
//!
//! A plan is an ordered list of [`Scenario`]s. Each scenario writes one
//! fixture in its setup step and then runs zero or more probes against it.
//! Step names are a zero-padded sequence number plus a snake_case label, so
//! sorting the report lexically reproduces execution order.

use dbbench_core::{generate, PlanKind};
use dbbench_storage::Capability;

// ============================================================================
// STEPS
// ============================================================================

/// Data-creating step that opens a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    /// `n` artifacts, one round trip each.
    CreateEach(usize),
    /// `n` artifacts in one bulk insert.
    CreateMany(usize),
    /// `n` connected pairs.
    CreatePairs(usize),
    /// `repeat` chains of `len` artifacts.
    CreateChains { len: usize, repeat: usize },
    /// One root with `n - 1` children.
    CreateStar(usize),
}

impl Setup {
    pub fn capability(&self) -> Capability {
        match self {
            Setup::CreateEach(_) => Capability::CreateEach,
            Setup::CreateMany(_) => Capability::CreateMany,
            Setup::CreatePairs(_) => Capability::CreatePairs,
            Setup::CreateChains { .. } => Capability::CreateChain,
            Setup::CreateStar(_) => Capability::CreateStar,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Setup::CreateEach(n) => format!("create_{}", n),
            Setup::CreateMany(n) => format!("bulk_create_{}", n),
            Setup::CreatePairs(n) => format!("create_pairs_{}", n),
            Setup::CreateChains { len, repeat } => format!("create_chain_{}x{}", repeat, len),
            Setup::CreateStar(n) => format!("create_star_{}", n),
        }
    }

    /// The size probes refer to: records for flat shapes, pairs, chain
    /// length, or star node count.
    pub fn size(&self) -> usize {
        match self {
            Setup::CreateEach(n)
            | Setup::CreateMany(n)
            | Setup::CreatePairs(n)
            | Setup::CreateStar(n) => *n,
            Setup::CreateChains { len, .. } => *len,
        }
    }

    /// Artifacts this step writes.
    pub fn artifacts(&self) -> u64 {
        let n = match self {
            Setup::CreateEach(n) | Setup::CreateMany(n) | Setup::CreateStar(n) => *n,
            Setup::CreatePairs(n) => n * 2,
            Setup::CreateChains { len, repeat } => len * repeat,
        };
        n as u64
    }

    /// Edges this step writes.
    pub fn edges(&self) -> u64 {
        let n = match self {
            Setup::CreateEach(_) | Setup::CreateMany(_) => 0,
            Setup::CreatePairs(n) => *n,
            Setup::CreateChains { len, repeat } => len.saturating_sub(1) * repeat,
            Setup::CreateStar(n) => n.saturating_sub(1),
        };
        n as u64
    }

    /// Whether the step writes edges (and so reports an edge total).
    pub fn is_graph(&self) -> bool {
        !matches!(self, Setup::CreateEach(_) | Setup::CreateMany(_))
    }
}

/// Read, update or query step over a scenario's fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    ReadOne,
    ReadMany,
    UpdateOne,
    UpdateMany,
    QueryAll,
    QueryPairs,
    QueryPairsInYear(i32),
    /// Neighbour exactly `k` hops from the first root.
    ChainNeighbour(usize),
    /// Item sum over hops `0..=max_hop` from the first root.
    ChainSum(usize),
    SortedNeighbours,
}

impl Probe {
    pub fn capability(&self) -> Capability {
        match self {
            Probe::ReadOne => Capability::ReadOne,
            Probe::ReadMany => Capability::ReadMany,
            Probe::UpdateOne => Capability::UpdateOne,
            Probe::UpdateMany => Capability::UpdateMany,
            Probe::QueryAll => Capability::QueryAll,
            Probe::QueryPairs => Capability::QueryPairs,
            Probe::QueryPairsInYear(_) => Capability::QueryPairsInYear,
            Probe::ChainNeighbour(_) => Capability::ChainNeighbour,
            Probe::ChainSum(_) => Capability::ChainSum,
            Probe::SortedNeighbours => Capability::SortedNeighbours,
        }
    }

    pub fn label(&self, setup: &Setup) -> String {
        let n = setup.size();
        match self {
            Probe::ReadOne => format!("read_{}", n),
            Probe::ReadMany => format!("bulk_read_{}", n),
            Probe::UpdateOne => format!("update_{}", n),
            Probe::UpdateMany => format!("bulk_update_{}", n),
            Probe::QueryAll => format!("query_all_{}", n),
            Probe::QueryPairs => format!("query_pairs_{}", n),
            Probe::QueryPairsInYear(year) => format!("query_pairs_{}_{}", year, n),
            Probe::ChainNeighbour(hop) => format!("chain_neighbour_{}", hop),
            Probe::ChainSum(max_hop) => format!("sum_chain_items_{}", max_hop + 1),
            Probe::SortedNeighbours => format!("sorted_neighbours_{}", n),
        }
    }
}

// ============================================================================
// PLANS
// ============================================================================

/// One setup step plus the probes that run against its fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub setup: Setup,
    pub probes: Vec<Probe>,
}

impl Scenario {
    pub fn new(setup: Setup) -> Self {
        Self {
            setup,
            probes: Vec::new(),
        }
    }

    pub fn probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn probes(mut self, probes: impl IntoIterator<Item = Probe>) -> Self {
        self.probes.extend(probes);
        self
    }
}

/// Ordered scenarios making up one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitePlan {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

const FLAT_PROBES: [Probe; 5] = [
    Probe::ReadOne,
    Probe::ReadMany,
    Probe::UpdateOne,
    Probe::UpdateMany,
    Probe::QueryAll,
];

impl SuitePlan {
    pub fn for_kind(kind: PlanKind) -> Self {
        match kind {
            PlanKind::Standard => Self::standard(),
            PlanKind::Small => Self::small(),
        }
    }

    /// The full 27-step workload over 10 000-record fixtures.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            scenarios: vec![
                Scenario::new(Setup::CreateEach(10)),
                Scenario::new(Setup::CreateEach(100)),
                Scenario::new(Setup::CreateEach(1000)),
                Scenario::new(Setup::CreateMany(1000)),
                Scenario::new(Setup::CreateMany(10_000)).probes(FLAT_PROBES),
                Scenario::new(Setup::CreatePairs(10)),
                Scenario::new(Setup::CreatePairs(100)),
                Scenario::new(Setup::CreatePairs(10_000))
                    .probe(Probe::QueryPairs)
                    .probe(Probe::QueryPairsInYear(2022)),
                Scenario::new(Setup::CreateChains {
                    len: 10_000,
                    repeat: 1,
                })
                .probes([10, 100, 1000, 2000, 5000, 7000].map(Probe::ChainNeighbour))
                .probe(Probe::ChainSum(4999)),
                Scenario::new(Setup::CreateStar(100)),
                Scenario::new(Setup::CreateStar(1000)),
                Scenario::new(Setup::CreateStar(10_000)).probe(Probe::SortedNeighbours),
            ],
        }
    }

    /// Same shape as [`SuitePlan::standard`] at sizes an in-process backend
    /// runs in well under a second.
    pub fn small() -> Self {
        Self {
            name: "small".to_string(),
            scenarios: vec![
                Scenario::new(Setup::CreateEach(10)),
                Scenario::new(Setup::CreateEach(100)),
                Scenario::new(Setup::CreateMany(100)),
                Scenario::new(Setup::CreateMany(1000)).probes(FLAT_PROBES),
                Scenario::new(Setup::CreatePairs(10)),
                Scenario::new(Setup::CreatePairs(1000))
                    .probe(Probe::QueryPairs)
                    .probe(Probe::QueryPairsInYear(2001)),
                Scenario::new(Setup::CreateChains { len: 500, repeat: 1 })
                    .probes([10, 100, 250, 499].map(Probe::ChainNeighbour))
                    .probe(Probe::ChainSum(249)),
                Scenario::new(Setup::CreateStar(10)),
                Scenario::new(Setup::CreateStar(100)).probe(Probe::SortedNeighbours),
            ],
        }
    }

    /// Number of steps, setups included.
    pub fn step_count(&self) -> usize {
        self.scenarios.iter().map(|s| 1 + s.probes.len()).sum()
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.step_count());
        for scenario in &self.scenarios {
            names.push(step_name(names.len() + 1, &scenario.setup.label()));
            for probe in &scenario.probes {
                names.push(step_name(names.len() + 1, &probe.label(&scenario.setup)));
            }
        }
        names
    }

    /// Calendar years probed by year-filtered pair queries.
    pub fn probed_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .scenarios
            .iter()
            .flat_map(|s| s.probes.iter())
            .filter_map(|p| match p {
                Probe::QueryPairsInYear(year) => Some(*year),
                _ => None,
            })
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn uses(&self, capability: Capability) -> bool {
        self.scenarios.iter().any(|s| {
            s.setup.capability() == capability
                || s.probes.iter().any(|p| p.capability() == capability)
        })
    }
}

/// Zero-padded so lexical order equals execution order up to 99 steps.
pub fn step_name(seq: usize, label: &str) -> String {
    format!("{:02}_{}", seq, label)
}

/// Pairs created on days that fall within `year`.
pub fn expected_pairs_in_year(pairs: usize, year: i32) -> u64 {
    generate::days_in_year_within(pairs, year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plan_names() {
        let names = SuitePlan::standard().step_names();
        assert_eq!(names.len(), 27);
        assert_eq!(names[0], "01_create_10");
        assert_eq!(names[3], "04_bulk_create_1000");
        assert_eq!(names[6], "07_bulk_read_10000");
        assert_eq!(names[9], "10_query_all_10000");
        assert_eq!(names[12], "13_create_pairs_10000");
        assert_eq!(names[14], "15_query_pairs_2022_10000");
        assert_eq!(names[15], "16_create_chain_1x10000");
        assert_eq!(names[21], "22_chain_neighbour_7000");
        assert_eq!(names[22], "23_sum_chain_items_5000");
        assert_eq!(names[26], "27_sorted_neighbours_10000");
    }

    #[test]
    fn test_names_sort_in_execution_order() {
        for plan in [SuitePlan::standard(), SuitePlan::small()] {
            let names = plan.step_names();
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(names, sorted);
        }
    }

    #[test]
    fn test_setup_arithmetic() {
        let chain = Setup::CreateChains { len: 10, repeat: 3 };
        assert_eq!(chain.artifacts(), 30);
        assert_eq!(chain.edges(), 27);
        assert_eq!(Setup::CreatePairs(7).artifacts(), 14);
        assert_eq!(Setup::CreatePairs(7).edges(), 7);
        assert_eq!(Setup::CreateStar(1).edges(), 0);
        assert_eq!(Setup::CreateStar(0).edges(), 0);
        assert_eq!(Setup::CreateChains { len: 0, repeat: 4 }.edges(), 0);
        assert!(!Setup::CreateMany(5).is_graph());
    }

    #[test]
    fn test_year_expectations() {
        assert_eq!(expected_pairs_in_year(10_000, 2022), 365);
        assert_eq!(expected_pairs_in_year(1000, 2001), 365);
        assert_eq!(expected_pairs_in_year(1000, 2000), 366);
    }

    #[test]
    fn test_probed_years_and_uses() {
        let plan = SuitePlan::standard();
        assert_eq!(plan.probed_years(), vec![2022]);
        assert!(plan.uses(Capability::SortedNeighbours));

        let flat = SuitePlan {
            name: "flat".to_string(),
            scenarios: vec![Scenario::new(Setup::CreateMany(3))],
        };
        assert!(flat.probed_years().is_empty());
        assert!(!flat.uses(Capability::QueryPairs));
    }
}
