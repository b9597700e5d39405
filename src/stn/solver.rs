use serde::{Deserialize, Serialize};

use super::error::StnError;
use super::graph::{Stn, ZTP};

/// Which concrete STN solver backs an [`AllocationMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    /// Full path consistency: plain earliest/latest window, zero risk.
    Fpc,
    /// Stochastic risk-aware execution approximation: same window, plus a
    /// risk metric derived from the tightest slack in the network.
    Srea,
    /// Deterministic stand-in for a distributed/dynamic controllability
    /// check: same window, coarser risk metric (count of zero-slack edges).
    Dsc,
}

/// The allocation method named in configuration (`tessi`, `tessi-srea`,
/// `tessi-dsc`), each of which selects an [`SolverKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationMethod {
    Tessi,
    TessiSrea,
    TessiDsc,
}

impl AllocationMethod {
    pub fn solver_kind(self) -> SolverKind {
        match self {
            AllocationMethod::Tessi => SolverKind::Fpc,
            AllocationMethod::TessiSrea => SolverKind::Srea,
            AllocationMethod::TessiDsc => SolverKind::Dsc,
        }
    }

    pub fn solver(self) -> Box<dyn StnSolver> {
        self.solver_kind().build()
    }
}

impl SolverKind {
    pub fn build(self) -> Box<dyn StnSolver> {
        match self {
            SolverKind::Fpc => Box::new(FullPathConsistency),
            SolverKind::Srea => Box::new(StochasticRiskAware),
            SolverKind::Dsc => Box::new(DistributedStandIn),
        }
    }
}

/// The external STN-solver contract used by the bidding rule: given a
/// temporal network, produce its dispatchable (minimal) form and a
/// risk metric describing how robust the resulting schedule is.
pub trait StnSolver: Send + Sync {
    fn kind(&self) -> SolverKind;

    /// Computes the dispatchable graph. `Err(StnError::NoSolution)` means
    /// the network is inconsistent — callers translate this to
    /// `NoSTPSolution`.
    fn solve(&self, stn: &Stn) -> Result<Stn, StnError> {
        stn.minimal_network()
    }

    /// Risk metric computed from an already-solved dispatchable graph.
    /// Smaller is safer; `0.0` means no risk under this solver's semantics.
    fn risk_metric(&self, dispatchable: &Stn) -> f64;
}

struct FullPathConsistency;

impl StnSolver for FullPathConsistency {
    fn kind(&self) -> SolverKind {
        SolverKind::Fpc
    }

    fn risk_metric(&self, _dispatchable: &Stn) -> f64 {
        0.0
    }
}

struct StochasticRiskAware;

impl StnSolver for StochasticRiskAware {
    fn kind(&self) -> SolverKind {
        SolverKind::Srea
    }

    fn risk_metric(&self, dispatchable: &Stn) -> f64 {
        let min_slack = min_slack_to_ztp(dispatchable);
        match min_slack {
            Some(slack) if slack.is_finite() && slack >= 0.0 => 1.0 / (1.0 + slack),
            _ => 1.0,
        }
    }
}

struct DistributedStandIn;

impl StnSolver for DistributedStandIn {
    fn kind(&self) -> SolverKind {
        SolverKind::Dsc
    }

    fn risk_metric(&self, dispatchable: &Stn) -> f64 {
        count_zero_slack_edges(dispatchable) as f64
    }
}

fn min_slack_to_ztp(dispatchable: &Stn) -> Option<f64> {
    dispatchable
        .node_indices()
        .filter(|&n| n != ZTP)
        .filter_map(|n| {
            let earliest = dispatchable.get_time(n, true).ok()?;
            let latest = dispatchable.get_time(n, false).ok()?;
            Some(latest - earliest)
        })
        .fold(None, |acc, slack| match acc {
            None => Some(slack),
            Some(current) if slack < current => Some(slack),
            Some(current) => Some(current),
        })
}

fn count_zero_slack_edges(dispatchable: &Stn) -> usize {
    dispatchable
        .node_indices()
        .filter(|&n| n != ZTP)
        .filter(|&n| {
            matches!(
                (dispatchable.get_time(n, true), dispatchable.get_time(n, false)),
                (Ok(a), Ok(b)) if (b - a).abs() < 1e-9
            )
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stn::graph::NodeKind;

    #[test]
    fn fpc_reports_zero_risk() {
        let mut stn = Stn::new();
        let start = stn.add_timepoint(NodeKind::Start);
        stn.set_constraint(ZTP, start, 10.0, 30.0);
        let solver = SolverKind::Fpc.build();
        let dispatchable = solver.solve(&stn).unwrap();
        assert_eq!(solver.risk_metric(&dispatchable), 0.0);
    }

    #[test]
    fn srea_prefers_slacker_schedule() {
        let mut tight = Stn::new();
        let start = tight.add_timepoint(NodeKind::Start);
        tight.set_constraint(ZTP, start, 10.0, 10.0);

        let mut slack = Stn::new();
        let start2 = slack.add_timepoint(NodeKind::Start);
        slack.set_constraint(ZTP, start2, 10.0, 100.0);

        let solver = SolverKind::Srea.build();
        let tight_d = solver.solve(&tight).unwrap();
        let slack_d = solver.solve(&slack).unwrap();

        assert!(solver.risk_metric(&tight_d) > solver.risk_metric(&slack_d));
    }
}
