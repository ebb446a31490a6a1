use crate::{brackets::FactionBracketTable, census::BracketMember};

/// A surplus agent together with its safety verdict at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub member: BracketMember,
    pub safe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Reset now.
    Immediate,
    /// Queue a pending reset, re-validated when drained.
    Deferred,
}

impl MoveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveKind::Immediate => "immediate",
            MoveKind::Deferred => "deferred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    pub member: BracketMember,
    pub from: usize,
    pub to: usize,
    pub kind: MoveKind,
}

/// Greedily move surplus agents into deficit brackets.
///
/// Brackets are processed in index order. For each surplus bracket the
/// deficit targets are fixed when processing starts and consumed lowest index
/// first; safe candidates go before unsafe ones. `actual` is updated as moves
/// are decided so later brackets see the new picture.
pub fn plan_moves(
    table: &FactionBracketTable,
    actual: &mut [u32],
    desired: &[u32],
    candidates: &[Vec<Candidate>],
) -> Vec<PlannedMove> {
    let mut moves = Vec::new();
    let brackets = actual.len().min(desired.len()).min(table.len());

    for source in 0..brackets {
        if actual[source] <= desired[source] {
            continue;
        }
        let targets: Vec<usize> = (0..brackets)
            .filter(|&j| actual[j] < desired[j])
            .collect();
        if targets.is_empty() {
            continue;
        }
        let pool = candidates.get(source).map(Vec::as_slice).unwrap_or(&[]);
        let ordered = pool
            .iter()
            .filter(|c| c.safe)
            .chain(pool.iter().filter(|c| !c.safe));

        let mut head = 0;
        for candidate in ordered {
            if actual[source] <= desired[source] {
                break;
            }
            while head < targets.len() && actual[targets[head]] >= desired[targets[head]] {
                head += 1;
            }
            if head == targets.len() {
                break;
            }
            let Some(target) = targets[head..].iter().copied().find(|&j| {
                actual[j] < desired[j]
                    && table
                        .get(j)
                        .is_some_and(|bracket| bracket.accepts(candidate.member.class))
            }) else {
                continue;
            };

            actual[source] -= 1;
            actual[target] += 1;
            moves.push(PlannedMove {
                member: candidate.member,
                from: source,
                to: target,
                kind: if candidate.safe {
                    MoveKind::Immediate
                } else {
                    MoveKind::Deferred
                },
            });
        }
    }

    moves
}
