//! Sorted multi-beam search: every hypothesis of a stage is expanded with
//! every legal rule and the results are offered to the beam of their
//! coverage cardinality.

use tracing::{debug, debug_span};

use super::beam::Beam;
use super::hypothesis::HypId;
use super::space::SearchSpace;
use super::DecodeError;

/// Fills the beams and returns the goal beam, best first.
pub(crate) fn search(space: &mut SearchSpace<'_>, beam_size: usize) -> Result<Vec<HypId>, DecodeError> {
    let len = space.source_len();
    let mut beams: Vec<Beam> = (0..=len).map(|_| Beam::new(beam_size)).collect();
    let root = space.root();
    let outcome = beams[0].put_hypothesis(&space.arena[root], &space.params.filter);
    space.record(outcome);

    for stage in 0..len {
        let _span = debug_span!("expand_stage", stage).entered();
        let frontier: Vec<HypId> = beams[stage].iter().collect();
        for &hyp in &frontier {
            for span in space.legal_spans(hyp) {
                let rules = space.grid.get(span.start, span.end).to_vec();
                for rule in rules {
                    let Some(next) = space.extend(hyp, rule)? else {
                        continue;
                    };
                    let next_hyp = &space.arena[next];
                    let card = next_hyp.coverage.cardinality();
                    let outcome = beams[card].put_hypothesis(next_hyp, &space.params.filter);
                    space.record(outcome);
                }
            }
        }
        let stats = beams[stage].stats();
        debug!(
            expanded = frontier.len(),
            recombined = stats.recombined,
            pruned = stats.pruned,
            discarded = stats.discarded,
        );
    }

    space.stats.beam_sizes = beams.iter().map(Beam::len).collect();
    Ok(beams[len].iter().collect())
}
