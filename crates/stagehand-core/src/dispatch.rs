//! Dispatch queries: which blocks apply at a given tick and context.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use stagehand_types::{
    BlockHandle, BlockKind, ChromosomeId, InteractionTypeId, LifecycleState, MutationTypeId, Sex,
    SpeciesId, SubpopId, Tick,
};

use crate::block::ScriptBlock;

/// Arguments of one dispatch query.
///
/// Unset filters do not restrict the result; a block filter of `None`
/// matches any query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchQuery {
    /// Tick being dispatched.
    pub tick: Tick,
    /// Kind of block wanted.
    pub kind: BlockKind,
    /// Mutation type of the triggering context.
    pub mutation_type: Option<MutationTypeId>,
    /// Interaction type of the triggering context.
    pub interaction_type: Option<InteractionTypeId>,
    /// Subpopulation of the triggering context.
    pub subpop: Option<SubpopId>,
    /// Species of the triggering context.
    pub species: Option<SpeciesId>,
    /// Sex of the triggering individual.
    pub sex: Option<Sex>,
    /// Chromosome of the triggering context.
    pub chromosome: Option<ChromosomeId>,
}

impl DispatchQuery {
    /// Query for `kind` at `tick` with no context filters.
    pub const fn new(tick: Tick, kind: BlockKind) -> Self {
        Self {
            tick,
            kind,
            mutation_type: None,
            interaction_type: None,
            subpop: None,
            species: None,
            sex: None,
            chromosome: None,
        }
    }

    /// Filter by mutation type.
    #[must_use]
    pub const fn mutation_type(mut self, id: MutationTypeId) -> Self {
        self.mutation_type = Some(id);
        self
    }

    /// Filter by interaction type.
    #[must_use]
    pub const fn interaction_type(mut self, id: InteractionTypeId) -> Self {
        self.interaction_type = Some(id);
        self
    }

    /// Filter by subpopulation.
    #[must_use]
    pub const fn subpop(mut self, id: SubpopId) -> Self {
        self.subpop = Some(id);
        self
    }

    /// Filter by species.
    #[must_use]
    pub const fn species(mut self, id: SpeciesId) -> Self {
        self.species = Some(id);
        self
    }

    /// Filter by sex.
    #[must_use]
    pub const fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    /// Filter by chromosome.
    #[must_use]
    pub const fn chromosome(mut self, id: ChromosomeId) -> Self {
        self.chromosome = Some(id);
        self
    }

    /// Whether `block` answers this query.
    ///
    /// Checks run cheapest first: lifecycle, range, species, then the
    /// secondary filters.
    pub fn matches(&self, block: &ScriptBlock) -> bool {
        let scope = block.scope();
        block.kind() == self.kind
            && block.state() != LifecycleState::Removed
            && block.covers(self.tick)
            && filter_matches(scope.species, self.species)
            && filter_matches(scope.mutation_type, self.mutation_type)
            && filter_matches(scope.interaction_type, self.interaction_type)
            && filter_matches(scope.subpop, self.subpop)
            && filter_matches(scope.sex, self.sex)
            && filter_matches(scope.chromosome, self.chromosome)
    }
}

/// `None` on either side matches.
fn filter_matches<T: PartialEq>(block: Option<T>, query: Option<T>) -> bool {
    match (block, query) {
        (Some(b), Some(q)) => b == q,
        _ => true,
    }
}

/// Deterministically permute `handles` for one `(tick, kind)` pair.
///
/// The same seed, tick and kind always give the same order.
pub fn shuffle_for_tick(handles: &mut [BlockHandle], seed: u64, tick: Tick, kind: BlockKind) {
    let mut rng = StdRng::seed_from_u64(mix_seed(seed, tick, kind));
    handles.shuffle(&mut rng);
}

fn mix_seed(seed: u64, tick: Tick, kind: BlockKind) -> u64 {
    let tick_bits = u64::from_ne_bytes(tick.to_ne_bytes());
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ tick_bits.rotate_left(17)
        ^ (kind as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}
