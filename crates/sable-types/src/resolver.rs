//! Overload resolution.
//!
//! Arguments are matched against every variant of a function. Union-typed
//! arguments are expanded member by member; each combination of member kinds
//! picks at most one variant through the [`MatchPolicy`], and the picks are
//! folded into a single [`FnMatch`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::ResolveError;
use crate::lattice::TypeLattice;
use crate::signature::{ArgCast, Candidate, FnMatch, FnSignature};
use crate::types::{StaticType, TypeKind};

/// Default bound on the number of member combinations tried per call.
pub const DEFAULT_MAX_UNION_EXPANSION: usize = 64;

/// A variant that accepts one combination of argument kinds.
#[derive(Debug, Clone)]
pub struct Applicable {
    pub signature: Arc<FnSignature>,
    pub mapping: Vec<ArgCast>,
    /// Argument kinds of the combination being matched.
    pub args: Vec<TypeKind>,
    /// Sum of coercion distances over all positions.
    pub distance: u32,
}

impl Applicable {
    /// Whether an `ANY` argument is bound to a concrete parameter.
    pub fn binds_dynamic(&self) -> bool {
        self.args
            .iter()
            .zip(&self.signature.parameters)
            .any(|(&arg, &param)| arg == TypeKind::Any && param != TypeKind::Any)
    }
}

/// Which of several applicable variants to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Unique(usize),
    /// No winner; these indices stay runtime candidates.
    Tied(Vec<usize>),
}

/// Picks among applicable variants. `applicable` is never empty.
pub trait MatchPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn select(&self, applicable: &[Applicable]) -> Selection;
}

/// Lowest total coercion distance wins. Binding a concrete argument to an
/// `ANY` parameter costs [`CoercionDistance::ANY_PENALTY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoercionDistance;

impl CoercionDistance {
    pub const ANY_PENALTY: u32 = 1_000;

    fn score(candidate: &Applicable) -> u32 {
        let widened = candidate
            .signature
            .parameters
            .iter()
            .zip(&candidate.args)
            .filter(|(param, arg)| **param == TypeKind::Any && **arg != TypeKind::Any)
            .count() as u32;
        candidate.distance + widened * Self::ANY_PENALTY
    }
}

impl MatchPolicy for CoercionDistance {
    fn name(&self) -> &'static str {
        "coercion-distance"
    }

    fn select(&self, applicable: &[Applicable]) -> Selection {
        let scores: Vec<u32> = applicable.iter().map(Self::score).collect();
        let best = scores.iter().copied().min().unwrap_or(0);
        let winners: Vec<usize> = (0..scores.len()).filter(|&i| scores[i] == best).collect();
        match winners.as_slice() {
            [only] => Selection::Unique(*only),
            _ => Selection::Tied(winners),
        }
    }
}

/// Never breaks ties; any ambiguity becomes runtime dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferTies;

impl MatchPolicy for DeferTies {
    fn name(&self) -> &'static str {
        "defer-ties"
    }

    fn select(&self, applicable: &[Applicable]) -> Selection {
        match applicable {
            [_] => Selection::Unique(0),
            _ => Selection::Tied((0..applicable.len()).collect()),
        }
    }
}

/// Resolves calls against their overloads.
#[derive(Debug, Clone)]
pub struct FnResolver<'a> {
    lattice: &'a TypeLattice,
    policy: &'a dyn MatchPolicy,
    max_union_expansion: usize,
}

impl<'a> FnResolver<'a> {
    pub fn new(lattice: &'a TypeLattice, policy: &'a dyn MatchPolicy) -> Self {
        Self {
            lattice,
            policy,
            max_union_expansion: DEFAULT_MAX_UNION_EXPANSION,
        }
    }

    pub fn with_max_union_expansion(mut self, limit: usize) -> Self {
        self.max_union_expansion = limit.max(1);
        self
    }

    /// Resolve a call to `name` with arguments of type `args` against
    /// `variants`.
    pub fn resolve(
        &self,
        name: &str,
        variants: &[Arc<FnSignature>],
        args: &[StaticType],
    ) -> Result<FnMatch, ResolveError> {
        for variant in variants {
            if variant.parameters.iter().any(|p| p.is_absent()) {
                return Err(ResolveError::MalformedSignature {
                    signature: variant.to_string(),
                    reason: "NULL and MISSING are not parameter kinds".to_string(),
                });
            }
        }

        let arity_ok: Vec<&Arc<FnSignature>> = variants.iter().filter(|v| v.arity() == args.len()).collect();
        if arity_ok.is_empty() {
            debug!(function = name, "no variant with arity {}", args.len());
            return Ok(self.mismatch(name, args));
        }

        let arg_kinds: Vec<Vec<TypeKind>> = args.iter().map(match_kinds).collect();
        let combinations = arg_kinds
            .iter()
            .try_fold(1usize, |acc, kinds| acc.checked_mul(kinds.len().max(1)))
            .unwrap_or(usize::MAX);
        if combinations > self.max_union_expansion {
            debug!(
                function = name,
                combinations,
                limit = self.max_union_expansion,
                "union expansion over limit, deferring to runtime"
            );
            return self.defer_all(name, args, &arity_ok, &arg_kinds);
        }

        let mut selected: Vec<Candidate> = Vec::new();
        let mut tied = false;
        let mut unmatched = false;
        for combination in cartesian(&arg_kinds) {
            let applicable = self.applicable(&arity_ok, &combination)?;
            if applicable.is_empty() {
                trace!(function = name, ?combination, "no applicable variant");
                unmatched = true;
                continue;
            }
            let picks = if applicable.iter().any(Applicable::binds_dynamic) {
                // The runtime kind of an ANY argument decides the variant
                trace!(function = name, ?combination, "dynamic argument, ranking skipped");
                unmatched = true;
                tied |= applicable.len() > 1;
                (0..applicable.len()).collect()
            } else {
                match self.policy.select(&applicable) {
                    Selection::Unique(i) => vec![i],
                    Selection::Tied(indices) => {
                        tied = true;
                        indices
                    }
                }
            };
            for i in picks {
                let Some(pick) = applicable.get(i) else {
                    continue;
                };
                trace!(function = name, ?combination, selected = %pick.signature, "variant selected");
                merge_candidate(&mut selected, pick);
            }
        }

        if selected.is_empty() {
            debug!(function = name, "no applicable variant");
            return Ok(self.mismatch(name, args));
        }

        let is_missable = unmatched
            || selected
                .iter()
                .any(|c| c.signature.is_missable || c.signature.is_catch_all());

        if selected.len() == 1 && !tied {
            let candidate = selected.remove(0);
            let candidate = Candidate::new(candidate.signature, candidate.mapping)?;
            debug!(function = name, signature = %candidate.signature, "resolved");
            return Ok(FnMatch::ok(candidate, is_missable));
        }

        let candidates = selected
            .into_iter()
            .map(|c| Candidate::new(c.signature, c.mapping))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            function = name,
            candidates = candidates.len(),
            policy = self.policy.name(),
            "resolved dynamically"
        );
        Ok(FnMatch::Dynamic {
            candidates,
            is_missable: is_missable || tied,
        })
    }

    /// Variants applicable to one combination of argument kinds.
    fn applicable(
        &self,
        variants: &[&Arc<FnSignature>],
        combination: &[TypeKind],
    ) -> Result<Vec<Applicable>, ResolveError> {
        let mut applicable = Vec::new();
        'variants: for variant in variants {
            let mut mapping = Vec::with_capacity(combination.len());
            let mut distance = 0;
            for (&arg, &param) in combination.iter().zip(&variant.parameters) {
                if arg == param || arg.is_absent() {
                    mapping.push(ArgCast::NoCast);
                    continue;
                }
                match self.lattice.distance(arg, param) {
                    Some(d) => {
                        distance += d;
                        if param == TypeKind::Any {
                            mapping.push(ArgCast::NoCast);
                        } else {
                            mapping.push(ArgCast::cast(arg, param));
                        }
                    }
                    None => continue 'variants,
                }
            }
            if mapping.len() != variant.arity() {
                return Err(ResolveError::MappingArity {
                    name: variant.name.clone(),
                    expected: variant.arity(),
                    actual: mapping.len(),
                });
            }
            applicable.push(Applicable {
                signature: Arc::clone(variant),
                mapping,
                args: combination.to_vec(),
                distance,
            });
        }
        Ok(applicable)
    }

    /// Every arity-compatible variant that some member combination could
    /// reach becomes a runtime candidate.
    fn defer_all(
        &self,
        name: &str,
        args: &[StaticType],
        variants: &[&Arc<FnSignature>],
        arg_kinds: &[Vec<TypeKind>],
    ) -> Result<FnMatch, ResolveError> {
        let mut candidates = Vec::new();
        for variant in variants {
            let mut mapping = Vec::with_capacity(arg_kinds.len());
            let mut reachable = true;
            for (kinds, &param) in arg_kinds.iter().zip(&variant.parameters) {
                if kinds.iter().all(|&k| k == param || k.is_absent()) || param == TypeKind::Any {
                    mapping.push(ArgCast::NoCast);
                } else if kinds.iter().any(|&k| self.lattice.is_coercible(k, param)) {
                    mapping.push(ArgCast::cast(TypeKind::Any, param));
                } else {
                    reachable = false;
                    break;
                }
            }
            if reachable {
                candidates.push(Candidate::new(Arc::clone(variant), mapping)?);
            }
        }
        if candidates.is_empty() {
            return Ok(self.mismatch(name, args));
        }
        Ok(FnMatch::Dynamic {
            candidates,
            is_missable: true,
        })
    }

    fn mismatch(&self, name: &str, args: &[StaticType]) -> FnMatch {
        FnMatch::Error {
            name: name.to_string(),
            args: args.to_vec(),
        }
    }
}

/// Kinds an argument is matched as. Absent members of a union are left to
/// NULL/MISSING propagation; a wholly absent argument matches as itself.
fn match_kinds(arg: &StaticType) -> Vec<TypeKind> {
    if arg.is_absent() {
        arg.kinds()
    } else {
        arg.without_absent().kinds()
    }
}

/// All combinations of one kind per position, in lexicographic order.
fn cartesian(positions: &[Vec<TypeKind>]) -> Vec<Vec<TypeKind>> {
    let mut combinations: Vec<Vec<TypeKind>> = vec![Vec::new()];
    for kinds in positions {
        let mut next = Vec::with_capacity(combinations.len() * kinds.len());
        for prefix in &combinations {
            for &kind in kinds {
                let mut combination = prefix.clone();
                combination.push(kind);
                next.push(combination);
            }
        }
        combinations = next;
    }
    combinations
}

/// Record a selected variant. A variant picked by several combinations with
/// different casts keeps a runtime cast at the positions that disagree.
fn merge_candidate(selected: &mut Vec<Candidate>, pick: &Applicable) {
    match selected.iter_mut().find(|c| Arc::ptr_eq(&c.signature, &pick.signature)) {
        Some(existing) => {
            for (slot, (new, &param)) in existing
                .mapping
                .iter_mut()
                .zip(pick.mapping.iter().zip(&pick.signature.parameters))
            {
                if slot != new {
                    *slot = ArgCast::cast(TypeKind::Any, param);
                }
            }
        }
        None => selected.push(Candidate {
            signature: Arc::clone(&pick.signature),
            mapping: pick.mapping.clone(),
        }),
    }
}
