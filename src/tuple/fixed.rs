//! Fixed-arity result tuples, arity 2 through 16.
//!
//! The true shape is "a positionally-typed heterogeneous tuple of N typed
//! collections"; the per-arity variants are generated by one macro rather
//! than hand-duplicated.

use crate::descriptor::DescriptorLookup;
use crate::error::Error;
use crate::model::Model;
use crate::populate::{MaterializationPolicy, MaterializedSet};
use crate::provider::{Provenance, SourcedSets};
use crate::stitch::{apply_specs, RelationshipSpec, SetView, StitchResult};

macro_rules! result_tuples {
    ($name:ident, $len:expr, ($($T:ident : $idx:tt),+)) => {
        #[doc = concat!(
            "A positionally-typed tuple of ",
            stringify!($len),
            " materialized sets; set *i* was materialized as type *i*."
        )]
        pub struct $name<$($T: Model),+> {
            /// The materialized sets, positionally aligned with the raw sets
            /// they were assembled from.
            pub sets: ($(MaterializedSet<$T>,)+),
            provenance: Vec<Provenance>,
        }

        impl<$($T: Model),+> $name<$($T),+> {
            /// Assemble the tuple: each raw set is planned and materialized
            /// against the positionally matching type, using the producing
            /// provider's own descriptor registry.
            pub fn assemble(
                sourced: SourcedSets,
                policy: &MaterializationPolicy,
            ) -> Result<Self, Error> {
                if sourced.len() != $len {
                    return Err(Error::SetCountMismatch {
                        expected: $len,
                        actual: sourced.len(),
                    });
                }
                let sets = ($(
                    super::materialize_pair::<$T>(
                        &sourced.sets()[$idx],
                        &sourced.provenance()[$idx],
                        policy,
                    )?,
                )+);
                let (_, provenance) = sourced.into_parts();
                Ok(Self { sets, provenance })
            }

            /// Which provider produced each set, positionally.
            pub fn provenance(&self) -> &[Provenance] {
                &self.provenance
            }

            /// Combined descriptor lookup over the producing providers.
            pub fn lookup(&self) -> DescriptorLookup {
                let mut lookup = DescriptorLookup::new();
                for p in &self.provenance {
                    lookup.push(p.registry().clone());
                }
                lookup
            }

            /// Apply relationship specs, in list order, over this tuple's
            /// sets.
            pub fn stitch(&mut self, specs: &[RelationshipSpec]) -> StitchResult<()> {
                let lookup = self.lookup();
                let mut views: Vec<&mut dyn SetView> =
                    vec![$(&mut self.sets.$idx as &mut dyn SetView),+];
                apply_specs(&mut views, &lookup, specs)
            }
        }

        impl<$($T: Model),+> std::fmt::Debug for $name<$($T),+> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("set_lens", &[$(self.sets.$idx.len()),+])
                    .field("provenance", &self.provenance)
                    .finish()
            }
        }
    };
}

result_tuples!(ResultTuple2, 2, (T1:0, T2:1));
result_tuples!(ResultTuple3, 3, (T1:0, T2:1, T3:2));
result_tuples!(ResultTuple4, 4, (T1:0, T2:1, T3:2, T4:3));
result_tuples!(ResultTuple5, 5, (T1:0, T2:1, T3:2, T4:3, T5:4));
result_tuples!(ResultTuple6, 6, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5));
result_tuples!(ResultTuple7, 7, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6));
result_tuples!(ResultTuple8, 8, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7));
result_tuples!(ResultTuple9, 9, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8));
result_tuples!(ResultTuple10, 10, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9));
result_tuples!(ResultTuple11, 11, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10));
result_tuples!(ResultTuple12, 12, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10, T12:11));
result_tuples!(ResultTuple13, 13, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10, T12:11, T13:12));
result_tuples!(ResultTuple14, 14, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10, T12:11, T13:12, T14:13));
result_tuples!(ResultTuple15, 15, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10, T12:11, T13:12, T14:13, T15:14));
result_tuples!(ResultTuple16, 16, (T1:0, T2:1, T3:2, T4:3, T5:4, T6:5, T7:6, T8:7, T9:8, T10:9, T11:10, T12:11, T13:12, T14:13, T15:14, T16:15));
