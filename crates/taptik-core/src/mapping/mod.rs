//! Feature mapping between platform configuration models.
//!
//! ```text
//! MappingTable          static (source, target) → [FeatureMapping]; pure data
//!     │
//!     ▼
//! FeatureMapper         read source.path → Transform::apply → write target.path
//!     │
//!     ▼
//! ReverseMappingService swapped bidirectional mappings, merge policies,
//!                       integrity checks, round-trip reversibility verdict
//! ```

pub mod equivalence;
pub mod mapper;
pub mod reverse;
pub mod table;
pub mod transform;

pub use equivalence::{Equivalence, StrictEquivalence, StructuralEquivalence};
pub use mapper::{FeatureMapper, MappingResult};
pub use reverse::{
    MergeStrategy, ReverseMapOptions, ReverseMappingResult, ReverseMappingService,
    ReverseMetadata,
};
pub use table::{FeatureMapping, FeatureRef, FeatureTarget, MappingTable};
pub use transform::Transform;
