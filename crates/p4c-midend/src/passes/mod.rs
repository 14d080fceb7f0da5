//! Supporting rewrites the pipelines run around inlining and key
//! simplification.

pub mod constant_folding;
pub mod control_flow;
pub mod move_declarations;
pub mod remove_returns;
pub mod strength_reduction;
pub mod synthesize_actions;
pub mod unique_names;
pub mod unused;

pub use constant_folding::ConstantFolding;
pub use control_flow::SimplifyControlFlow;
pub use move_declarations::MoveDeclarations;
pub use remove_returns::RemoveReturns;
pub use strength_reduction::StrengthReduction;
pub use synthesize_actions::{MoveActionsToTables, SynthesizeActions};
pub use unique_names::UniqueNames;
pub use unused::RemoveAllUnusedDeclarations;
