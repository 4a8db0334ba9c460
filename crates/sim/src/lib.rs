pub mod profit;
pub mod simulator;

pub use profit::{recommend, Recommendation};
pub use simulator::{Opportunity, OpportunityKind, PairSimOutcome, SimOutcome, Simulator};
