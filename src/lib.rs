// Votes are plain counter increments keyed by (district, party, candidate).
// The write side never reads anything back: a load run paces increments
// against a ticker and spreads them over a fixed pool of submitters, so the
// store only ever sees as many concurrent calls as there are workers.
//
// The read side is the opposite. It runs on a single task, pulls every row
// per district, reconciles the rows against the election definition and
// folds them into party totals. A row that can't be placed in the definition
// fails the whole computation, since a partial tally would be reported as if
// it were complete.
pub mod election;
mod error;
pub mod load;
pub mod store;
pub mod tally;
pub mod vote;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
