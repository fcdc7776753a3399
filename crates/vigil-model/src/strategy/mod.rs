mod dedupe;
pub use dedupe::DedupeAlgorithm;
