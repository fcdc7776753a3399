mod ids;
pub use ids::{EngagementId, FindingId, ProductId, TestId};

mod product;
pub use product::Product;

mod engagement;
pub use engagement::Engagement;

mod test;
pub use test::Test;
