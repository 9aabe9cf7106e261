pub mod session;
pub mod static_assets;

pub use session::{authenticated_user, SessionAuth};
pub use static_assets::{tokens_suppressed, StaticAssets};
