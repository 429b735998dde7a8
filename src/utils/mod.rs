pub mod mask;
pub mod parser;

pub use mask::mask_sensitive;
pub use parser::{normalize_price_text, parse_eur_price};
