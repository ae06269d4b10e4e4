mod normalize;
mod open_meteo;

pub use normalize::*;
pub use open_meteo::*;
