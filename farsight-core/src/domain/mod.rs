//! Domain types: bars, price series, horizons, and forecast results.

pub mod bar;
pub mod forecast;
pub mod horizon;
pub mod series;

pub use bar::Bar;
pub use forecast::{
    EnsembleForecast, ForecastPoint, ResidualForecast, ResidualStep, ScenarioBand, TrendForecast,
};
pub use horizon::{parse_horizons, Horizon, HorizonParseError};
pub use series::{PriceSeries, SeriesError};
