//! `/fuelcost` trip cost calculator.

use crate::{Error, Result};

const DEFAULT_DISTANCE_KM: f64 = 100.0;
const DEFAULT_EFFICIENCY: f64 = 6.0;
const DEFAULT_PRICE_PER_LITER: f64 = 1.249;
const CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripCost {
  pub distance_km:     f64,
  /// Liters per 100 km.
  pub efficiency:      f64,
  pub price_per_liter: f64,
}

impl TripCost {
  pub fn new(distance_km: f64, efficiency: f64, price_per_liter: f64) -> Result<Self> {
    for (name, value) in [
      ("distance", distance_km),
      ("fuel efficiency", efficiency),
      ("fuel price", price_per_liter),
    ] {
      if !value.is_finite() || value <= 0.0 {
        return Err(Error::Argument(format!("{name} must be a positive number")));
      }
    }
    Ok(Self { distance_km, efficiency, price_per_liter })
  }

  /// Build from `[distance] [efficiency] [price]`; missing trailing values
  /// take their defaults.
  pub fn from_args(args: &[String]) -> Result<Self> {
    let arg = |i: usize, default: f64| match args.get(i) {
      None => Ok(default),
      Some(raw) => raw
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| Error::Argument(format!("{raw:?} is not a number"))),
    };
    Self::new(
      arg(0, DEFAULT_DISTANCE_KM)?,
      arg(1, DEFAULT_EFFICIENCY)?,
      arg(2, DEFAULT_PRICE_PER_LITER)?,
    )
  }

  pub fn liters(&self) -> f64 { self.distance_km / 100.0 * self.efficiency }

  pub fn cost(&self) -> f64 { self.liters() * self.price_per_liter }

  pub fn render(&self) -> String {
    format!(
      "<b>Distance:</b> {:.2} km\n\
       <b>Avg. fuel consumption:</b> {:.2} l/100km\n\
       <b>Fuel cost:</b> {:.3} {CURRENCY}/l\n\
       This trip will require <b>{:.2}</b> liter(s) of fuel, \
       which amounts to a fuel cost of <b>{:.2}</b> {CURRENCY}",
      self.distance_km,
      self.efficiency,
      self.price_per_liter,
      self.liters(),
      self.cost(),
    )
  }
}
