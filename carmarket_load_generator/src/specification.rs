use std::{fmt::Debug, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Value pools and ranges random listings are drawn from
///
/// Every field is optional in the JSON form; missing ones take the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CarDataSpec {
    pub brands: Vec<String>,
    /// Models are drawn independently of the brand
    pub models: Vec<String>,
    pub car_types: Vec<String>,
    /// Pool for both the listing city and the registration map keys
    pub cities: Vec<String>,
    pub suggested_price: RangeSpec<f64>,
    /// Minimum reference price as a fraction of the suggested price
    pub reference_price_ratio: RangeSpec<f64>,
    pub horsepower: RangeSpec<i64>,
    pub doors: Vec<i64>,
    pub manufacture_year: RangeSpec<i64>,
    pub fuel_capacity: RangeSpec<f64>,
    pub popularity: RangeSpec<i64>,
    pub discount_percentage: RangeSpec<f64>,
    /// Year of the newest historical price; older entries step back one year each
    pub history_start_year: i64,
    pub history_entries: RangeSpec<usize>,
    pub history_price: RangeSpec<i64>,
    pub plate_cities: RangeSpec<usize>,
    pub plates: RangeSpec<i64>,
}

/// An inclusive `min..=max` range
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RangeSpec<T> {
    pub min: T,
    pub max: T,
}

impl<T> RangeSpec<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

fn pool(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for CarDataSpec {
    fn default() -> Self {
        Self {
            brands: pool(&["丰田", "本田", "大众", "奥迪", "宝马", "奔驰", "特斯拉"]),
            models: pool(&["卡罗拉", "思域", "帕萨特", "A4", "3系", "C级", "Model 3"]),
            car_types: pool(&["轿车", "SUV", "MPV", "跑车"]),
            cities: pool(&["北京", "上海", "广州", "深圳", "成都", "杭州", "重庆"]),
            suggested_price: RangeSpec::new(100_000.0, 500_000.0),
            reference_price_ratio: RangeSpec::new(0.8, 1.0),
            horsepower: RangeSpec::new(100, 400),
            doors: vec![2, 4, 5],
            manufacture_year: RangeSpec::new(2015, 2024),
            fuel_capacity: RangeSpec::new(40.0, 80.0),
            popularity: RangeSpec::new(100, 1000),
            discount_percentage: RangeSpec::new(0.5, 15.0),
            history_start_year: 2025,
            history_entries: RangeSpec::new(3, 7),
            history_price: RangeSpec::new(50_000, 400_000),
            plate_cities: RangeSpec::new(2, 5),
            plates: RangeSpec::new(1000, 100_000),
        }
    }
}

impl CarDataSpec {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read data spec {}", path.display()))?;
        let spec: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse data spec {}", path.display()))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, anyhow::Error> {
        let res = serde_json::to_string_pretty(&self).context("failed to encode json to string")?;
        Ok(res)
    }

    /// Check every pool has a value to draw and every range is ordered
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, values) in [
            ("brands", &self.brands),
            ("models", &self.models),
            ("car_types", &self.car_types),
            ("cities", &self.cities),
        ] {
            anyhow::ensure!(!values.is_empty(), "{name} must not be empty");
        }
        anyhow::ensure!(!self.doors.is_empty(), "doors must not be empty");

        check_range("suggested_price", &self.suggested_price)?;
        check_range("reference_price_ratio", &self.reference_price_ratio)?;
        anyhow::ensure!(
            self.reference_price_ratio.min >= 0.0 && self.reference_price_ratio.max <= 1.0,
            "reference_price_ratio must lie within 0.0..=1.0"
        );
        check_range("horsepower", &self.horsepower)?;
        check_range("manufacture_year", &self.manufacture_year)?;
        check_range("fuel_capacity", &self.fuel_capacity)?;
        check_range("popularity", &self.popularity)?;
        check_range("discount_percentage", &self.discount_percentage)?;
        check_range("history_entries", &self.history_entries)?;
        check_range("history_price", &self.history_price)?;
        check_range("plate_cities", &self.plate_cities)?;
        check_range("plates", &self.plates)?;
        Ok(())
    }
}

fn check_range<T: PartialOrd + Debug>(name: &str, range: &RangeSpec<T>) -> Result<(), anyhow::Error> {
    anyhow::ensure!(
        range.min <= range.max,
        "{name} range is empty: min {:?} > max {:?}",
        range.min,
        range.max
    );
    Ok(())
}
