//! In-memory aggregations over listings read from the warehouse.
//!
//! Every view recomputes from a full scan of the table; nothing is cached.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use carmarket_types::{MapValue, Record, Value, schema::columns};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// One listing as the front end sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarView {
    /// `brand_model`, spaces replaced by underscores
    pub id: String,
    #[serde(flatten)]
    pub details: CarDetails,
}

/// A listing without its id, as returned by the model details view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarDetails {
    pub brand: String,
    pub model: String,
    pub guide_price: f64,
    pub horsepower: i64,
    pub doors: i64,
    pub min_price: f64,
    pub attention: i64,
    pub discount: f64,
    pub car_type: String,
    pub manufacture_year: Option<i64>,
    pub city_license_plates: MapValue,
    pub history_prices: Vec<PricePoint>,
    pub model_id: String,
    /// City the listing is offered in
    #[serde(skip)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: String,
    pub price: i64,
}

impl CarView {
    /// Project a decoded storage record; absent or mistyped fields take zero values
    pub fn from_record(record: &Record) -> Self {
        let value = |column: &str| record.get(column);
        let text = |column: &str| {
            value(column)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let int = |column: &str| value(column).and_then(Value::as_i64).unwrap_or_default();
        let float = |column: &str| value(column).and_then(Value::as_f64).unwrap_or_default();
        let map = |column: &str| {
            value(column)
                .and_then(Value::as_map)
                .cloned()
                .unwrap_or_default()
        };

        let brand = text(columns::CAR_BRAND);
        let model = text(columns::CAR_MODEL);
        let id = format!("{brand}_{model}").replace(' ', "_");
        let history_prices = map(columns::HISTORICAL_PRICE)
            .into_iter()
            .map(|(date, price)| PricePoint { date, price })
            .collect();

        Self {
            id: id.clone(),
            details: CarDetails {
                brand,
                model,
                guide_price: float(columns::MANUFACTURER_SUGGESTED_PRICE),
                horsepower: int(columns::ENGINE_HORSEPOWER),
                doors: int(columns::NUM_DOORS),
                min_price: float(columns::MIN_REFERENCE_PRICE),
                attention: int(columns::POPULARITY),
                discount: float(columns::DISCOUNT_PERCENTAGE),
                car_type: text(columns::CAR_TYPE),
                manufacture_year: value(columns::MANUFACTURE_YEAR).and_then(Value::as_i64),
                city_license_plates: map(columns::CITY_LICENSE_PLATES),
                history_prices,
                model_id: id,
                city: value(columns::CITY)
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            },
        }
    }

    fn registrations(&self) -> i64 {
        self.details.city_license_plates.values().sum()
    }
}

/// Distinct brands in first-seen order
pub fn brands(cars: &[CarView]) -> Vec<String> {
    cars.iter()
        .map(|car| car.details.brand.as_str())
        .collect::<IndexSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
}

pub fn brand_models(cars: &[CarView], brand: &str) -> Vec<ModelSummary> {
    cars.iter()
        .filter(|car| car.details.brand == brand)
        .map(|car| ModelSummary {
            id: car.details.model_id.clone(),
            name: car.details.model.clone(),
        })
        .collect()
}

/// Details of the first listing with `model_id`
pub fn model_details<'a>(cars: &'a [CarView], model_id: &str) -> Option<&'a CarDetails> {
    cars.iter()
        .find(|car| car.details.model_id == model_id)
        .map(|car| &car.details)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityTotals {
    pub id: usize,
    pub city: String,
    pub registrations: i64,
    pub attention: i64,
}

/// Registrations per city summed over every listing's plate counts
///
/// Cities are numbered in the order they are first seen. A city's attention is
/// the summed attention of the listings offered in it.
pub fn city_totals(cars: &[CarView]) -> Vec<CityTotals> {
    let mut registrations: IndexMap<&str, i64> = IndexMap::new();
    for car in cars {
        for (city, count) in &car.details.city_license_plates {
            *registrations.entry(city.as_str()).or_default() += count;
        }
    }

    let mut attention: IndexMap<&str, i64> = IndexMap::new();
    for car in cars {
        if let Some(city) = &car.details.city {
            *attention.entry(city.as_str()).or_default() += car.details.attention;
        }
    }

    registrations
        .into_iter()
        .enumerate()
        .map(|(id, (city, registrations))| CityTotals {
            id,
            city: city.to_string(),
            registrations,
            attention: attention.get(city).copied().unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid metric: {0}")]
pub struct InvalidMetric(pub String);

/// What city rankings are ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CityMetric {
    #[default]
    Registrations,
    Attention,
}

impl CityMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registrations => "registrations",
            Self::Attention => "attention",
        }
    }

    fn value(&self, city: &CityTotals) -> i64 {
        match self {
            Self::Registrations => city.registrations,
            Self::Attention => city.attention,
        }
    }
}

impl FromStr for CityMetric {
    type Err = InvalidMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registrations" => Ok(Self::Registrations),
            "attention" => Ok(Self::Attention),
            _ => Err(InvalidMetric(s.to_string())),
        }
    }
}

/// `(city, value)` pairs by descending `metric`; ties keep first-seen order
pub fn city_rankings(cities: &[CityTotals], metric: CityMetric) -> Vec<(String, i64)> {
    let mut ranked: Vec<_> = cities
        .iter()
        .map(|city| (city.city.clone(), metric.value(city)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Optional constraints on recommended listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationFilter {
    pub brand: Option<String>,
    /// Bounds on the minimum reference price
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_hp: Option<i64>,
    pub doors: Option<i64>,
    pub car_type: Option<String>,
}

impl RecommendationFilter {
    fn matches(&self, car: &CarDetails) -> bool {
        let non_empty = |s: &Option<String>| s.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        non_empty(&self.brand).is_none_or(|brand| car.brand == brand)
            && self.min_price.is_none_or(|min| car.min_price >= min)
            && self.max_price.is_none_or(|max| car.min_price <= max)
            && self.min_hp.is_none_or(|min| car.horsepower >= min)
            && self.doors.is_none_or(|doors| car.doors == doors)
            && non_empty(&self.car_type).is_none_or(|car_type| car.car_type == car_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub min_price: f64,
    pub horsepower: i64,
    pub car_type: String,
    pub attention: i64,
}

/// Listings passing `filter`, most watched first
pub fn recommendations(cars: &[CarView], filter: &RecommendationFilter) -> Vec<Recommendation> {
    let mut matching: Vec<&CarDetails> = cars
        .iter()
        .map(|car| &car.details)
        .filter(|car| filter.matches(car))
        .collect();
    matching.sort_by(|a, b| b.attention.cmp(&a.attention));
    matching
        .into_iter()
        .map(|car| Recommendation {
            id: car.model_id.clone(),
            brand: car.brand.clone(),
            model: car.model.clone(),
            min_price: car.min_price,
            horsepower: car.horsepower,
            car_type: car.car_type.clone(),
            attention: car.attention,
        })
        .collect()
}

/// Shown as the top car of an empty table
pub const NO_DATA: &str = "无数据";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOverview {
    pub total_registrations: i64,
    pub avg_attention: f64,
    /// Listing count per brand
    pub popular_brands: IndexMap<String, usize>,
    pub top_car: String,
}

pub fn market_overview(cars: &[CarView], cities: &[CityTotals]) -> MarketOverview {
    let total_registrations = cities.iter().map(|c| c.registrations).sum();
    let avg_attention = if cars.is_empty() {
        0.0
    } else {
        cars.iter().map(|c| c.details.attention as f64).sum::<f64>() / cars.len() as f64
    };

    let mut popular_brands = IndexMap::new();
    for car in cars {
        *popular_brands
            .entry(car.details.brand.clone())
            .or_default() += 1;
    }

    // first listing wins a tie
    let top = cars.iter().fold(None::<&CarDetails>, |top, car| match top {
        Some(top) if top.attention >= car.details.attention => Some(top),
        _ => Some(&car.details),
    });
    let top_car = top.map_or_else(
        || NO_DATA.to_string(),
        |car| format!("{} {} (关注度: {})", car.brand, car.model, car.attention),
    );

    MarketOverview {
        total_registrations,
        avg_attention,
        popular_brands,
        top_car,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub registrations: i64,
    pub attention: i64,
    pub avg_price: f64,
}

/// Yearly totals by manufacture year, oldest first
///
/// Listings without a manufacture year (or with year 0) are skipped.
pub fn market_trends(cars: &[CarView]) -> Vec<TrendPoint> {
    #[derive(Default)]
    struct Year {
        registrations: i64,
        attention: i64,
        price_sum: f64,
        count: usize,
    }

    let mut years: BTreeMap<i64, Year> = BTreeMap::new();
    for car in cars {
        let Some(year) = car.details.manufacture_year.filter(|y| *y != 0) else {
            continue;
        };
        let entry = years.entry(year).or_default();
        entry.registrations += car.registrations();
        entry.attention += car.details.attention;
        entry.price_sum += car.details.guide_price;
        entry.count += 1;
    }

    years
        .into_iter()
        .map(|(year, totals)| TrendPoint {
            date: year.to_string(),
            registrations: totals.registrations,
            attention: totals.attention,
            avg_price: totals.price_sum / totals.count as f64,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrendMetric {
    #[default]
    Registrations,
    Attention,
    AvgPrice,
}

impl TrendMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registrations => "registrations",
            Self::Attention => "attention",
            Self::AvgPrice => "avg_price",
        }
    }
}

impl FromStr for TrendMetric {
    type Err = InvalidMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registrations" => Ok(Self::Registrations),
            "attention" => Ok(Self::Attention),
            "avg_price" => Ok(Self::AvgPrice),
            _ => Err(InvalidMetric(s.to_string())),
        }
    }
}

impl Display for TrendMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: serde_json::Value,
}

pub fn trend_series(points: &[TrendPoint], metric: TrendMetric) -> Vec<SeriesPoint> {
    points
        .iter()
        .map(|point| SeriesPoint {
            date: point.date.clone(),
            value: match metric {
                TrendMetric::Registrations => point.registrations.into(),
                TrendMetric::Attention => point.attention.into(),
                TrendMetric::AvgPrice => point.avg_price.into(),
            },
        })
        .collect()
}

/// Bucket bounds on the minimum reference price, in yuan; the last is open ended
const PRICE_BUCKETS: [(i64, Option<i64>); 5] = [
    (0, Some(100_000)),
    (100_000, Some(200_000)),
    (200_000, Some(300_000)),
    (300_000, Some(500_000)),
    (500_000, None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBucket {
    pub range: String,
    pub count: usize,
    pub avg_attention: f64,
}

/// Listing count and average attention per minimum price range
pub fn price_distribution(cars: &[CarView]) -> Vec<PriceBucket> {
    PRICE_BUCKETS
        .iter()
        .map(|&(lower, upper)| {
            let in_range = |car: &&CarView| {
                let price = car.details.min_price;
                price >= lower as f64 && upper.is_none_or(|upper| price < upper as f64)
            };
            let attention: Vec<i64> = cars
                .iter()
                .filter(in_range)
                .map(|car| car.details.attention)
                .collect();
            let count = attention.len();
            let avg_attention = if count == 0 {
                0.0
            } else {
                attention.iter().sum::<i64>() as f64 / count as f64
            };
            let range = match upper {
                Some(upper) => format!("{}万-{}万", lower / 10_000, upper / 10_000),
                None => format!("{}万以上", lower / 10_000),
            };
            PriceBucket {
                range,
                count,
                avg_attention,
            }
        })
        .collect()
}

/// Car type label folded into [`ELECTRIC`]
const NEW_ENERGY: &str = "新能源";
const ELECTRIC: &str = "电动汽车";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypePreference {
    #[serde(rename = "type")]
    pub car_type: String,
    pub preference: f64,
}

/// Each car type's share of all registrations, in first-seen order
///
/// Empty when there are no registrations at all.
pub fn type_preferences(cars: &[CarView]) -> Vec<TypePreference> {
    let total: i64 = cars.iter().map(CarView::registrations).sum();
    if total == 0 {
        return vec![];
    }

    let mut per_type: IndexMap<&str, i64> = IndexMap::new();
    for car in cars {
        let car_type = match car.details.car_type.as_str() {
            NEW_ENERGY => ELECTRIC,
            other => other,
        };
        *per_type.entry(car_type).or_default() += car.registrations();
    }

    per_type
        .into_iter()
        .map(|(car_type, registrations)| TypePreference {
            car_type: car_type.to_string(),
            preference: registrations as f64 / total as f64,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangePreference {
    pub range: &'static str,
    pub preference: f64,
}

/// Fixed horsepower breakdown served for every dimension other than car type
pub fn horsepower_preferences() -> Vec<RangePreference> {
    [("100-150马力", 0.4), ("150-200马力", 0.35), ("200+马力", 0.25)]
        .into_iter()
        .map(|(range, preference)| RangePreference { range, preference })
        .collect()
}
