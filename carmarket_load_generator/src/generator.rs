//! Draws random `car_data` records from a [`CarDataSpec`].

use carmarket_types::{MapValue, Record, Value, schema::columns};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::specification::{CarDataSpec, RangeSpec};

#[derive(Debug)]
pub struct CarDataGenerator {
    spec: CarDataSpec,
    rng: StdRng,
}

impl CarDataGenerator {
    /// A generator over `spec`; the same `seed` always yields the same records
    pub fn new(spec: CarDataSpec, seed: Option<u64>) -> Result<Self, anyhow::Error> {
        spec.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { spec, rng })
    }

    pub fn records(&mut self, count: usize) -> Vec<Record> {
        (0..count).map(|_| self.record()).collect()
    }

    /// One listing with every column of the `car_data` schema populated
    pub fn record(&mut self) -> Record {
        let spec = &self.spec;
        let rng = &mut self.rng;

        let suggested_price = round_cents(sample_f64(rng, &spec.suggested_price));
        let reference_price =
            round_cents(suggested_price * sample_f64(rng, &spec.reference_price_ratio))
                .min(suggested_price);

        let history_len = rng.gen_range(spec.history_entries.min..=spec.history_entries.max);
        let history: MapValue = (0..history_len)
            .map(|years_back| {
                let year = spec.history_start_year - years_back as i64;
                let month: u32 = rng.gen_range(1..=12);
                (format!("{year}-{month:02}"), sample_i64(rng, &spec.history_price))
            })
            .collect();

        let plate_count = rng
            .gen_range(spec.plate_cities.min..=spec.plate_cities.max)
            .min(spec.cities.len());
        let plates: MapValue = spec
            .cities
            .choose_multiple(rng, plate_count)
            .map(|city| (city.clone(), sample_i64(rng, &spec.plates)))
            .collect();

        Record::from([
            (columns::CAR_BRAND.to_string(), pick(rng, &spec.brands)),
            (columns::CITY.to_string(), pick(rng, &spec.cities)),
            (columns::CAR_MODEL.to_string(), pick(rng, &spec.models)),
            (
                columns::MANUFACTURER_SUGGESTED_PRICE.to_string(),
                Value::from(suggested_price),
            ),
            (
                columns::ENGINE_HORSEPOWER.to_string(),
                Value::from(sample_i64(rng, &spec.horsepower)),
            ),
            (
                columns::NUM_DOORS.to_string(),
                Value::from(spec.doors.choose(rng).copied()),
            ),
            (
                columns::MIN_REFERENCE_PRICE.to_string(),
                Value::from(reference_price),
            ),
            (columns::CAR_TYPE.to_string(), pick(rng, &spec.car_types)),
            (
                columns::MANUFACTURE_YEAR.to_string(),
                Value::from(sample_i64(rng, &spec.manufacture_year)),
            ),
            (
                columns::FUEL_CAPACITY.to_string(),
                Value::from(round_cents(sample_f64(rng, &spec.fuel_capacity))),
            ),
            (
                columns::POPULARITY.to_string(),
                Value::from(sample_i64(rng, &spec.popularity)),
            ),
            (
                columns::DISCOUNT_PERCENTAGE.to_string(),
                Value::from(round_cents(sample_f64(rng, &spec.discount_percentage))),
            ),
            (columns::HISTORICAL_PRICE.to_string(), Value::from(history)),
            (columns::CITY_LICENSE_PLATES.to_string(), Value::from(plates)),
        ])
    }
}

fn pick(rng: &mut StdRng, pool: &[String]) -> Value {
    Value::from(pool.choose(rng).cloned())
}

fn sample_i64(rng: &mut StdRng, range: &RangeSpec<i64>) -> i64 {
    rng.gen_range(range.min..=range.max)
}

fn sample_f64(rng: &mut StdRng, range: &RangeSpec<f64>) -> f64 {
    rng.gen_range(range.min..=range.max)
}

/// Round to the two decimal places the table's DECIMAL columns keep
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use carmarket_types::CAR_DATA_SCHEMA;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn same_seed_same_records() {
        let a = CarDataGenerator::new(CarDataSpec::default(), Some(7))
            .unwrap()
            .records(20);
        let b = CarDataGenerator::new(CarDataSpec::default(), Some(7))
            .unwrap()
            .records(20);
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn records_respect_the_spec() {
        let spec = CarDataSpec::default();
        let mut generator = CarDataGenerator::new(spec.clone(), Some(42)).unwrap();

        for record in generator.records(200) {
            let schema_columns: Vec<_> = CAR_DATA_SCHEMA.column_names().collect();
            let record_columns: Vec<_> = record.keys().map(String::as_str).collect();
            assert_eq!(record_columns, schema_columns);

            let suggested = record[columns::MANUFACTURER_SUGGESTED_PRICE].as_f64().unwrap();
            let reference = record[columns::MIN_REFERENCE_PRICE].as_f64().unwrap();
            assert!((100_000.0..=500_000.0).contains(&suggested));
            assert!(reference <= suggested, "{reference} > {suggested}");

            let doors = record[columns::NUM_DOORS].as_i64().unwrap();
            assert!(spec.doors.contains(&doors));
            let hp = record[columns::ENGINE_HORSEPOWER].as_i64().unwrap();
            assert!((100..=400).contains(&hp));
            let year = record[columns::MANUFACTURE_YEAR].as_i64().unwrap();
            assert!((2015..=2024).contains(&year));

            let brand = record[columns::CAR_BRAND].as_str().unwrap();
            assert!(spec.brands.iter().any(|b| b == brand));

            let history = record[columns::HISTORICAL_PRICE].as_map().unwrap();
            assert!((3..=7).contains(&history.len()));
            for (period, price) in history {
                let (year, month) = period.split_once('-').unwrap();
                assert!(year.parse::<i64>().unwrap() <= 2025);
                assert_eq!(month.len(), 2);
                assert!((1..=12).contains(&month.parse::<u32>().unwrap()));
                assert!((50_000..=400_000).contains(price));
            }

            let plates = record[columns::CITY_LICENSE_PLATES].as_map().unwrap();
            assert!((2..=5).contains(&plates.len()));
            for (city, count) in plates {
                assert!(spec.cities.contains(city));
                assert!((1000..=100_000).contains(count));
            }
        }
    }

    #[test]
    fn plate_cities_capped_by_pool() {
        let spec = CarDataSpec {
            cities: vec!["北京".to_string()],
            ..Default::default()
        };
        let mut generator = CarDataGenerator::new(spec, Some(1)).unwrap();
        let record = generator.record();
        assert_eq!(
            record[columns::CITY_LICENSE_PLATES]
                .as_map()
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            vec!["北京"]
        );
    }

    #[test]
    fn rejects_invalid_spec() {
        let spec = CarDataSpec {
            doors: vec![],
            ..Default::default()
        };
        assert!(CarDataGenerator::new(spec, None).is_err());
    }
}
