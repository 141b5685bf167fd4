use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use log::warn;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{
    DailyWeather, PrecipitationObservation, PrecipitationTotals, TemperatureAverages,
    TemperatureObservation, WeatherKind,
};

const TOTAL_DECIMALS: u32 = 1;
const AVERAGE_DECIMALS: u32 = 2;

pub fn round_total(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(TOTAL_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_average(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AVERAGE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Adds `amount` to `total`, dropping the amount if the sum would overflow.
fn accumulate(total: Decimal, amount: Decimal, observed_on: NaiveDate) -> Decimal {
    match total.checked_add(amount) {
        Some(sum) => sum,
        None => {
            warn!(
                "skipping precipitation amount {} on {}: total would overflow",
                amount, observed_on
            );
            total
        }
    }
}

/// Unrounded sum of every amount of the given kind.
pub fn sum_for_kind(observations: &[PrecipitationObservation], kind: WeatherKind) -> Decimal {
    observations
        .iter()
        .filter(|observation| observation.kind == kind)
        .fold(Decimal::ZERO, |total, observation| {
            accumulate(total, observation.amount_inches, observation.observed_on)
        })
}

pub fn total_for_kind(observations: &[PrecipitationObservation], kind: WeatherKind) -> Decimal {
    round_total(sum_for_kind(observations, kind))
}

pub fn precipitation_totals(observations: &[PrecipitationObservation]) -> PrecipitationTotals {
    PrecipitationTotals {
        snow_inches: total_for_kind(observations, WeatherKind::Snow),
        rain_inches: total_for_kind(observations, WeatherKind::Rain),
    }
}

/// Returns `None` when there is nothing to average over.
pub fn temperature_averages(observations: &[TemperatureObservation]) -> Option<TemperatureAverages> {
    if observations.is_empty() {
        return None;
    }

    let count = Decimal::from(observations.len() as u64);
    let high_sum: i64 = observations.iter().map(|o| i64::from(o.high_f)).sum();
    let low_sum: i64 = observations.iter().map(|o| i64::from(o.low_f)).sum();

    Some(TemperatureAverages {
        high_f: round_average(Decimal::from(high_sum) / count),
        low_f: round_average(Decimal::from(low_sum) / count),
    })
}

/// Folds both observation kinds onto calendar days. Several temperature
/// readings on one day keep the coldest low and the warmest high.
pub fn daily_breakdown(
    temperatures: &[TemperatureObservation],
    precipitation: &[PrecipitationObservation],
) -> Vec<DailyWeather> {
    let mut days: BTreeMap<NaiveDate, DailyWeather> = BTreeMap::new();

    for observation in temperatures {
        let entry = days
            .entry(observation.observed_on)
            .or_insert_with(|| empty_day(observation.observed_on));
        entry.low_f = Some(entry.low_f.map_or(observation.low_f, |low| low.min(observation.low_f)));
        entry.high_f = Some(
            entry
                .high_f
                .map_or(observation.high_f, |high| high.max(observation.high_f)),
        );
    }

    for observation in precipitation {
        let entry = days
            .entry(observation.observed_on)
            .or_insert_with(|| empty_day(observation.observed_on));
        let (amount, date) = (observation.amount_inches, observation.observed_on);
        match observation.kind {
            WeatherKind::Snow => entry.snow_inches = accumulate(entry.snow_inches, amount, date),
            WeatherKind::Rain => entry.rain_inches = accumulate(entry.rain_inches, amount, date),
            WeatherKind::None => {}
        }
    }

    days.into_values().collect()
}

fn empty_day(date: NaiveDate) -> DailyWeather {
    DailyWeather {
        date,
        low_f: None,
        high_f: None,
        rain_inches: Decimal::ZERO,
        snow_inches: Decimal::ZERO,
    }
}

/// First day of the window; saturates at `NaiveDate::MIN` for huge windows.
pub fn cutoff_date(days: i64) -> NaiveDate {
    Duration::try_days(days.max(1))
        .and_then(|window| Utc::now().date_naive().checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN)
}
