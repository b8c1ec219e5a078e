use std::fmt;
use tracing::debug;

use super::model::MeterReadingRow;
use super::value::format_number;

/// Non-blocking notice produced while recomputing a row. The row is still
/// updated; the caller only has to show the message.
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
    ReadingBelowPrevious {
        customer: String,
        previous: f64,
        current: f64,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::ReadingBelowPrevious {
                customer,
                previous,
                current,
            } => write!(
                f,
                "Current reading ({}) is below previous reading ({}) for '{}'; difference set to 0",
                format_number(*current),
                format_number(*previous),
                customer
            ),
        }
    }
}

/// Derive `difference`, `total` and `total_all` from the row's inputs.
///
/// A current reading below the previous one clamps the difference to 0 and
/// returns an [`Advisory`]. Running this on an already computed row gives
/// the same values back.
pub fn recompute(row: &MeterReadingRow) -> (MeterReadingRow, Option<Advisory>) {
    let previous = input(row.previous_reading);
    let current = input(row.current_reading);
    let price = input(row.price);
    let balance = input(row.balance);

    let raw_diff = current - previous;
    let (difference, advisory) = if raw_diff < 0.0 {
        let advisory = Advisory::ReadingBelowPrevious {
            customer: row.customer_name.clone(),
            previous,
            current,
        };
        (0.0, Some(advisory))
    } else {
        (zero_if_nan(raw_diff), None)
    };

    let total = zero_if_nan(difference * price);
    let total_all = zero_if_nan(total + balance);

    debug!(
        customer = %row.customer_name,
        difference, total, total_all, "recomputed row"
    );

    let updated = MeterReadingRow {
        difference: Some(difference),
        total: Some(total),
        total_all: Some(total_all),
        ..row.clone()
    };
    (updated, advisory)
}

fn input(value: Option<f64>) -> f64 {
    zero_if_nan(value.unwrap_or(0.0))
}

fn zero_if_nan(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn reading() -> impl Strategy<Value = f64> {
        -1_000_000.0..1_000_000.0f64
    }

    proptest! {
        #[test]
        fn recomputed_row_is_consistent(
            previous in reading(),
            current in reading(),
            price in 0.0..1_000.0f64,
            balance in proptest::option::of(-100_000.0..100_000.0f64)
        ) {
            let input = MeterReadingRow {
                customer_name: "Salem".to_string(),
                previous_reading: Some(previous),
                current_reading: Some(current),
                price: Some(price),
                balance,
                ..Default::default()
            };

            let (row, advisory) = recompute(&input);
            let difference = row.difference.unwrap();
            let total = row.total.unwrap();

            prop_assert!(difference >= 0.0);
            prop_assert_eq!(total, difference * price);
            prop_assert_eq!(row.total_all.unwrap(), total + balance.unwrap_or(0.0));
            prop_assert_eq!(advisory.is_some(), current < previous);
            if current >= previous {
                prop_assert_eq!(difference, current - previous);
            }
        }

        #[test]
        fn recompute_is_idempotent_for_any_row(
            previous in proptest::option::of(reading()),
            current in proptest::option::of(reading()),
            price in proptest::option::of(0.0..1_000.0f64),
            balance in proptest::option::of(-100_000.0..100_000.0f64)
        ) {
            let input = MeterReadingRow {
                previous_reading: previous,
                current_reading: current,
                price,
                balance,
                ..Default::default()
            };

            let (first, _) = recompute(&input);
            let (second, _) = recompute(&first);
            prop_assert_eq!(first, second);
        }
    }
}
