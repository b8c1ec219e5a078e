use serde::Serialize;

use super::model::MeterReadingRow;

/// Document-level sums over the row table.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub total_consumption: f64,
    pub total: f64,
}

/// Sum `difference` and `total` over all rows. Missing values count as 0.
pub fn aggregate(rows: &[MeterReadingRow]) -> Totals {
    rows.iter().fold(Totals::default(), |acc, row| Totals {
        total_consumption: acc.total_consumption + finite(row.difference),
        total: acc.total + finite(row.total),
    })
}

fn finite(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(difference: Option<f64>, total: Option<f64>) -> MeterReadingRow {
        MeterReadingRow {
            difference,
            total,
            ..Default::default()
        }
    }

    #[test]
    fn test_aggregate_sums_rows() {
        let rows = vec![row(Some(50.0), Some(150.0)), row(Some(20.0), Some(60.0))];
        let totals = aggregate(&rows);
        assert_eq!(totals.total_consumption, 70.0);
        assert_eq!(totals.total, 210.0);
    }

    #[test]
    fn test_aggregate_treats_missing_as_zero() {
        let rows = vec![row(None, Some(10.0)), row(Some(5.0), None), row(Some(f64::NAN), None)];
        let totals = aggregate(&rows);
        assert_eq!(totals.total_consumption, 5.0);
        assert_eq!(totals.total, 10.0);
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[]), Totals::default());
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let mut rows = vec![
            row(Some(3.0), Some(9.0)),
            row(Some(4.0), Some(16.0)),
            row(Some(5.0), Some(25.0)),
        ];
        let forward = aggregate(&rows);
        rows.reverse();
        assert_eq!(aggregate(&rows), forward);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // Quarter steps keep every partial sum exact, whatever the order.
    fn amount() -> impl Strategy<Value = Option<f64>> {
        proptest::option::of((-4_000_000i64..4_000_000i64).prop_map(|v| v as f64 / 4.0))
    }

    fn rows() -> impl Strategy<Value = Vec<MeterReadingRow>> {
        proptest::collection::vec(
            (amount(), amount()).prop_map(|(difference, total)| MeterReadingRow {
                difference,
                total,
                ..Default::default()
            }),
            0..40,
        )
    }

    proptest! {
        #[test]
        fn totals_are_column_sums(rows in rows()) {
            let totals = aggregate(&rows);

            let consumption: f64 = rows.iter().map(|r| r.difference.unwrap_or(0.0)).sum();
            let total: f64 = rows.iter().map(|r| r.total.unwrap_or(0.0)).sum();
            prop_assert_eq!(totals.total_consumption, consumption);
            prop_assert_eq!(totals.total, total);
            prop_assert_eq!(aggregate(&rows), totals);
        }

        #[test]
        fn totals_ignore_row_order(
            (rows, shuffled) in rows().prop_flat_map(|rows| {
                let shuffled = Just(rows.clone()).prop_shuffle();
                (Just(rows), shuffled)
            })
        ) {
            prop_assert_eq!(aggregate(&shuffled), aggregate(&rows));
        }
    }
}
