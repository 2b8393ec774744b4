use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, trace};

use crate::domain::JoyError;
use crate::filter::{FilteredView, SelectionMode};
use crate::schema::Indicator;
use crate::table::Table;

pub const TOP_N: usize = 10;
pub const BREAKDOWN_N: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub country: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub country: String,
    pub value: f64,
    /// Percentage of the breakdown total.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub title: String,
    pub shares: Vec<Share>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Country {
        country: String,
        literacy: f64,
        unemployment: f64,
        poverty: f64,
        happiness: f64,
    },
    Average {
        literacy: f64,
        unemployment: f64,
        poverty: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    InsufficientData,
    Matrix {
        fields: Vec<String>,
        values: Vec<Vec<f64>>,
    },
}

/// Descending order with NaN last; `sort_by` is stable so ties keep
/// their view order.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

fn sorted_desc(values: &[f64], view: &FilteredView) -> Vec<usize> {
    let mut rows = view.rows().to_vec();
    rows.sort_by(|&a, &b| descending(values[a], values[b]));
    rows
}

/// Countries ordered by the indicator, highest first. Only truncated when
/// no country is explicitly selected.
pub fn rank(
    table: &Table,
    view: &FilteredView,
    indicator: Indicator,
    mode: &SelectionMode,
    top_n: usize,
) -> Result<Vec<Ranked>, JoyError> {
    let values = table.indicator(indicator)?;
    let mut rows = sorted_desc(values, view);
    if *mode == SelectionMode::All {
        rows.truncate(top_n);
    }
    trace!("Ranked {} rows by {:?}", rows.len(), indicator);
    Ok(rows
        .into_iter()
        .map(|r| Ranked {
            country: table.country(r).to_string(),
            value: values[r],
        })
        .collect())
}

/// Poverty shares for the pie panel. Not shown for a single country.
pub fn poverty_breakdown(
    table: &Table,
    view: &FilteredView,
    mode: &SelectionMode,
    top_n: usize,
) -> Result<Option<Breakdown>, JoyError> {
    let poverty = table.indicator(Indicator::Poverty)?;
    let (title, rows) = match mode {
        SelectionMode::One(_) => return Ok(None),
        SelectionMode::All => {
            let mut rows = sorted_desc(poverty, view);
            rows.truncate(top_n);
            (format!("Top {top_n} Countries with Highest Poverty Rate"), rows)
        }
        SelectionMode::Many(_) => (
            "Poverty Rate for Selected Countries".to_string(),
            view.rows().to_vec(),
        ),
    };

    let total: f64 = rows
        .iter()
        .map(|&r| poverty[r])
        .filter(|v| !v.is_nan())
        .sum();
    let shares = rows
        .iter()
        .map(|&r| {
            let value = poverty[r];
            let percent = if total > 0.0 && !value.is_nan() {
                value / total * 100.0
            } else {
                0.0
            };
            Share {
                country: table.country(r).to_string(),
                value,
                percent,
            }
        })
        .collect();
    Ok(Some(Breakdown { title, shares }))
}

pub fn mean(values: &[f64], view: &FilteredView) -> Option<f64> {
    let (sum, n) = view
        .rows()
        .iter()
        .map(|&r| values[r])
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Metric cards. The caller has to guard against an empty view.
pub fn summary(
    table: &Table,
    view: &FilteredView,
    mode: &SelectionMode,
) -> Result<Summary, JoyError> {
    let first = *view.rows().first().ok_or(JoyError::EmptyView)?;
    let literacy = table.indicator(Indicator::Literacy)?;
    let unemployment = table.indicator(Indicator::Unemployment)?;
    let poverty = table.indicator(Indicator::Poverty)?;

    match mode {
        SelectionMode::One(_) => Ok(Summary::Country {
            country: table.country(first).to_string(),
            literacy: literacy[first],
            unemployment: unemployment[first],
            poverty: poverty[first],
            happiness: table.indicator(Indicator::Happiness)?[first],
        }),
        _ => Ok(Summary::Average {
            literacy: mean(literacy, view).unwrap_or(f64::NAN),
            unemployment: mean(unemployment, view).unwrap_or(f64::NAN),
            poverty: mean(poverty, view).unwrap_or(f64::NAN),
        }),
    }
}

/// X defaults to GDP per capita, Y to the happiness score, falling back to
/// the first two numeric columns.
pub fn default_axes(table: &Table) -> Result<(String, String), JoyError> {
    let numeric = table.numeric_columns();
    let pick = |preferred: Indicator, fallback: usize| {
        if numeric.contains(&preferred.column()) {
            Ok(preferred.column().to_string())
        } else {
            numeric
                .get(fallback)
                .map(|s| s.to_string())
                .ok_or_else(|| JoyError::UnknownField(preferred.column().to_string()))
        }
    };
    Ok((
        pick(Indicator::GdpPerCapita, 0)?,
        pick(Indicator::Happiness, 1)?,
    ))
}

pub fn scatter(
    table: &Table,
    view: &FilteredView,
    x: &str,
    y: &str,
) -> Result<Vec<(f64, f64)>, JoyError> {
    let xs = table.numeric(x)?;
    let ys = table.numeric(y)?;
    Ok(view.rows().iter().map(|&r| (xs[r], ys[r])).collect())
}

/// Pearson coefficient over the rows where both values are present.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

pub fn correlation(table: &Table, view: &FilteredView) -> Result<Correlation, JoyError> {
    if view.len() <= 1 {
        return Ok(Correlation::InsufficientData);
    }
    let fields: Vec<String> = table
        .numeric_columns()
        .into_iter()
        .map(String::from)
        .collect();
    let columns = fields
        .iter()
        .map(|f| -> Result<Vec<f64>, JoyError> {
            let values = table.numeric(f)?;
            Ok(view.rows().iter().map(|&r| values[r]).collect::<Vec<f64>>())
        })
        .collect::<Result<Vec<_>, JoyError>>()?;

    let n = fields.len();
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| match i.cmp(&j) {
                    Ordering::Equal => 1.0,
                    Ordering::Less => pearson(&columns[i], &columns[j]),
                    Ordering::Greater => 0.0,
                })
                .collect()
        })
        .collect();

    // Mirror the upper triangle so the matrix is exactly symmetric.
    let values = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| if i <= j { upper[i][j] } else { upper[j][i] })
                .collect()
        })
        .collect();
    debug!("Correlation matrix {n}x{n} over {} rows", view.len());
    Ok(Correlation::Matrix { fields, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Criteria, apply};
    use crate::table::tests::{sample_table, wide_table};

    fn full(table: &Table) -> (Criteria, FilteredView) {
        let criteria = Criteria::defaults(table).unwrap();
        let view = apply(table, &criteria).unwrap();
        (criteria, view)
    }

    #[test]
    fn scenario_two_countries() {
        let table = sample_table();
        let (criteria, view) = full(&table);
        assert_eq!(view.len(), 2);

        let ranking = rank(&table, &view, Indicator::Poverty, &criteria.mode(), TOP_N).unwrap();
        let names: Vec<&str> = ranking.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, vec!["Chad", "Finland"]);

        let breakdown = poverty_breakdown(&table, &view, &criteria.mode(), BREAKDOWN_N)
            .unwrap()
            .unwrap();
        assert_eq!(breakdown.title, "Top 5 Countries with Highest Poverty Rate");
        assert_eq!(breakdown.shares[0].country, "Chad");
        assert!((breakdown.shares[0].percent - 98.969).abs() < 1e-2);
        assert!((breakdown.shares[1].percent - 1.031).abs() < 1e-2);
    }

    #[test]
    fn scenario_single_country() {
        let table = sample_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        criteria.toggle_country("Finland");
        let view = apply(&table, &criteria).unwrap();
        let mode = criteria.mode();

        let expected = Summary::Country {
            country: "Finland".into(),
            literacy: 100.0,
            unemployment: 6.7,
            poverty: 0.4,
            happiness: 7.8,
        };
        assert_eq!(summary(&table, &view, &mode).unwrap(), expected);
        assert_eq!(poverty_breakdown(&table, &view, &mode, BREAKDOWN_N).unwrap(), None);
    }

    #[test]
    fn summary_averages_without_single_selection() {
        let table = sample_table();
        let (criteria, view) = full(&table);
        match summary(&table, &view, &criteria.mode()).unwrap() {
            Summary::Average {
                literacy,
                unemployment,
                poverty,
            } => {
                assert!((literacy - 61.0).abs() < 1e-9);
                assert!((unemployment - 5.35).abs() < 1e-9);
                assert!((poverty - 19.4).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn summary_of_empty_view_is_refused() {
        let table = sample_table();
        let view = FilteredView::default();
        assert!(matches!(
            summary(&table, &view, &SelectionMode::All),
            Err(JoyError::EmptyView)
        ));
    }

    #[test]
    fn ranking_truncates_only_without_selection() {
        let table = wide_table();
        let (mut criteria, view) = full(&table);
        let top = rank(&table, &view, Indicator::GdpPerCapita, &criteria.mode(), TOP_N).unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].country, "C11");

        for i in 0..12 {
            criteria.toggle_country(&format!("C{i:02}"));
        }
        let view = apply(&table, &criteria).unwrap();
        let all = rank(&table, &view, Indicator::GdpPerCapita, &criteria.mode(), TOP_N).unwrap();
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn ranking_is_stable_and_idempotent() {
        let table = wide_table();
        let (criteria, view) = full(&table);
        // Unemployment cycles 3, 4, 5, 6 so there are plenty of ties.
        let ranked = rank(&table, &view, Indicator::Unemployment, &SelectionMode::Many(12), TOP_N)
            .unwrap();
        let names: Vec<&str> = ranked.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(&names[..3], &["C03", "C07", "C11"]);
        assert!(ranked.windows(2).all(|w| w[0].value >= w[1].value));

        let values = table.indicator(Indicator::Unemployment).unwrap();
        let once = sorted_desc(values, &view);
        let mut again = once.clone();
        again.sort_by(|&a, &b| descending(values[a], values[b]));
        assert_eq!(once, again);
        assert_eq!(criteria.mode(), SelectionMode::All);
    }

    #[test]
    fn breakdown_title_follows_the_requested_count() {
        let table = wide_table();
        let (criteria, view) = full(&table);
        let breakdown = poverty_breakdown(&table, &view, &criteria.mode(), 3)
            .unwrap()
            .unwrap();
        assert_eq!(breakdown.title, "Top 3 Countries with Highest Poverty Rate");
        let names: Vec<&str> = breakdown.shares.iter().map(|s| s.country.as_str()).collect();
        assert_eq!(names, vec!["C00", "C01", "C02"]);
    }

    #[test]
    fn breakdown_for_many_uses_whole_view() {
        let table = wide_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        for c in ["C00", "C01", "C02", "C03", "C04", "C05", "C06"] {
            criteria.toggle_country(c);
        }
        let view = apply(&table, &criteria).unwrap();
        let breakdown = poverty_breakdown(&table, &view, &criteria.mode(), BREAKDOWN_N)
            .unwrap()
            .unwrap();
        assert_eq!(breakdown.title, "Poverty Rate for Selected Countries");
        assert_eq!(breakdown.shares.len(), 7);
        let total: f64 = breakdown.shares.iter().map(|s| s.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn default_axes_prefer_gdp_and_happiness() {
        let table = sample_table();
        let (x, y) = default_axes(&table).unwrap();
        assert_eq!(x, "GDP_per_Capita_USD");
        assert_eq!(y, "Happiness_Score");
    }

    #[test]
    fn scatter_has_one_point_per_row() {
        let table = sample_table();
        let (_, view) = full(&table);
        let points = scatter(&table, &view, "GDP_per_Capita_USD", "Happiness_Score").unwrap();
        assert_eq!(points, vec![(53_000.0, 7.8), (700.0, 4.4)]);
        assert!(scatter(&table, &view, "Country", "Happiness_Score").is_err());
    }

    #[test]
    fn correlation_needs_two_rows() {
        let table = sample_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        criteria.toggle_country("Chad");
        let view = apply(&table, &criteria).unwrap();
        assert_eq!(
            correlation(&table, &view).unwrap(),
            Correlation::InsufficientData
        );
    }

    #[test]
    fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let table = wide_table();
        let (_, view) = full(&table);
        let Correlation::Matrix { fields, values } = correlation(&table, &view).unwrap() else {
            panic!("expected a matrix");
        };
        assert_eq!(fields.len(), 5);
        for i in 0..fields.len() {
            assert_eq!(values[i][i], 1.0);
            for j in 0..fields.len() {
                assert_eq!(values[i][j], values[j][i]);
                assert!((-1.0..=1.0).contains(&values[i][j]));
            }
        }
        // Literacy rises and poverty falls linearly with the row index.
        let lit = fields.iter().position(|f| f == "Literacy_Rate(%)").unwrap();
        let pov = fields.iter().position(|f| f == "Poverty_Rate(%)  ").unwrap();
        assert!((values[lit][pov] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_of_constant_column_is_nan() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
    }
}
