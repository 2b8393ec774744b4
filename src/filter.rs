use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use crate::domain::JoyError;
use crate::schema::Indicator;
use crate::table::Table;

/// Closed interval constraint on one indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub field: Indicator,
    pub lo: f64,
    pub hi: f64,
}

impl RangeFilter {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }

    pub fn nudge_lo(&mut self, delta: f64, bounds: (f64, f64)) {
        self.lo = (self.lo + delta).clamp(bounds.0, self.hi);
    }

    pub fn nudge_hi(&mut self, delta: f64, bounds: (f64, f64)) {
        self.hi = (self.hi + delta).clamp(self.lo, bounds.1);
    }
}

/// How many countries the user picked explicitly. Computed once per
/// interaction and handed to every stage that branches on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    All,
    One(String),
    Many(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub countries: BTreeSet<String>,
    pub ranges: Vec<RangeFilter>,
}

impl Criteria {
    /// Slider ranges spanning the full table, no country restriction.
    /// Bounds are widened to whole numbers so the integer sliders still
    /// include every row.
    pub fn defaults(table: &Table) -> Result<Criteria, JoyError> {
        let ranges = Indicator::SLIDERS
            .iter()
            .map(|&field| -> Result<RangeFilter, JoyError> {
                let (lo, hi) = slider_bounds(table, field)?;
                Ok(RangeFilter { field, lo, hi })
            })
            .collect::<Result<Vec<_>, JoyError>>()?;
        Ok(Criteria {
            countries: BTreeSet::new(),
            ranges,
        })
    }

    pub fn mode(&self) -> SelectionMode {
        match self.countries.len() {
            0 => SelectionMode::All,
            1 => SelectionMode::One(self.countries.iter().next().cloned().unwrap_or_default()),
            n => SelectionMode::Many(n),
        }
    }

    pub fn toggle_country(&mut self, country: &str) {
        if !self.countries.remove(country) {
            self.countries.insert(country.to_string());
        }
    }

    pub fn range_mut(&mut self, field: Indicator) -> Option<&mut RangeFilter> {
        self.ranges.iter_mut().find(|r| r.field == field)
    }

    pub fn range(&self, field: Indicator) -> Option<&RangeFilter> {
        self.ranges.iter().find(|r| r.field == field)
    }
}

/// Integer slider bounds derived from the global column range.
pub fn slider_bounds(table: &Table, field: Indicator) -> Result<(f64, f64), JoyError> {
    let (lo, hi) = table.bounds(field.column())?;
    Ok((lo.floor(), hi.ceil()))
}

/// Row indices of the table that satisfy the criteria, in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredView {
    rows: Arc<Vec<usize>>,
}

impl FilteredView {
    pub fn all(table: &Table) -> Self {
        FilteredView {
            rows: Arc::new((0..table.nrows()).collect()),
        }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn apply(table: &Table, criteria: &Criteria) -> Result<FilteredView, JoyError> {
    refine(table, &FilteredView::all(table), criteria)
}

/// Narrows an existing view further. Applying criteria to a view they
/// already produced returns the same rows.
pub fn refine(
    table: &Table,
    view: &FilteredView,
    criteria: &Criteria,
) -> Result<FilteredView, JoyError> {
    let columns = criteria
        .ranges
        .iter()
        .map(|r| table.indicator(r.field).map(|values| (r, values)))
        .collect::<Result<Vec<_>, JoyError>>()?;

    let rows: Vec<usize> = view
        .rows
        .iter()
        .copied()
        .filter(|&row| columns.iter().all(|(range, values)| range.contains(values[row])))
        .filter(|&row| {
            criteria.countries.is_empty() || criteria.countries.contains(table.country(row))
        })
        .collect();

    trace!(
        "Filter kept {}/{} rows (countries: {}, ranges: {:?})",
        rows.len(),
        view.len(),
        criteria.countries.len(),
        criteria.ranges
    );
    Ok(FilteredView {
        rows: Arc::new(rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::{sample_table, wide_table};

    #[test]
    fn defaults_keep_every_row() {
        let table = wide_table();
        let criteria = Criteria::defaults(&table).unwrap();
        assert_eq!(criteria.mode(), SelectionMode::All);
        assert_eq!(apply(&table, &criteria).unwrap().len(), 12);
    }

    #[test]
    fn default_bounds_are_whole_numbers_around_global_range() {
        let table = sample_table();
        let criteria = Criteria::defaults(&table).unwrap();
        let poverty = criteria.range(Indicator::Poverty).unwrap();
        assert_eq!((poverty.lo, poverty.hi), (0.0, 39.0));
    }

    #[test]
    fn ranges_are_inclusive_and_order_is_kept() {
        let table = wide_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        // Poverty runs 60, 55, ..., 5
        let poverty = criteria.range_mut(Indicator::Poverty).unwrap();
        poverty.lo = 20.0;
        poverty.hi = 40.0;
        let view = apply(&table, &criteria).unwrap();
        assert_eq!(view.rows(), &[4, 5, 6, 7, 8]);
    }

    #[test]
    fn every_passing_row_satisfies_every_constraint() {
        let table = wide_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        criteria.range_mut(Indicator::Literacy).unwrap().lo = 60.0;
        criteria.range_mut(Indicator::Poverty).unwrap().hi = 45.0;
        criteria.toggle_country("C05");
        criteria.toggle_country("C01");
        criteria.toggle_country("C09");

        let view = apply(&table, &criteria).unwrap();
        let literacy = table.indicator(Indicator::Literacy).unwrap();
        let poverty = table.indicator(Indicator::Poverty).unwrap();
        let expected: Vec<usize> = (0..table.nrows())
            .filter(|&r| literacy[r] >= 60.0 && poverty[r] <= 45.0)
            .filter(|&r| criteria.countries.contains(table.country(r)))
            .collect();
        assert_eq!(view.rows(), expected.as_slice());
        assert_eq!(view.rows(), &[5, 9]);
    }

    #[test]
    fn refining_with_the_same_criteria_is_a_no_op() {
        let table = wide_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        criteria.range_mut(Indicator::Poverty).unwrap().hi = 30.0;
        let once = apply(&table, &criteria).unwrap();
        let twice = refine(&table, &once, &criteria).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn refining_with_looser_criteria_keeps_the_view() {
        let table = wide_table();
        let mut narrow = Criteria::defaults(&table).unwrap();
        narrow.range_mut(Indicator::Poverty).unwrap().hi = 30.0;
        narrow.range_mut(Indicator::Literacy).unwrap().lo = 60.0;
        for c in ["C05", "C07", "C09", "C11"] {
            narrow.toggle_country(c);
        }
        let once = apply(&table, &narrow).unwrap();
        assert_eq!(once.rows(), &[7, 9, 11]);

        // Full default ranges, no country restriction.
        let defaults = Criteria::defaults(&table).unwrap();
        assert_eq!(refine(&table, &once, &defaults).unwrap(), once);

        // Wider ranges and a superset of the selected countries.
        let mut wider = Criteria::defaults(&table).unwrap();
        wider.range_mut(Indicator::Poverty).unwrap().hi = 45.0;
        wider.range_mut(Indicator::Literacy).unwrap().lo = 55.0;
        for c in ["C03", "C05", "C07", "C08", "C09", "C11"] {
            wider.toggle_country(c);
        }
        assert_eq!(refine(&table, &once, &wider).unwrap(), once);
    }

    #[test]
    fn mode_reflects_selection_size() {
        let mut criteria = Criteria::default();
        assert_eq!(criteria.mode(), SelectionMode::All);
        criteria.toggle_country("Finland");
        assert_eq!(criteria.mode(), SelectionMode::One("Finland".into()));
        criteria.toggle_country("Chad");
        assert_eq!(criteria.mode(), SelectionMode::Many(2));
        criteria.toggle_country("Chad");
        criteria.toggle_country("Finland");
        assert_eq!(criteria.mode(), SelectionMode::All);
    }

    #[test]
    fn impossible_range_yields_empty_view() {
        let table = sample_table();
        let mut criteria = Criteria::defaults(&table).unwrap();
        let literacy = criteria.range_mut(Indicator::Literacy).unwrap();
        literacy.lo = 50.0;
        literacy.hi = 60.0;
        assert!(apply(&table, &criteria).unwrap().is_empty());
    }

    #[test]
    fn nudges_stay_within_bounds() {
        let mut range = RangeFilter {
            field: Indicator::Poverty,
            lo: 0.0,
            hi: 10.0,
        };
        range.nudge_lo(-1.0, (0.0, 10.0));
        assert_eq!(range.lo, 0.0);
        range.nudge_lo(25.0, (0.0, 10.0));
        assert_eq!(range.lo, 10.0);
        range.nudge_hi(-3.0, (0.0, 10.0));
        assert_eq!(range.hi, 10.0);
    }
}
