use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::{Facet, FacetRow};

/// Distinct observed values per facet, sorted for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetDomains {
    domains: BTreeMap<Facet, BTreeSet<String>>,
}

impl FacetDomains {
    /// Scan unfiltered rows. Empty strings are not selectable values.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a FacetRow>) -> Self {
        let mut domains: BTreeMap<Facet, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            for facet in Facet::ALL {
                for value in row.values(facet) {
                    if value.is_empty() {
                        continue;
                    }
                    domains
                        .entry(facet)
                        .or_default()
                        .insert(value.to_string());
                }
            }
        }
        Self { domains }
    }

    pub fn values(&self, facet: Facet) -> Vec<&str> {
        self.domains
            .get(&facet)
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, facet: Facet) -> usize {
        self.domains.get(&facet).map_or(0, BTreeSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.values().all(BTreeSet::is_empty)
    }

    pub fn clear(&mut self) {
        self.domains.clear();
    }
}

/// Values chosen per facet, in the order the controls list them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub tags: Vec<String>,
    pub city: Vec<String>,
    pub state: Vec<String>,
    pub subregion: Vec<String>,
    pub region: Vec<String>,
}

impl FilterSelection {
    pub fn values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Tags => &self.tags,
            Facet::City => &self.city,
            Facet::State => &self.state,
            Facet::Subregion => &self.subregion,
            Facet::Region => &self.region,
        }
    }

    pub fn values_mut(&mut self, facet: Facet) -> &mut Vec<String> {
        match facet {
            Facet::Tags => &mut self.tags,
            Facet::City => &mut self.city,
            Facet::State => &mut self.state,
            Facet::Subregion => &mut self.subregion,
            Facet::Region => &mut self.region,
        }
    }

    pub fn is_empty(&self) -> bool {
        Facet::ALL
            .iter()
            .all(|facet| self.values(*facet).is_empty())
    }

    pub fn count(&self) -> usize {
        Facet::ALL
            .iter()
            .map(|facet| self.values(*facet).len())
            .sum()
    }
}

/// A single PostgREST filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `col=cs.{a,b}`: the array column contains every listed value.
    Contains { field: Facet, values: Vec<String> },
    /// `col=eq.a`
    Eq { field: Facet, value: String },
    /// `col=in.(a,b)`
    In { field: Facet, values: Vec<String> },
}

impl Clause {
    pub const fn field(&self) -> Facet {
        match self {
            Self::Contains { field, .. } | Self::Eq { field, .. } | Self::In { field, .. } => {
                *field
            }
        }
    }

    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Contains { .. } => "cs",
            Self::Eq { .. } => "eq",
            Self::In { .. } => "in",
        }
    }

    /// Right-hand side of the query parameter, e.g. `in.(West,South)`.
    pub fn encode_value(&self) -> String {
        match self {
            Self::Contains { values, .. } => {
                let items = values
                    .iter()
                    .map(|value| quote_array_element(value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("cs.{{{items}}}")
            }
            Self::Eq { value, .. } => format!("eq.{value}"),
            Self::In { values, .. } => {
                let items = values
                    .iter()
                    .map(|value| quote_list_element(value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("in.({items})")
            }
        }
    }
}

/// Ordered filter clauses for one fetch. Empty means "whole table".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    clauses: Vec<Clause>,
}

impl FilterQuery {
    pub const fn unfiltered() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Tags first, then city, state, subregion, region. Facets with no
    /// selection contribute nothing.
    pub fn from_selection(selection: &FilterSelection) -> Self {
        let mut clauses = Vec::new();

        if !selection.tags.is_empty() {
            clauses.push(Clause::Contains {
                field: Facet::Tags,
                values: selection.tags.clone(),
            });
        }

        for facet in Facet::SCALARS {
            match selection.values(facet) {
                [] => {}
                [value] => clauses.push(Clause::Eq {
                    field: facet,
                    value: value.clone(),
                }),
                values => clauses.push(Clause::In {
                    field: facet,
                    values: values.to_vec(),
                }),
            }
        }

        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `(column, encoded value)` pairs, ready to hand to an HTTP client
    /// that does its own percent-encoding.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        self.clauses
            .iter()
            .map(|clause| (clause.field().as_str(), clause.encode_value()))
            .collect()
    }

    /// Unencoded `col=op.value&...` form, as shown to users and logged.
    pub fn to_query_string(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for FilterQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

fn has_edge_whitespace(value: &str) -> bool {
    value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace)
}

/// Element of an `in.(...)` list. PostgREST reserves `,.:()` there.
fn quote_list_element(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|ch| matches!(ch, ',' | '.' | ':' | '(' | ')' | '"' | '\\'));
    if reserved || value.is_empty() || has_edge_whitespace(value) {
        escape_quoted(value)
    } else {
        value.to_string()
    }
}

/// Element of a Postgres array literal inside `cs.{...}`.
fn quote_array_element(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|ch| matches!(ch, ',' | '{' | '}' | '"' | '\\'));
    if reserved
        || value.is_empty()
        || has_edge_whitespace(value)
        || value.eq_ignore_ascii_case("null")
    {
        escape_quoted(value)
    } else {
        value.to_string()
    }
}

/// Live state of one facet's multi-select control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetControl {
    facet: Facet,
    options: Vec<String>,
    checked: Vec<bool>,
}

impl FacetControl {
    pub const fn new(facet: Facet) -> Self {
        Self {
            facet,
            options: Vec::new(),
            checked: Vec::new(),
        }
    }

    pub const fn facet(&self) -> Facet {
        self.facet
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Replace the options. Repopulating drops any previous selection.
    pub fn populate(&mut self, values: &[&str]) {
        self.options = values.iter().map(|value| (*value).to_string()).collect();
        self.checked = vec![false; self.options.len()];
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.checked.get(index).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(flag) = self.checked.get_mut(index) {
            *flag = !*flag;
        }
    }

    pub fn set_checked(&mut self, value: &str, checked: bool) -> bool {
        match self.options.iter().position(|option| option == value) {
            Some(index) => {
                self.checked[index] = checked;
                true
            }
            None => false,
        }
    }

    /// Checked values in control order.
    pub fn selected(&self) -> Vec<String> {
        self.options
            .iter()
            .zip(&self.checked)
            .filter(|(_, checked)| **checked)
            .map(|(option, _)| option.clone())
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.checked.iter().filter(|checked| **checked).count()
    }

    pub fn clear(&mut self) {
        self.checked.iter_mut().for_each(|flag| *flag = false);
    }
}

/// The filter form: one control per facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterForm {
    controls: [FacetControl; 5],
}

impl Default for FilterForm {
    fn default() -> Self {
        Self {
            controls: Facet::ALL.map(FacetControl::new),
        }
    }
}

impl FilterForm {
    pub fn control(&self, facet: Facet) -> &FacetControl {
        &self.controls[facet.index()]
    }

    pub fn control_mut(&mut self, facet: Facet) -> &mut FacetControl {
        &mut self.controls[facet.index()]
    }

    pub fn populate(&mut self, domains: &FacetDomains) {
        for facet in Facet::ALL {
            self.control_mut(facet).populate(&domains.values(facet));
        }
    }

    /// Read the selection from the controls as they are right now.
    pub fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::default();
        for control in &self.controls {
            *selection.values_mut(control.facet()) = control.selected();
        }
        selection
    }

    pub fn clear(&mut self) {
        self.controls.iter_mut().for_each(FacetControl::clear);
    }
}

/// Facet domains plus the form they populate.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    domains: FacetDomains,
    form: FilterForm,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn domains(&self) -> &FacetDomains {
        &self.domains
    }

    pub const fn form(&self) -> &FilterForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FilterForm {
        &mut self.form
    }

    /// Rebuild every domain from a full scan and repopulate the controls.
    pub fn apply_rows(&mut self, rows: &[FacetRow]) {
        self.domains = FacetDomains::from_rows(rows);
        self.form.populate(&self.domains);
        tracing::debug!(
            tags = self.domains.len(Facet::Tags),
            cities = self.domains.len(Facet::City),
            states = self.domains.len(Facet::State),
            "facet domains loaded"
        );
    }

    /// Called when the domain fetch fails: nothing is selectable.
    pub fn reset_domains(&mut self) {
        self.domains.clear();
        self.form.populate(&self.domains);
    }

    pub fn build_filter_query(&self) -> FilterQuery {
        FilterQuery::from_selection(&self.form.selection())
    }

    /// Unselect everything. Does not trigger a fetch.
    pub fn clear_selection(&mut self) {
        self.form.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(city: &str, state: &str, region: &str, tags: &[&str]) -> FacetRow {
        FacetRow {
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            subregion: None,
            region: Some(region.to_string()),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn test_empty_selection_is_empty_query() {
        let query = FilterQuery::from_selection(&FilterSelection::default());
        assert!(query.is_empty());
        assert_eq!(query.to_query_string(), "");
    }

    #[test]
    fn test_single_city_is_equality() {
        let selection = FilterSelection {
            city: strings(&["Austin"]),
            ..FilterSelection::default()
        };
        let encoded = FilterQuery::from_selection(&selection).to_query_string();
        assert!(encoded.contains("city=eq.Austin"));
        assert!(!encoded.contains("city=in."));
    }

    #[test]
    fn test_two_regions_is_membership() {
        let selection = FilterSelection {
            region: strings(&["West", "South"]),
            ..FilterSelection::default()
        };
        let encoded = FilterQuery::from_selection(&selection).to_query_string();
        assert!(encoded.contains("region=in.(West,South)"));
    }

    #[test]
    fn test_tags_keep_form_order() {
        let selection = FilterSelection {
            tags: strings(&["t1", "t2", "t3"]),
            ..FilterSelection::default()
        };
        let encoded = FilterQuery::from_selection(&selection).to_query_string();
        assert_eq!(encoded, "tags=cs.{t1,t2,t3}");
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let selection = FilterSelection {
            region: strings(&["West"]),
            state: strings(&["TX", "CA"]),
            tags: strings(&["park"]),
            ..FilterSelection::default()
        };
        let query = FilterQuery::from_selection(&selection);
        let fields: Vec<Facet> = query.clauses().iter().map(Clause::field).collect();
        assert_eq!(fields, vec![Facet::Tags, Facet::State, Facet::Region]);
        assert_eq!(
            query.to_query_string(),
            "tags=cs.{park}&state=in.(TX,CA)&region=eq.West"
        );
    }

    #[test]
    fn test_delimiters_are_quoted() {
        let selection = FilterSelection {
            tags: strings(&["food, drink", "say \"hi\""]),
            city: strings(&["St. Louis", "Kansas City"]),
            ..FilterSelection::default()
        };
        let pairs = FilterQuery::from_selection(&selection).pairs();
        assert_eq!(
            pairs[0],
            ("tags", r#"cs.{"food, drink","say \"hi\""}"#.to_string())
        );
        assert_eq!(pairs[1], ("city", r#"in.("St. Louis",Kansas City)"#.to_string()));
    }

    #[test]
    fn test_eq_value_is_verbatim() {
        let selection = FilterSelection {
            city: strings(&["St. Louis"]),
            ..FilterSelection::default()
        };
        assert_eq!(
            FilterQuery::from_selection(&selection).to_query_string(),
            "city=eq.St. Louis"
        );
    }

    #[test]
    fn test_domains_sorted_unique_and_idempotent() {
        let rows = vec![
            row("Denver", "CO", "West", &["park", "hiking"]),
            row("Austin", "TX", "South", &["park"]),
            row("Austin", "TX", "South", &[]),
            FacetRow::default(),
            row("", "CO", "West", &[""]),
        ];

        let first = FacetDomains::from_rows(&rows);
        let second = FacetDomains::from_rows(&rows);

        assert_eq!(first, second);
        assert_eq!(first.values(Facet::City), vec!["Austin", "Denver"]);
        assert_eq!(first.values(Facet::Tags), vec!["hiking", "park"]);
        assert_eq!(first.values(Facet::State), vec!["CO", "TX"]);
        assert!(first.values(Facet::Subregion).is_empty());
    }

    #[test]
    fn test_form_selection_and_clear() {
        let rows = vec![
            row("Denver", "CO", "West", &["t2", "t1"]),
            row("Austin", "TX", "South", &["t3"]),
        ];
        let mut state = FilterState::new();
        state.apply_rows(&rows);

        assert!(state.build_filter_query().is_empty());

        let form = state.form_mut();
        assert!(form.control_mut(Facet::Tags).set_checked("t3", true));
        assert!(form.control_mut(Facet::Tags).set_checked("t1", true));
        assert!(form.control_mut(Facet::City).set_checked("Austin", true));
        assert!(!form.control_mut(Facet::City).set_checked("Boston", true));

        assert_eq!(
            state.build_filter_query().to_query_string(),
            "tags=cs.{t1,t3}&city=eq.Austin"
        );

        state.clear_selection();
        assert!(state.form().selection().is_empty());
        assert_eq!(state.build_filter_query().to_query_string(), "");
        // Options survive a clear
        assert_eq!(state.form().control(Facet::Tags).options().len(), 3);
    }

    #[test]
    fn test_reset_domains_empties_controls() {
        let mut state = FilterState::new();
        state.apply_rows(&[row("Denver", "CO", "West", &["park"])]);
        state.form_mut().control_mut(Facet::City).toggle(0);

        state.reset_domains();

        assert!(state.domains().is_empty());
        assert!(state.form().control(Facet::City).options().is_empty());
        assert!(state.form().selection().is_empty());
    }
}
