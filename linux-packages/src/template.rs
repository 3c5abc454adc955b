// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Multiplexing of templated strings.

A template is a string containing placeholders of the form `{{ .name }}`. Given a
[VariableInventory] mapping each variable name to a list of candidate values,
[MultiplexTemplate::run()] renders every combination of values.

Internally a template is cut into parts, one per placeholder. Each part is
rendered once per candidate value of its variable, yielding a column of
_points_. The output is the Cartesian product of these columns, concatenated in
template order, with the first part varying slowest.

```
use linux_packages::template::{MultiplexTemplate, VariableInventory};

let mut variables = VariableInventory::default();
variables.insert("arch", ["x86_64", "aarch64"]);

let urls = MultiplexTemplate::new(["/BaseOS/{{ .arch }}/os/repodata/repomd.xml"], variables)
    .run()
    .unwrap();

assert_eq!(
    urls,
    vec![
        "/BaseOS/x86_64/os/repodata/repomd.xml",
        "/BaseOS/aarch64/os/repodata/repomd.xml",
    ]
);
```
*/

use {
    crate::error::{PackagesError, Result},
    once_cell::sync::Lazy,
    std::collections::HashMap,
};

pub const OPEN_DELIMITER: &str = "{{";
pub const CLOSE_DELIMITER: &str = "}}";

static RE_VARIABLE_REFERENCE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap());

/// Candidate values for named template variables.
///
/// Values keep insertion order. Empty values and duplicates are discarded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VariableInventory {
    values: HashMap<String, Vec<String>>,
}

impl VariableInventory {
    /// Add candidate values for a variable.
    pub fn insert(
        &mut self,
        name: impl ToString,
        values: impl IntoIterator<Item = impl ToString>,
    ) {
        let entry = self.values.entry(name.to_string()).or_default();

        for value in values {
            let value = value.to_string();

            if !value.is_empty() && !entry.contains(&value) {
                entry.push(value);
            }
        }
    }

    /// Obtain the candidate values of a variable.
    ///
    /// Unknown variables have no values.
    pub fn get(&self, name: &str) -> &[String] {
        self.values.get(name).map(|v| v.as_slice()).unwrap_or_default()
    }
}

impl<K: ToString, V: ToString> FromIterator<(K, Vec<V>)> for VariableInventory {
    fn from_iter<T: IntoIterator<Item = (K, Vec<V>)>>(iter: T) -> Self {
        let mut inventory = Self::default();

        for (name, values) in iter {
            inventory.insert(name, values);
        }

        inventory
    }
}

/// A span of a template bound to exactly one variable.
#[derive(Clone, Debug, Eq, PartialEq)]
struct TemplatePart {
    /// Literal text preceding the placeholder.
    prefix: String,
    /// Name of the referenced variable.
    variable: String,
    /// Literal text following the placeholder. Only the last part has any.
    suffix: String,
}

impl TemplatePart {
    /// Render this part once per candidate value of its variable.
    fn points(&self, variables: &VariableInventory) -> Vec<String> {
        variables
            .get(&self.variable)
            .iter()
            .map(|value| format!("{}{}{}", self.prefix, value, self.suffix))
            .collect()
    }
}

/// Cut a template into parts.
///
/// Returns an empty list when the template has no placeholders.
fn parse_parts(template: &str) -> Result<Vec<TemplatePart>> {
    let mut parts: Vec<TemplatePart> = vec![];
    let mut remaining = template;

    while let Some(open) = remaining.find(OPEN_DELIMITER) {
        let prefix = &remaining[..open];
        let after_open = &remaining[open + OPEN_DELIMITER.len()..];

        let close = after_open.find(CLOSE_DELIMITER).ok_or_else(|| {
            PackagesError::TemplateSyntax(
                template.to_string(),
                format!("unclosed {} delimiter", OPEN_DELIMITER),
            )
        })?;

        let reference = &after_open[..close];
        let variable = RE_VARIABLE_REFERENCE
            .captures(reference)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| {
                PackagesError::TemplateSyntax(
                    template.to_string(),
                    format!("invalid variable reference {:?}", reference),
                )
            })?;

        parts.push(TemplatePart {
            prefix: prefix.to_string(),
            variable: variable.as_str().to_string(),
            suffix: String::new(),
        });

        remaining = &after_open[close + CLOSE_DELIMITER.len()..];
    }

    if let Some(last) = parts.last_mut() {
        last.suffix = remaining.to_string();
    }

    Ok(parts)
}

/// Combine columns of points, first column varying slowest.
fn column_ordered_combinations(columns: &[Vec<String>]) -> Vec<String> {
    columns.iter().fold(vec![String::new()], |rows, column| {
        rows.iter()
            .flat_map(|row| column.iter().map(move |point| format!("{}{}", row, point)))
            .collect()
    })
}

/// Expands templates against a variable inventory.
#[derive(Clone, Debug, Default)]
pub struct MultiplexTemplate {
    templates: Vec<String>,
    variables: VariableInventory,
}

impl MultiplexTemplate {
    pub fn new(templates: impl IntoIterator<Item = impl ToString>, variables: VariableInventory) -> Self {
        Self {
            templates: templates.into_iter().map(|t| t.to_string()).collect(),
            variables,
        }
    }

    /// Render every template with every combination of variable values.
    ///
    /// Output preserves template order. A template without placeholders is
    /// emitted unchanged. A template referencing a variable with no candidate
    /// values contributes nothing. Any malformed template fails the whole run.
    pub fn run(&self) -> Result<Vec<String>> {
        let mut res = vec![];

        for template in &self.templates {
            res.extend(self.run_template(template)?);
        }

        Ok(res)
    }

    fn run_template(&self, template: &str) -> Result<Vec<String>> {
        let parts = parse_parts(template)?;

        if parts.is_empty() {
            return Ok(vec![template.to_string()]);
        }

        let columns = parts
            .iter()
            .map(|part| part.points(&self.variables))
            .collect::<Vec<_>>();

        Ok(column_ordered_combinations(&columns))
    }
}
