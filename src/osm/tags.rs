use std::collections::BTreeMap;

use serde::Deserialize;

use crate::geofile::feature::FeatureMap;

/// Value side of a tag specification entry.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagValue {
    /// `true` matches any value of the key. `false` matches nothing.
    Any(bool),
    One(String),
    Many(Vec<String>),
}

/// OSM tags to select features by, e.g. `{landuse: true}` or `{building: [church, chapel]}`.
/// A feature is selected when any of the entries match.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagSpec(BTreeMap<String, TagValue>);

impl TagSpec {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with_any(mut self, key: &str) -> Self {
        self.0.insert(key.to_string(), TagValue::Any(true));
        self
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), TagValue::One(value.to_string()));
        self
    }

    pub fn with_values(mut self, key: &str, values: &[&str]) -> Self {
        self.0.insert(
            key.to_string(),
            TagValue::Many(values.iter().map(|value| value.to_string()).collect()),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, tags: &FeatureMap) -> bool {
        self.0.iter().any(|(key, value)| match (value, tags.get(key)) {
            (TagValue::Any(any), Some(_)) => *any,
            (TagValue::One(expected), Some(actual)) => expected == actual,
            (TagValue::Many(expected), Some(actual)) => expected.contains(actual),
            (_, None) => false,
        })
    }

    /// Overpass QL tag filters, one per selectable key or key/value pair.
    pub fn overpass_filters(&self) -> Vec<String> {
        let mut filters = Vec::new();
        for (key, value) in &self.0 {
            match value {
                TagValue::Any(true) => filters.push(format!("[\"{}\"]", escape(key))),
                TagValue::Any(false) => {
                    log::warn!("Tag '{}' is set to false and selects no features", key)
                }
                TagValue::One(value) => {
                    filters.push(format!("[\"{}\"=\"{}\"]", escape(key), escape(value)))
                }
                TagValue::Many(values) => filters.extend(
                    values
                        .iter()
                        .map(|value| format!("[\"{}\"=\"{}\"]", escape(key), escape(value))),
                ),
            }
        }
        filters
    }

    /// Short file-name safe description of the selected tags, used to name cache files.
    pub fn slug(&self) -> String {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| match value {
                TagValue::Any(true) => key.clone(),
                TagValue::Any(false) => format!("{key}=false"),
                TagValue::One(value) => format!("{key}={value}"),
                TagValue::Many(values) => format!("{key}={}", values.join("+")),
            })
            .collect();
        sanitize_for_filename(&parts.join("_"))
    }
}

pub fn sanitize_for_filename(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{TagSpec, TagValue};
    use crate::geofile::feature::FeatureMap;

    fn tags(pairs: &[(&str, &str)]) -> FeatureMap {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let spec: TagSpec =
            serde_yaml::from_str("landuse: true\nbuilding: [church, chapel]\nshop: bakery\n")
                .unwrap();
        assert_eq!(
            TagSpec::new()
                .with_any("landuse")
                .with_values("building", &["church", "chapel"])
                .with_value("shop", "bakery"),
            spec
        );
        assert_eq!(Some(&TagValue::Any(true)), spec.0.get("landuse"));
    }

    #[rstest]
    #[case(TagSpec::new().with_any("landuse"), &[("landuse", "forest")], true)]
    #[case(TagSpec::new().with_any("landuse"), &[("building", "yes")], false)]
    #[case(TagSpec::new().with_value("shop", "bakery"), &[("shop", "bakery")], true)]
    #[case(TagSpec::new().with_value("shop", "bakery"), &[("shop", "butcher")], false)]
    #[case(TagSpec::new().with_values("building", &["church", "chapel"]), &[("building", "chapel")], true)]
    #[case(TagSpec::new().with_any("landuse").with_any("leisure"), &[("leisure", "park")], true)]
    fn test_matches(#[case] spec: TagSpec, #[case] pairs: &[(&str, &str)], #[case] expected: bool) {
        assert_eq!(expected, spec.matches(&tags(pairs)));
    }

    #[test]
    fn test_false_matches_nothing() {
        let spec: TagSpec = serde_yaml::from_str("landuse: false").unwrap();
        assert!(!spec.matches(&tags(&[("landuse", "forest")])));
        assert!(spec.overpass_filters().is_empty());
    }

    #[test]
    fn test_overpass_filters() {
        let spec = TagSpec::new()
            .with_any("landuse")
            .with_values("building", &["church", "chapel"]);
        assert_eq!(
            vec![
                r#"["building"="church"]"#,
                r#"["building"="chapel"]"#,
                r#"["landuse"]"#
            ],
            spec.overpass_filters()
        );
    }

    #[test]
    fn test_overpass_filter_escapes_quotes() {
        let spec = TagSpec::new().with_value("name", "Café \"Zum Hirschen\"");
        assert_eq!(
            vec![r#"["name"="Café \"Zum Hirschen\""]"#],
            spec.overpass_filters()
        );
    }

    #[test]
    fn test_slug() {
        let spec = TagSpec::new()
            .with_any("landuse")
            .with_values("building", &["church", "chapel"]);
        assert_eq!("building-church-chapel_landuse", spec.slug());
    }
}
