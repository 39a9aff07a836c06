//! Grouping of fetched objects into named sections.

use serde::{Deserialize, Serialize};

/// A named, ordered group of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section<T> {
    pub name: String,
    pub objects: Vec<T>,
}

impl<T> Section<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, objects: Vec<T>) -> Self {
        Self {
            name: name.into(),
            objects,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Position of an object inside a list of sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    #[must_use]
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

/// Groups `items` into sections named by `name_of`.
///
/// Items keep their relative order, and sections appear in the order their
/// first item does.
pub fn group_into_sections<T, F>(items: Vec<T>, name_of: F) -> Vec<Section<T>>
where
    F: Fn(&T) -> String,
{
    let mut sections: Vec<Section<T>> = Vec::new();
    for item in items {
        let name = name_of(&item);
        match sections.iter_mut().find(|s| s.name == name) {
            Some(section) => section.objects.push(item),
            None => sections.push(Section::new(name, vec![item])),
        }
    }
    sections
}

/// Trims `sections` so the total object count does not exceed `limit`.
///
/// Sections are kept in order; the last kept section may be cut short and
/// everything after it is dropped.
#[must_use]
pub fn sections_with_limit<T>(sections: Vec<Section<T>>, limit: usize) -> Vec<Section<T>> {
    let mut remaining = limit;
    let mut sliced = Vec::new();
    for mut section in sections {
        if remaining == 0 {
            break;
        }
        section.objects.truncate(remaining);
        remaining -= section.objects.len();
        sliced.push(section);
    }
    sliced
}

/// Looks up the object at `path`, if both indices are in range.
#[must_use]
pub fn object_at<T>(sections: &[Section<T>], path: IndexPath) -> Option<&T> {
    sections.get(path.section)?.objects.get(path.row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Section<u32>> {
        vec![
            Section::new("a", vec![1, 2, 3]),
            Section::new("b", vec![4, 5]),
            Section::new("c", vec![6]),
        ]
    }

    #[test]
    fn grouping_preserves_first_appearance_order() {
        let sections = group_into_sections(vec!["b1", "a1", "b2", "c1", "a2"], |s| {
            s[..1].to_string()
        });
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(sections[0].objects, vec!["b1", "b2"]);
        assert_eq!(sections[1].objects, vec!["a1", "a2"]);
    }

    #[test]
    fn limit_cuts_last_section_and_drops_rest() {
        let sliced = sections_with_limit(sample(), 4);
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced[0].objects, vec![1, 2, 3]);
        assert_eq!(sliced[1].objects, vec![4]);
    }

    #[test]
    fn limit_larger_than_total_keeps_everything() {
        assert_eq!(sections_with_limit(sample(), 100), sample());
    }

    #[test]
    fn zero_limit_yields_no_sections() {
        assert!(sections_with_limit(sample(), 0).is_empty());
    }

    #[test]
    fn object_at_checks_both_indices() {
        let sections = sample();
        assert_eq!(object_at(&sections, IndexPath::new(1, 1)), Some(&5));
        assert_eq!(object_at(&sections, IndexPath::new(1, 2)), None);
        assert_eq!(object_at(&sections, IndexPath::new(3, 0)), None);
    }
}
