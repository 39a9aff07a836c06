//! Keyed diff of two sectioned windows.
//!
//! Objects are matched by primary key, sections by name. An object present
//! on both sides is an update when its contents or its position changed.

use std::collections::HashMap;

use recordkit_core::{IndexPath, Record, Section};

use super::event::SectionChange;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WindowDiff {
    DeleteSection(SectionChange),
    InsertSection(SectionChange),
    UpdateSection(SectionChange),
    Delete { record: Record, old_index: IndexPath },
    Insert { record: Record, new_index: IndexPath },
    Update {
        record: Record,
        old_index: IndexPath,
        new_index: IndexPath,
    },
}

fn positions(sections: &[Section<Record>]) -> HashMap<&str, (IndexPath, &Record)> {
    let mut map = HashMap::new();
    for (s, section) in sections.iter().enumerate() {
        for (row, record) in section.objects.iter().enumerate() {
            map.insert(record.key.as_str(), (IndexPath::new(s, row), record));
        }
    }
    map
}

/// Changes turning `old` into `new`: section deletes, object deletes,
/// section inserts, object inserts, object updates, section updates.
pub(crate) fn diff_windows(old: &[Section<Record>], new: &[Section<Record>]) -> Vec<WindowDiff> {
    let old_sections: HashMap<&str, (usize, &Section<Record>)> = old
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), (i, s)))
        .collect();
    let new_names: HashMap<&str, usize> = new
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    let old_objects = positions(old);
    let new_objects = positions(new);

    let mut diff = Vec::new();

    for (index, section) in old.iter().enumerate() {
        if !new_names.contains_key(section.name.as_str()) {
            diff.push(WindowDiff::DeleteSection(SectionChange {
                index,
                name: section.name.clone(),
            }));
        }
    }
    for section in old {
        for record in &section.objects {
            if !new_objects.contains_key(record.key.as_str()) {
                let (old_index, _) = old_objects[record.key.as_str()];
                diff.push(WindowDiff::Delete {
                    record: record.clone(),
                    old_index,
                });
            }
        }
    }

    let mut updated_sections = Vec::new();
    for (index, section) in new.iter().enumerate() {
        match old_sections.get(section.name.as_str()) {
            None => diff.push(WindowDiff::InsertSection(SectionChange {
                index,
                name: section.name.clone(),
            })),
            Some((_, previous)) if previous.objects != section.objects => {
                updated_sections.push(SectionChange {
                    index,
                    name: section.name.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let mut updates = Vec::new();
    for (s, section) in new.iter().enumerate() {
        for (row, record) in section.objects.iter().enumerate() {
            let new_index = IndexPath::new(s, row);
            match old_objects.get(record.key.as_str()) {
                None => diff.push(WindowDiff::Insert {
                    record: record.clone(),
                    new_index,
                }),
                Some((old_index, previous)) if *old_index != new_index || *previous != record => {
                    updates.push(WindowDiff::Update {
                        record: record.clone(),
                        old_index: *old_index,
                        new_index,
                    });
                }
                Some(_) => {}
            }
        }
    }

    diff.extend(updates);
    diff.extend(updated_sections.into_iter().map(WindowDiff::UpdateSection));
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str, title: &str) -> Record {
        Record::new("dummy", key).with_field("title", title)
    }

    fn single(records: Vec<Record>) -> Vec<Section<Record>> {
        vec![Section::new("", records)]
    }

    #[test]
    fn identical_windows_have_no_diff() {
        let window = single(vec![rec("a", "x"), rec("b", "y")]);
        assert!(diff_windows(&window, &window.clone()).is_empty());
    }

    #[test]
    fn inserts_deletes_and_updates_by_key() {
        let old = single(vec![rec("a", "x"), rec("b", "y"), rec("c", "z")]);
        let new = single(vec![rec("a", "x"), rec("c", "z2"), rec("d", "w")]);
        let diff = diff_windows(&old, &new);

        assert_eq!(
            diff,
            vec![
                WindowDiff::Delete {
                    record: rec("b", "y"),
                    old_index: IndexPath::new(0, 1),
                },
                WindowDiff::Insert {
                    record: rec("d", "w"),
                    new_index: IndexPath::new(0, 2),
                },
                WindowDiff::Update {
                    record: rec("c", "z2"),
                    old_index: IndexPath::new(0, 2),
                    new_index: IndexPath::new(0, 1),
                },
                WindowDiff::UpdateSection(SectionChange {
                    index: 0,
                    name: String::new(),
                }),
            ]
        );
    }

    #[test]
    fn moved_object_is_an_update() {
        let old = single(vec![rec("a", "x"), rec("b", "y")]);
        let new = single(vec![rec("b", "y"), rec("a", "x")]);
        let updates = diff_windows(&old, &new)
            .into_iter()
            .filter(|d| matches!(d, WindowDiff::Update { .. }))
            .count();
        assert_eq!(updates, 2);
    }

    #[test]
    fn sections_come_and_go_by_name() {
        let old = vec![
            Section::new("A", vec![rec("a1", "x")]),
            Section::new("B", vec![rec("b1", "y")]),
        ];
        let new = vec![
            Section::new("A", vec![rec("a1", "x")]),
            Section::new("C", vec![rec("c1", "z")]),
        ];
        let diff = diff_windows(&old, &new);
        assert_eq!(
            diff[0],
            WindowDiff::DeleteSection(SectionChange {
                index: 1,
                name: "B".into()
            })
        );
        assert!(diff.contains(&WindowDiff::InsertSection(SectionChange {
            index: 1,
            name: "C".into()
        })));
        assert!(diff.contains(&WindowDiff::Insert {
            record: rec("c1", "z"),
            new_index: IndexPath::new(1, 0),
        }));
        assert!(!diff
            .iter()
            .any(|d| matches!(d, WindowDiff::UpdateSection(_))));
    }
}
