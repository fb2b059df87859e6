//! Groups chapters that share a source so each source is processed once.
//!
//! The first chapter of a group (the leader) runs right away. The others wait
//! until the leader's chain has finished, so they can rely on whatever the
//! leader left behind (typically the cache entry written by `fetch`).

use std::collections::HashMap;

/// Chapters sharing one source locator, in spec order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup<T> {
    pub src: String,
    pub members: Vec<T>,
}

impl<T> SourceGroup<T> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Split into the leader and the followers that must wait for it.
    pub fn into_leader(self) -> Option<(T, Vec<T>)> {
        let mut members = self.members.into_iter();
        let leader = members.next()?;
        Some((leader, members.collect()))
    }
}

/// Stateless grouping by source.
pub struct SourceScheduler;

impl SourceScheduler {
    /// Group `items` by the source `src_of` returns.
    ///
    /// Groups come out in the order their source was first seen; members keep
    /// their relative spec order.
    pub fn schedule<T, F>(items: Vec<T>, src_of: F) -> Vec<SourceGroup<T>>
    where
        F: Fn(&T) -> &str,
    {
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<SourceGroup<T>> = Vec::new();

        for item in items {
            let src = src_of(&item).to_string();
            match position.get(&src) {
                Some(&i) => groups[i].members.push(item),
                None => {
                    position.insert(src.clone(), groups.len());
                    groups.push(SourceGroup {
                        src,
                        members: vec![item],
                    });
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_source_in_first_seen_order() {
        let chapters = vec![("c0", "X"), ("c1", "Y"), ("c2", "X"), ("c3", "Z"), ("c4", "Y")];
        let groups = SourceScheduler::schedule(chapters, |(_, src)| *src);

        let shape: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.src.as_str(), g.members.iter().map(|(id, _)| *id).collect()))
            .collect();

        assert_eq!(
            shape,
            vec![
                ("X", vec!["c0", "c2"]),
                ("Y", vec!["c1", "c4"]),
                ("Z", vec!["c3"]),
            ]
        );
    }

    #[test]
    fn distinct_sources_stay_single() {
        let groups = SourceScheduler::schedule(vec!["a", "b", "c"], |s| *s);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn leader_is_first_member() {
        let groups = SourceScheduler::schedule(vec![(0, "s"), (1, "s"), (2, "s")], |(_, s)| *s);
        let (leader, followers) = groups.into_iter().next().unwrap().into_leader().unwrap();
        assert_eq!(leader.0, 0);
        assert_eq!(followers.iter().map(|f| f.0).collect::<Vec<_>>(), [1, 2]);
    }
}
