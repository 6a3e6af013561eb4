// ===========================================================================
// Stiff groups: connectors that must share exactly one elevation
// ===========================================================================
//
// Union-Find over connector indices with path compression and union by size.
// A connector that was never mentioned in a same-elevation declaration is
// "loose" and belongs to no group. A group is named by its current root; once
// merged into another group that name is permanently rejected.

use crate::connector::ConnectorId;
use crate::error::EnforcerError;
use ahash::AHashMap;
use itertools::Itertools;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StiffGroups {
    parent: Vec<usize>,
    size: Vec<usize>,
    grouped: Vec<bool>,
    /// Connectors that founded a group; only these can ever name one.
    founded: Vec<bool>,
}

impl StiffGroups {
    pub fn new(len: usize) -> Self {
        let mut groups = Self::default();
        groups.grow(len);
        groups
    }

    /// Extends the id space to `len` connectors; new connectors start loose.
    pub fn grow(&mut self, len: usize) {
        let old = self.parent.len();
        if len <= old {
            return;
        }
        self.parent.extend(old..len);
        self.size.resize(len, 1);
        self.grouped.resize(len, false);
        self.founded.resize(len, false);
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    fn check(&self, id: ConnectorId) -> Result<usize, EnforcerError> {
        if id.index() < self.parent.len() {
            Ok(id.index())
        } else {
            Err(EnforcerError::UnknownConnector(id))
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) -> usize {
        let mut keep = self.find(x);
        let mut absorb = self.find(y);
        if keep == absorb {
            return keep;
        }
        if self.size[keep] < self.size[absorb] {
            std::mem::swap(&mut keep, &mut absorb);
        }
        self.parent[absorb] = keep;
        self.size[keep] += self.size[absorb];
        keep
    }

    /// Declares that all given connectors share one elevation.
    ///
    /// Existing groups among the inputs are merged into one survivor and any
    /// loose inputs join it. Returns the surviving group, `None` for empty input.
    pub fn require_same_elevation(
        &mut self,
        connectors: &[ConnectorId],
    ) -> Result<Option<GroupId>, EnforcerError> {
        let indices: Vec<usize> = connectors
            .iter()
            .map(|&c| self.check(c))
            .collect::<Result<_, _>>()?;

        let Some(&first) = indices.first() else {
            return Ok(None);
        };

        let mut survivor = None;
        let mut loose = Vec::new();
        for &i in &indices {
            if self.grouped[i] {
                let root = self.find(i);
                survivor = Some(match survivor {
                    None => root,
                    Some(current) => self.union(current, root),
                });
            } else {
                loose.push(i);
            }
        }

        // no existing group: the first input founds one
        let mut root = survivor.unwrap_or(first);
        self.grouped[root] = true;
        self.founded[root] = true;
        for i in loose {
            if !self.grouped[i] {
                self.grouped[i] = true;
                root = self.union(root, i);
            }
        }
        Ok(Some(GroupId(root)))
    }

    pub fn group_of(&mut self, id: ConnectorId) -> Result<Option<GroupId>, EnforcerError> {
        let i = self.check(id)?;
        if !self.grouped[i] {
            return Ok(None);
        }
        Ok(Some(GroupId(self.find(i))))
    }

    pub fn same_group(&mut self, a: ConnectorId, b: ConnectorId) -> Result<bool, EnforcerError> {
        Ok(match (self.group_of(a)?, self.group_of(b)?) {
            (Some(ga), Some(gb)) => ga == gb,
            _ => false,
        })
    }

    fn check_group(&self, group: GroupId) -> Result<usize, EnforcerError> {
        let root = group.0;
        if root >= self.parent.len() || !self.founded[root] {
            return Err(EnforcerError::NotAGroup(group));
        }
        if self.parent[root] != root {
            return Err(EnforcerError::MergedGroup(group));
        }
        Ok(root)
    }

    pub fn group_size(&self, group: GroupId) -> Result<usize, EnforcerError> {
        let root = self.check_group(group)?;
        Ok(self.size[root])
    }

    pub fn members(&mut self, group: GroupId) -> Result<Vec<ConnectorId>, EnforcerError> {
        let root = self.check_group(group)?;
        Ok((0..self.parent.len())
            .filter(|&i| self.grouped[i] && self.find(i) == root)
            .map(ConnectorId)
            .collect())
    }

    /// All live groups with their members, ordered by group id.
    pub fn groups(&mut self) -> Vec<(GroupId, Vec<ConnectorId>)> {
        let mut by_root: AHashMap<usize, Vec<ConnectorId>> = AHashMap::new();
        for i in 0..self.parent.len() {
            if self.grouped[i] {
                let root = self.find(i);
                by_root.entry(root).or_default().push(ConnectorId(i));
            }
        }
        by_root
            .into_iter()
            .sorted_unstable_by_key(|(root, _)| *root)
            .map(|(root, members)| (GroupId(root), members))
            .collect()
    }

    pub fn group_count(&self) -> usize {
        (0..self.parent.len())
            .filter(|&i| self.grouped[i] && self.parent[i] == i)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ids(raw: &[usize]) -> Vec<ConnectorId> {
        raw.iter().map(|&i| ConnectorId(i)).collect()
    }

    #[test]
    fn test_first_declaration_creates_group() {
        let mut groups = StiffGroups::new(4);
        let group = groups
            .require_same_elevation(&ids(&[1, 2]))
            .unwrap()
            .unwrap();
        assert_eq!(groups.group_size(group).unwrap(), 2);
        assert!(groups.same_group(ConnectorId(1), ConnectorId(2)).unwrap());
        assert_eq!(groups.group_of(ConnectorId(0)).unwrap(), None);
        assert_eq!(groups.group_count(), 1);
    }

    #[test]
    fn test_redeclaring_same_group_is_noop() {
        let mut groups = StiffGroups::new(3);
        let g1 = groups.require_same_elevation(&ids(&[0, 1])).unwrap();
        let g2 = groups.require_same_elevation(&ids(&[1, 0])).unwrap();
        assert_eq!(g1, g2);
        assert_eq!(groups.group_count(), 1);
        assert_eq!(groups.group_size(g1.unwrap()).unwrap(), 2);
    }

    #[test]
    fn test_merge_absorbs_every_member() {
        let mut groups = StiffGroups::new(6);
        let a = groups
            .require_same_elevation(&ids(&[0, 1, 2]))
            .unwrap()
            .unwrap();
        let b = groups
            .require_same_elevation(&ids(&[3, 4]))
            .unwrap()
            .unwrap();
        let merged = groups
            .require_same_elevation(&ids(&[4, 2, 5]))
            .unwrap()
            .unwrap();

        assert_eq!(merged, a, "larger group survives");
        assert_eq!(groups.members(merged).unwrap(), ids(&[0, 1, 2, 3, 4, 5]));
        assert_eq!(groups.group_count(), 1);

        // the absorbed group name is dead
        assert_eq!(groups.group_size(b), Err(EnforcerError::MergedGroup(b)));
        assert_eq!(groups.members(b), Err(EnforcerError::MergedGroup(b)));
    }

    #[test]
    fn test_loose_connector_is_not_a_group() {
        let mut groups = StiffGroups::new(2);
        let loose = GroupId(1);
        assert_eq!(groups.members(loose), Err(EnforcerError::NotAGroup(loose)));
    }

    #[test]
    fn test_joined_member_never_named_a_group() {
        let mut groups = StiffGroups::new(3);
        let founder = groups
            .require_same_elevation(&ids(&[0, 1]))
            .unwrap()
            .unwrap();
        groups.require_same_elevation(&ids(&[2, 0])).unwrap();

        assert_eq!(founder, GroupId(0));
        for joined in [GroupId(1), GroupId(2)] {
            assert_eq!(groups.members(joined), Err(EnforcerError::NotAGroup(joined)));
        }
        assert_eq!(groups.group_size(founder), Ok(3));
    }

    #[test]
    fn test_unknown_connector_rejected() {
        let mut groups = StiffGroups::new(2);
        assert_eq!(
            groups.require_same_elevation(&ids(&[0, 9])),
            Err(EnforcerError::UnknownConnector(ConnectorId(9)))
        );
        // nothing was grouped by the failed call
        assert_eq!(groups.group_count(), 0);
    }

    #[test]
    fn test_empty_and_single_declarations() {
        let mut groups = StiffGroups::new(2);
        assert_eq!(groups.require_same_elevation(&[]).unwrap(), None);
        let single = groups
            .require_same_elevation(&ids(&[1]))
            .unwrap()
            .unwrap();
        assert_eq!(groups.members(single).unwrap(), ids(&[1]));
    }

    #[test]
    fn test_grow_keeps_existing_groups() {
        let mut groups = StiffGroups::new(2);
        groups.require_same_elevation(&ids(&[0, 1])).unwrap();
        groups.grow(4);
        groups.require_same_elevation(&ids(&[3, 1])).unwrap();
        assert!(groups.same_group(ConnectorId(0), ConnectorId(3)).unwrap());
        assert_eq!(groups.group_of(ConnectorId(2)).unwrap(), None);
    }

    /// Membership must equal transitive closure of the declarations.
    #[rstest]
    #[case(vec![vec![0, 1], vec![2, 3], vec![1, 2]], vec![vec![0, 1, 2, 3]])]
    #[case(vec![vec![0, 1], vec![2, 3]], vec![vec![0, 1], vec![2, 3]])]
    #[case(vec![vec![4, 0], vec![5, 6], vec![6, 7], vec![0, 7]], vec![vec![0, 4, 5, 6, 7]])]
    #[case(
        vec![vec![0, 1, 2], vec![3], vec![4, 5], vec![2, 5, 3]],
        vec![vec![0, 1, 2, 3, 4, 5]]
    )]
    fn test_groups_match_transitive_closure(
        #[case] declarations: Vec<Vec<usize>>,
        #[case] expected: Vec<Vec<usize>>,
    ) {
        let mut groups = StiffGroups::new(8);
        for declaration in &declarations {
            groups.require_same_elevation(&ids(declaration)).unwrap();
        }

        let actual: Vec<Vec<ConnectorId>> = groups
            .groups()
            .into_iter()
            .map(|(_, members)| members)
            .sorted()
            .collect();
        let expected: Vec<Vec<ConnectorId>> = expected.iter().map(|g| ids(g)).sorted().collect();
        assert_eq!(actual, expected);

        // every mentioned connector sits in exactly one group
        let mentioned: Vec<usize> = declarations
            .iter()
            .flat_map(|d| d.iter().copied())
            .sorted()
            .dedup()
            .collect();
        let covered: Vec<usize> = actual
            .iter()
            .flatten()
            .map(|c| c.index())
            .sorted()
            .collect();
        assert_eq!(mentioned, covered);
    }
}
