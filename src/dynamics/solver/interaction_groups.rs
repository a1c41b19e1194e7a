//! Structure responsible for sorting the contact joints into groups with
//! pairwise-disjoint bodies, so that the SIMD kernels can solve all the
//! lanes of a group concurrently without write hazards.

use crate::dynamics::solver::ContactJoint;

/// Builds a permutation of the joint indices whose prefix is made of
/// fixed-size groups of joints with pairwise-disjoint body pairs.
#[derive(Clone, Debug, Default)]
pub struct InteractionGroups {
    body_tags: Vec<u32>,  // Workspace.
    worklist: Vec<u32>,   // Workspace.
    /// The permutation of `[0, joint_count)` produced by the last call to
    /// [`Self::group_joints`].
    pub joint_index: Vec<u32>,
}

impl InteractionGroups {
    /// Creates an empty grouping workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permutes the joint indices so that every `group_size_target`-aligned
    /// window of the returned prefix touches `2 * group_size_target`
    /// distinct bodies.
    ///
    /// Returns the length of that prefix, always a multiple of
    /// `group_size_target`. The remaining joints did not fit any full group
    /// and must be solved one at a time.
    ///
    /// The greedy scan is deterministic for a given joint order. It does not
    /// attempt an optimal coloring: it only needs enough full groups to
    /// cover the bulk of the joints.
    pub fn group_joints(
        &mut self,
        bodies_count: usize,
        joints: &[ContactJoint],
        group_size_target: usize,
    ) -> usize {
        let joint_count = joints.len();

        self.joint_index.clear();

        if group_size_target == 1 {
            self.joint_index.extend(0..joint_count as u32);
            return joint_count;
        }

        self.body_tags.clear();
        self.body_tags.resize(bodies_count, 0);
        self.worklist.clear();
        self.worklist.extend(0..joint_count as u32);

        let mut tag = 0;
        let mut group_offset = 0;

        while self.worklist.len() >= group_size_target {
            // Gather one group of joints with non-overlapping bodies.
            let mut group_size = 0;

            tag += 1;

            let mut i = 0;
            while i < self.worklist.len() && group_size < group_size_target {
                let joint_index = self.worklist[i];
                let joint = &joints[joint_index as usize];

                if self.body_tags[joint.body1_index as usize] < tag
                    && self.body_tags[joint.body2_index as usize] < tag
                {
                    self.body_tags[joint.body1_index as usize] = tag;
                    self.body_tags[joint.body2_index as usize] = tag;

                    self.joint_index.push(joint_index);
                    group_size += 1;

                    // The residual order of the worklist is irrelevant.
                    self.worklist.swap_remove(i);
                } else {
                    i += 1;
                }
            }

            group_offset += group_size;

            if group_size < group_size_target {
                break;
            }
        }

        // The remaining joints don't form a full group; they are appended
        // as-is and solved one by one.
        self.joint_index.extend_from_slice(&self.worklist);
        self.worklist.clear();

        // A partially-filled trailing group is not part of the SIMD-safe
        // prefix; its joints are solved with the tail.
        (group_offset / group_size_target) * group_size_target
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::solver::ContactPoint;
    use crate::dynamics::RigidBody;
    use crate::math::{Isometry, Point, Real, Vector};

    fn test_joints(bodies_count: usize, pairs: &[(u32, u32)]) -> Vec<ContactJoint> {
        let bodies: Vec<_> = (0..bodies_count)
            .map(|i| RigidBody::new_dynamic(Isometry::translation(i as Real, 0.0), 1.0, 1.0))
            .collect();
        let contact = ContactPoint {
            point1: Point::origin(),
            point2: Point::origin(),
            normal: Vector::new(0.0, 1.0),
            restitution: 0.0,
        };

        pairs
            .iter()
            .map(|&(i1, i2)| ContactJoint::new(&bodies, i1, i2, &contact))
            .collect()
    }

    fn assert_permutation(joint_index: &[u32], joint_count: usize) {
        let mut seen = vec![false; joint_count];
        for &i in joint_index {
            assert!(!seen[i as usize], "joint {} emitted twice", i);
            seen[i as usize] = true;
        }
        assert_eq!(joint_index.len(), joint_count);
    }

    fn assert_disjoint_groups(joints: &[ContactJoint], joint_index: &[u32], prefix: usize, k: usize) {
        for group in joint_index[..prefix].chunks(k) {
            let mut bodies: Vec<u32> = group
                .iter()
                .flat_map(|&i| {
                    let joint = &joints[i as usize];
                    [joint.body1_index, joint.body2_index]
                })
                .collect();
            bodies.sort_unstable();
            bodies.dedup();
            assert_eq!(bodies.len(), 2 * k, "bodies shared within a group");
        }
    }

    #[test]
    fn identity_permutation_for_scalar_target() {
        let joints = test_joints(8, &[(0, 1), (2, 3), (4, 5), (6, 7)]);
        let mut groups = InteractionGroups::new();
        let prefix = groups.group_joints(8, &joints, 1);

        assert_eq!(prefix, 4);
        assert_eq!(groups.joint_index, [0, 1, 2, 3]);
    }

    #[test]
    fn independent_pairs_form_full_groups() {
        // 16 joints on 32 distinct bodies: everything can be grouped.
        let pairs: Vec<_> = (0..16u32).map(|i| (2 * i, 2 * i + 1)).collect();
        let joints = test_joints(32, &pairs);

        for k in [4, 8, 16] {
            let mut groups = InteractionGroups::new();
            let prefix = groups.group_joints(32, &joints, k);

            assert_eq!(prefix, 16);
            assert_permutation(&groups.joint_index, joints.len());
            assert_disjoint_groups(&joints, &groups.joint_index, prefix, k);
        }
    }

    #[test]
    fn chain_is_split_into_disjoint_groups() {
        // A chain 0-1-2-...-32: adjacent joints share a body, so each group
        // can take at most every other joint.
        let pairs: Vec<_> = (0..32u32).map(|i| (i, i + 1)).collect();
        let joints = test_joints(33, &pairs);

        let mut groups = InteractionGroups::new();
        let prefix = groups.group_joints(33, &joints, 8);

        assert!(prefix >= 24, "chain should mostly group, got {}", prefix);
        assert_permutation(&groups.joint_index, joints.len());
        assert_disjoint_groups(&joints, &groups.joint_index, prefix, 8);
    }

    #[test]
    fn partially_filled_trailing_group_is_truncated() {
        // 5 independent pairs with a group target of 4: one full group, then
        // a round accepting a single joint, which must not be counted into
        // the SIMD-safe prefix.
        let pairs: Vec<_> = (0..5u32).map(|i| (2 * i, 2 * i + 1)).collect();
        let joints = test_joints(10, &pairs);

        let mut groups = InteractionGroups::new();
        let prefix = groups.group_joints(10, &joints, 4);

        assert_eq!(prefix, 4);
        assert_permutation(&groups.joint_index, joints.len());
        assert_disjoint_groups(&joints, &groups.joint_index, prefix, 4);
    }

    #[test]
    fn complete_graph_on_four_bodies_falls_back_to_scalar() {
        // K4: 6 joints, but at most 2 have disjoint bodies, so no full
        // 4-sized group can ever be built.
        let joints = test_joints(
            4,
            &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)],
        );

        let mut groups = InteractionGroups::new();
        let prefix = groups.group_joints(4, &joints, 4);

        assert_eq!(prefix, 0);
        assert_permutation(&groups.joint_index, joints.len());
        assert!(groups.joint_index.len() - prefix >= 2);
    }
}
